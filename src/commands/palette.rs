use super::{chat_forwarder, finish_chat, run_blocking, ChatEvent, DashboardState};
use crate::dashboard::{KeyOutcome, PaletteOutcome};
use crate::error::CommandError;
use crate::keymap::{KeyPress, PaletteCommand, PaletteGroup};
use tauri::ipc::Channel;
use tauri::AppHandle;
use tauri_plugin_clipboard_manager::ClipboardExt;

#[tauri::command]
pub fn handle_key(state: DashboardState<'_>, press: KeyPress) -> Result<KeyOutcome, CommandError> {
    Ok(state.handle_key(&press)?)
}

#[tauri::command]
pub fn get_palette(state: DashboardState<'_>) -> Result<Vec<PaletteGroup>, CommandError> {
    Ok(state.palette()?)
}

#[tauri::command]
pub fn set_palette_open(state: DashboardState<'_>, open: bool) -> Result<(), CommandError> {
    Ok(state.set_palette_open(open)?)
}

/// Converted Markdown is also copied to the clipboard.
#[tauri::command]
pub async fn run_palette_command(
    app: AppHandle,
    state: DashboardState<'_>,
    command: PaletteCommand,
    on_event: Channel<ChatEvent>,
) -> Result<PaletteOutcome, CommandError> {
    let events = on_event.clone();
    let outcome = run_blocking(&state, move |dashboard| {
        let mut on_chunk = chat_forwarder(events);
        dashboard.run_palette_command(command, &mut on_chunk)
    })
    .await?;

    match &outcome {
        PaletteOutcome::Chat(text) => finish_chat(&on_event, text),
        PaletteOutcome::Converted(converted) if !converted.document.is_empty() => {
            match app.clipboard().write_text(converted.document.clone()) {
                Ok(()) => log::info!(
                    "Copied {} converted page(s) to clipboard",
                    converted.batch.processed_count
                ),
                Err(error) => log::warn!("Failed to copy markdown to clipboard: {error}"),
            }
        }
        _ => {}
    }
    Ok(outcome)
}
