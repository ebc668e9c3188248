use super::{chat_forwarder, run_blocking, ChatEvent, DashboardState};
use crate::error::CommandError;
use crate::types::PublishedNote;
use crate::voice::{RecordingState, VoiceAction};
use tauri::ipc::Channel;
use tauri::AppHandle;
use tauri_plugin_notification::NotificationExt;

#[tauri::command]
pub fn toggle_recording(state: DashboardState<'_>) -> Result<VoiceAction, CommandError> {
    Ok(state.toggle_recording()?)
}

/// Capture failed to start, e.g. the microphone was denied.
#[tauri::command]
pub fn abort_recording(state: DashboardState<'_>) -> Result<RecordingState, CommandError> {
    Ok(state.abort_recording()?)
}

#[tauri::command]
pub fn get_recording_state(state: DashboardState<'_>) -> Result<RecordingState, CommandError> {
    Ok(state.recording_state()?)
}

#[tauri::command]
pub async fn submit_voice_note(
    app: AppHandle,
    state: DashboardState<'_>,
    audio: Vec<u8>,
    on_event: Channel<ChatEvent>,
) -> Result<PublishedNote, CommandError> {
    let note = run_blocking(&state, move |dashboard| {
        let mut on_chunk = chat_forwarder(on_event);
        dashboard.submit_voice_note(&audio, &mut on_chunk)
    })
    .await?;

    notify_published(&app, &note);
    Ok(note)
}

#[tauri::command]
pub async fn publish_markdown_note(
    app: AppHandle,
    state: DashboardState<'_>,
    database_id: String,
    markdown: String,
    title: Option<String>,
) -> Result<PublishedNote, CommandError> {
    let note = run_blocking(&state, move |dashboard| {
        dashboard.publish_note(&database_id, &markdown, title.as_deref())
    })
    .await?;

    notify_published(&app, &note);
    Ok(note)
}

fn notify_published(app: &AppHandle, note: &PublishedNote) {
    if let Err(error) = app
        .notification()
        .builder()
        .title("Note saved to Notion")
        .body(&note.title)
        .show()
    {
        log::warn!("Failed to show notification: {error}");
    }
}
