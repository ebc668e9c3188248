//! # Notion Dashboard
//!
//! Browse Notion databases, select pages by click or drag, convert them to
//! Markdown, ask a chat model about them, and publish voice notes back as
//! new pages.
//!
//! The library is UI-agnostic: [`Dashboard`] is the entry point and every
//! collaborator sits behind a trait in [`providers`]. The Tauri shell in
//! `commands` (feature `desktop`) only forwards IPC calls to it.

pub mod dashboard;
pub mod drag;
pub mod error;
pub mod keymap;
pub mod markdown;
pub mod page_markdown;
pub mod providers;
pub mod storage;
pub mod store;
pub mod types;
pub mod util;
pub mod voice;

/// Tauri `invoke` handlers.
#[cfg(feature = "desktop")]
mod commands;

pub use dashboard::{ConvertedSelection, Dashboard, KeyOutcome, PaletteOutcome};
pub use error::{CommandError, DashboardError, ErrorCategory, Result};
pub use providers::{ChatCompletion, LiveServices, NotionApi, Services, SpeechToText};
pub use store::{DashboardStore, FetchOutcome, Selection, StoreSnapshot, TableView};

/// Start the desktop app with live Notion and OpenAI clients.
#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use std::sync::Arc;
    use storage::settings_io::{app_settings_path, load_settings};

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    log::info!("Starting Notion Dashboard...");

    let dashboard = Dashboard::new(Arc::new(LiveServices), load_settings())
        .with_settings_path(app_settings_path());

    tauri::Builder::default()
        .plugin(tauri_plugin_clipboard_manager::init())
        .plugin(tauri_plugin_notification::init())
        .manage(Arc::new(dashboard))
        .invoke_handler(tauri::generate_handler![
            // Databases and pages
            commands::databases::list_databases,
            commands::databases::set_active_database,
            commands::databases::choose_database,
            commands::databases::refresh_pages,
            commands::databases::get_dashboard_state,
            // Selection and drag
            commands::selection::replace_selection,
            commands::selection::toggle_row,
            commands::selection::select_all,
            commands::selection::clear_selection,
            commands::selection::pointer_down,
            commands::selection::pointer_enter,
            commands::selection::pointer_up,
            commands::selection::escape_drag,
            // Palette and shortcuts
            commands::palette::handle_key,
            commands::palette::get_palette,
            commands::palette::set_palette_open,
            commands::palette::run_palette_command,
            // Voice notes
            commands::voice::toggle_recording,
            commands::voice::abort_recording,
            commands::voice::get_recording_state,
            commands::voice::submit_voice_note,
            commands::voice::publish_markdown_note,
            // Settings and secrets
            commands::settings::get_app_settings,
            commands::settings::save_app_settings,
            commands::keychain::set_notion_api_key,
            commands::keychain::has_notion_api_key,
            commands::keychain::clear_notion_api_key,
            commands::keychain::set_openai_api_key,
            commands::keychain::has_openai_api_key,
            commands::keychain::clear_openai_api_key,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
