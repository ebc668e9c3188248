pub mod databases;
pub mod keychain;
pub mod palette;
pub mod selection;
pub mod settings;
pub mod voice;

use crate::error::{CommandError, DashboardError};
use crate::Dashboard;
use serde::Serialize;
use std::sync::Arc;
use tauri::ipc::Channel;
use tauri::State;

pub type DashboardState<'a> = State<'a, Arc<Dashboard>>;

/// Streamed to the frontend while a chat reply is generated.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "event", content = "data")]
pub enum ChatEvent {
    Delta { text: String },
    Finished { text: String },
}

/// Forward chat deltas to `channel`. A closed channel only loses the
/// preview; the full reply is still returned by the command.
pub fn chat_forwarder(channel: Channel<ChatEvent>) -> impl FnMut(&str) {
    move |chunk: &str| {
        if let Err(error) = channel.send(ChatEvent::Delta {
            text: chunk.to_string(),
        }) {
            log::warn!("Failed to stream chat chunk: {error}");
        }
    }
}

pub fn finish_chat(channel: &Channel<ChatEvent>, text: &str) {
    if let Err(error) = channel.send(ChatEvent::Finished {
        text: text.to_string(),
    }) {
        log::warn!("Failed to send chat completion: {error}");
    }
}

/// Run a dashboard call that may hit the network on the blocking pool.
pub async fn run_blocking<T, F>(state: &DashboardState<'_>, job: F) -> Result<T, CommandError>
where
    T: Send + 'static,
    F: FnOnce(&Dashboard) -> crate::Result<T> + Send + 'static,
{
    let dashboard = Arc::clone(state.inner());
    tauri::async_runtime::spawn_blocking(move || job(&dashboard))
        .await
        .map_err(|error| DashboardError::Worker(format!("Dashboard worker join error: {error}")))?
        .map_err(CommandError::from)
}
