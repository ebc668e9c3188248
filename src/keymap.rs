//! Keyboard shortcuts and the command palette.

use crate::drag::Modifiers;
use crate::voice::RecordingState;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPress {
    pub key: String,
    #[serde(default)]
    pub modifiers: Modifiers,
    /// Focus is in an input, textarea or contenteditable element.
    #[serde(default)]
    pub in_text_field: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Shortcut {
    TogglePalette,
    ToggleRecording,
}

/// Map a key press to a shortcut. A match means the key's default action
/// must be suppressed.
pub fn shortcut_for(press: &KeyPress, recording: RecordingState) -> Option<Shortcut> {
    let modifiers = &press.modifiers;
    let key = press.key.as_str();
    if key == "/" && !modifiers.ctrl_or_meta() && !modifiers.alt && !press.in_text_field {
        return Some(Shortcut::TogglePalette);
    }
    if !modifiers.ctrl_or_meta() {
        return None;
    }
    if key.eq_ignore_ascii_case("k") {
        return Some(Shortcut::TogglePalette);
    }
    if key.eq_ignore_ascii_case("r") && !press.in_text_field && !recording.is_busy() {
        return Some(Shortcut::ToggleRecording);
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PaletteCommand {
    StartRecording,
    StopRecording,
    LogSelection,
    ConvertSelection,
    Summarize,
    ExtractTasks,
    ClearSelection,
    SelectDatabase,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaletteItem {
    pub command: PaletteCommand,
    pub label: String,
    pub shortcut: String,
    pub disabled: bool,
}

impl PaletteItem {
    fn new(command: PaletteCommand, label: impl Into<String>, shortcut: &str) -> Self {
        Self {
            command,
            label: label.into(),
            shortcut: shortcut.to_string(),
            disabled: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaletteGroup {
    pub heading: String,
    pub items: Vec<PaletteItem>,
}

fn voice_item(recording: RecordingState) -> PaletteItem {
    match recording {
        RecordingState::Recording => {
            PaletteItem::new(PaletteCommand::StopRecording, "Stop Recording Voice Note", "⌘R")
        }
        RecordingState::Stopped | RecordingState::Transcribing => PaletteItem {
            disabled: true,
            ..PaletteItem::new(PaletteCommand::StartRecording, "Processing...", "⌘R")
        },
        RecordingState::Idle => {
            PaletteItem::new(PaletteCommand::StartRecording, "Record Voice Note", "⌘R")
        }
    }
}

/// Palette contents for the current selection and recording state.
pub fn palette_groups(selected_count: usize, recording: RecordingState) -> Vec<PaletteGroup> {
    let mut groups = Vec::new();

    if recording == RecordingState::Recording {
        groups.push(PaletteGroup {
            heading: "Active".to_string(),
            items: vec![voice_item(recording)],
        });
    }

    if selected_count > 0 {
        groups.push(PaletteGroup {
            heading: "Actions".to_string(),
            items: vec![
                PaletteItem::new(
                    PaletteCommand::LogSelection,
                    format!("Log Selected Pages ({selected_count})"),
                    "⌘L",
                ),
                PaletteItem::new(
                    PaletteCommand::ConvertSelection,
                    format!("Convert to Markdown ({selected_count})"),
                    "⌘M",
                ),
                PaletteItem::new(
                    PaletteCommand::Summarize,
                    format!("Summarize Pages ({selected_count})"),
                    "⌘S",
                ),
                PaletteItem::new(
                    PaletteCommand::ExtractTasks,
                    format!("Extract Tasks from Pages ({selected_count})"),
                    "⌘E",
                ),
                PaletteItem::new(
                    PaletteCommand::ClearSelection,
                    format!("Clear Selections ({selected_count})"),
                    "⌘⌫",
                ),
            ],
        });
    }

    if recording != RecordingState::Recording {
        groups.push(PaletteGroup {
            heading: "Voice".to_string(),
            items: vec![voice_item(recording)],
        });
    }

    groups.push(PaletteGroup {
        heading: "Navigation".to_string(),
        items: vec![PaletteItem::new(
            PaletteCommand::SelectDatabase,
            "Select Database",
            "⌘D",
        )],
    });
    groups
}

/// Open/closed state of the palette dialog.
#[derive(Debug, Default)]
pub struct Palette {
    open: bool,
}

impl Palette {
    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn toggle(&mut self) -> bool {
        self.open = !self.open;
        self.open
    }

    pub fn set_open(&mut self, open: bool) {
        self.open = open;
    }

    /// Running any command closes the palette first.
    pub fn run(&mut self, command: PaletteCommand) -> PaletteCommand {
        self.open = false;
        command
    }
}
