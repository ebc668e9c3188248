//! Voice-note recording lifecycle and the prompts that turn a raw
//! transcript into a titled Markdown note.

use crate::error::{DashboardError, Result};
use crate::types::{ChatMessage, ChatRequest};
use serde::Serialize;

pub const VOICE_CLEANUP_SYSTEM_PROMPT: &str = "You are a helpful assistant that cleans up transcriptions.
Please remove any unnecessary filler words, pauses, or repetitions from the transcription.
Your response should be in markdown format with an H1 at the top acting as the title of the transcription.
The title should be concise and relevant to the content of the transcription.
The content should be clear and easy to read, maintaining the original meaning while improving clarity.";

pub const EMPTY_TRANSCRIPT: &str = "(no text)";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordingState {
    #[default]
    Idle,
    Recording,
    /// Capture stopped; the recorded audio has not been handed over yet.
    Stopped,
    Transcribing,
}

impl RecordingState {
    /// A note is on its way to Notion and recording cannot restart.
    pub fn is_busy(&self) -> bool {
        matches!(self, RecordingState::Stopped | RecordingState::Transcribing)
    }
}

/// What the audio layer should do after a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum VoiceAction {
    StartCapture,
    StopCapture,
    Ignored,
}

#[derive(Debug, Default)]
pub struct VoiceRecorder {
    state: RecordingState,
}

impl VoiceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecordingState::Recording
    }

    pub fn is_transcribing(&self) -> bool {
        self.state == RecordingState::Transcribing
    }

    /// Start or stop capture. A note that is still being processed cannot
    /// be interrupted.
    pub fn toggle(&mut self) -> VoiceAction {
        match self.state {
            RecordingState::Idle => {
                self.state = RecordingState::Recording;
                VoiceAction::StartCapture
            }
            RecordingState::Recording => {
                self.state = RecordingState::Stopped;
                VoiceAction::StopCapture
            }
            RecordingState::Stopped | RecordingState::Transcribing => VoiceAction::Ignored,
        }
    }

    /// Captured audio arrived. Accepted after stop, while still recording
    /// (implicit stop) or from idle; rejected once transcription started.
    pub fn begin_processing(&mut self) -> Result<()> {
        match self.state {
            RecordingState::Idle | RecordingState::Recording | RecordingState::Stopped => {
                self.state = RecordingState::Transcribing;
                Ok(())
            }
            RecordingState::Transcribing => Err(DashboardError::InvalidInput(
                "A voice note is already being processed".to_string(),
            )),
        }
    }

    /// Back to idle, whether processing succeeded or not.
    pub fn finish(&mut self) {
        self.state = RecordingState::Idle;
    }

    /// Capture failed (e.g. microphone denied) or produced no audio.
    pub fn abort(&mut self) {
        if matches!(self.state, RecordingState::Recording | RecordingState::Stopped) {
            self.state = RecordingState::Idle;
        }
    }
}

pub fn cleanup_prompt(transcript: &str) -> String {
    let text = if transcript.trim().is_empty() {
        EMPTY_TRANSCRIPT
    } else {
        transcript
    };
    format!("Please clean up the following transcription:\n\n{text}")
}

pub fn cleanup_request(model: &str, transcript: &str) -> ChatRequest {
    ChatRequest {
        model: model.to_string(),
        messages: vec![
            ChatMessage::system(VOICE_CLEANUP_SYSTEM_PROMPT),
            ChatMessage::user(cleanup_prompt(transcript)),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatRole;

    #[test]
    fn toggle_cycles_through_recording() {
        let mut recorder = VoiceRecorder::new();
        assert_eq!(recorder.toggle(), VoiceAction::StartCapture);
        assert!(recorder.is_recording());
        assert_eq!(recorder.toggle(), VoiceAction::StopCapture);
        assert_eq!(recorder.state(), RecordingState::Stopped);
        assert_eq!(recorder.toggle(), VoiceAction::Ignored);

        recorder.begin_processing().expect("audio after stop");
        assert!(recorder.is_transcribing());
        assert_eq!(recorder.toggle(), VoiceAction::Ignored);
        recorder.finish();
        assert_eq!(recorder.state(), RecordingState::Idle);
    }

    #[test]
    fn only_one_note_is_processed_at_a_time() {
        let mut recorder = VoiceRecorder::new();
        recorder.toggle();
        recorder.begin_processing().expect("implicit stop");
        assert!(recorder.begin_processing().is_err());
        recorder.finish();
        recorder.begin_processing().expect("direct upload from idle");
    }

    #[test]
    fn abort_never_interrupts_transcription() {
        let mut recorder = VoiceRecorder::new();
        recorder.toggle();
        recorder.abort();
        assert_eq!(recorder.state(), RecordingState::Idle);

        recorder.toggle();
        recorder.toggle();
        recorder.abort();
        assert_eq!(recorder.state(), RecordingState::Idle);

        recorder.toggle();
        recorder.begin_processing().expect("implicit stop");
        recorder.abort();
        assert!(recorder.is_transcribing());
    }

    #[test]
    fn cleanup_prompt_wraps_transcript() {
        assert_eq!(
            cleanup_prompt("um so the plan is"),
            "Please clean up the following transcription:\n\num so the plan is"
        );
        assert!(cleanup_prompt("  ").ends_with(EMPTY_TRANSCRIPT));

        let request = cleanup_request("gpt-4.1-mini", "hello");
        assert_eq!(request.messages[0].role, ChatRole::System);
        assert!(request.messages[0].content.contains("H1 at the top"));
        assert_eq!(request.messages[1].role, ChatRole::User);
    }
}
