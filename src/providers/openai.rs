use super::{ChatCompletion, SpeechToText};
use crate::error::{DashboardError, Result};
use crate::types::{ChatRequest, Transcription, OPENAI_API_BASE_URL};
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use serde_json::{json, Value};
use std::io::{BufRead, BufReader};
use std::time::Duration as StdDuration;

const PROVIDER: &str = "OpenAI";
const RECORDING_FILE_NAME: &str = "recording.webm";
const RECORDING_MIME: &str = "audio/webm";

pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    transcription_model: String,
    stt_base_prompt: String,
}

impl OpenAiClient {
    pub fn new(
        api_key: impl Into<String>,
        transcription_model: impl Into<String>,
        stt_base_prompt: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(StdDuration::from_secs(120))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: OPENAI_API_BASE_URL.to_string(),
            transcription_model: transcription_model.into(),
            stt_base_prompt: stt_base_prompt.into(),
        })
    }

    /// Client for chat completions only. The model travels with each
    /// `ChatRequest`, so no transcription settings are needed.
    pub fn for_chat(api_key: impl Into<String>) -> Result<Self> {
        Self::new(api_key, String::new(), String::new())
    }

    fn check(response: reqwest::blocking::Response) -> Result<reqwest::blocking::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text()?;
        let error = DashboardError::upstream(PROVIDER, status.as_u16(), &body);
        log::warn!("{error}");
        Err(error)
    }
}

impl SpeechToText for OpenAiClient {
    fn transcribe(&self, audio: &[u8]) -> Result<Transcription> {
        if audio.is_empty() {
            return Err(DashboardError::InvalidInput("No audio file provided".to_string()));
        }
        if self.transcription_model.trim().is_empty() {
            return Err(DashboardError::InvalidInput(
                "No transcription model configured".to_string(),
            ));
        }

        let file = Part::bytes(audio.to_vec())
            .file_name(RECORDING_FILE_NAME)
            .mime_str(RECORDING_MIME)?;
        let mut form = Form::new()
            .part("file", file)
            .text("model", self.transcription_model.clone());
        if !self.stt_base_prompt.trim().is_empty() {
            form = form.text("prompt", self.stt_base_prompt.clone());
        }

        log::info!(
            "Transcribing {} byte(s) of audio with {}",
            audio.len(),
            self.transcription_model
        );
        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()?;
        let value: Value = Self::check(response)?.json()?;
        let text = value
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(Transcription { text })
    }
}

impl ChatCompletion for OpenAiClient {
    fn stream_chat(&self, request: &ChatRequest, on_chunk: &mut dyn FnMut(&str)) -> Result<String> {
        let payload = json!({
            "model": request.model,
            "messages": request.messages,
            "stream": true,
        });

        log::info!(
            "Streaming chat completion with {} ({} message(s))",
            request.model,
            request.messages.len()
        );
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()?;
        let reader = BufReader::new(Self::check(response)?);
        read_event_stream(reader, on_chunk)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamLine {
    Delta(String),
    Done,
    Skip,
}

/// Interpret one line of a chat-completions event stream.
pub fn parse_stream_line(line: &str) -> Result<StreamLine> {
    let Some(data) = line.trim_end().strip_prefix("data:") else {
        return Ok(StreamLine::Skip);
    };
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(StreamLine::Done);
    }
    if data.is_empty() {
        return Ok(StreamLine::Skip);
    }

    let value: Value = serde_json::from_str(data)?;
    if let Some(error) = value.get("error") {
        return Err(DashboardError::upstream(PROVIDER, 500, &json!({ "error": error }).to_string()));
    }
    let delta = value
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("delta"))
        .and_then(|delta| delta.get("content"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    if delta.is_empty() {
        Ok(StreamLine::Skip)
    } else {
        Ok(StreamLine::Delta(delta.to_string()))
    }
}

/// Drain an event stream, forwarding deltas until `[DONE]` or end of input.
pub fn read_event_stream<R: BufRead>(reader: R, on_chunk: &mut dyn FnMut(&str)) -> Result<String> {
    let mut reply = String::new();
    for line in reader.lines() {
        match parse_stream_line(&line?)? {
            StreamLine::Delta(delta) => {
                on_chunk(&delta);
                reply.push_str(&delta);
            }
            StreamLine::Done => break,
            StreamLine::Skip => {}
        }
    }
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn stream_lines_are_classified() {
        assert_eq!(parse_stream_line("data: [DONE]").expect("done"), StreamLine::Done);
        assert_eq!(parse_stream_line(": keep-alive").expect("comment"), StreamLine::Skip);
        assert_eq!(parse_stream_line("").expect("blank"), StreamLine::Skip);
        assert_eq!(
            parse_stream_line(r#"data: {"choices":[{"delta":{"content":"Hi"}}]}"#).expect("delta"),
            StreamLine::Delta("Hi".to_string())
        );
        assert_eq!(
            parse_stream_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#)
                .expect("role only"),
            StreamLine::Skip
        );
    }

    #[test]
    fn stream_is_assembled_and_forwarded() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"# Notes\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"\\n\\nBody\"}}]}\n\n",
            "data: [DONE]\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n",
        );
        let mut chunks = Vec::new();
        let reply = read_event_stream(Cursor::new(body), &mut |chunk: &str| chunks.push(chunk.to_string()))
            .expect("stream");
        assert_eq!(reply, "# Notes\n\nBody");
        assert_eq!(chunks, vec!["# Notes", "\n\nBody"]);
    }

    #[test]
    fn error_events_become_upstream_errors() {
        let line = r#"data: {"error":{"message":"model overloaded","code":"server_error"}}"#;
        let error = parse_stream_line(line).expect_err("error event");
        assert!(error.to_string().contains("model overloaded"));
    }

    #[test]
    fn empty_audio_is_rejected_before_upload() {
        let client = OpenAiClient::new("sk-test", "gpt-4o-mini-transcribe", "").expect("client");
        assert!(matches!(
            client.transcribe(&[]),
            Err(DashboardError::InvalidInput(_))
        ));
    }

    #[test]
    fn chat_client_carries_no_transcription_settings() {
        let client = OpenAiClient::for_chat("sk-test").expect("client");
        assert!(client.transcription_model.is_empty());
        assert!(client.stt_base_prompt.is_empty());
        let error = client.transcribe(b"webm-bytes").expect_err("no model");
        assert_eq!(
            error.to_string(),
            "Invalid input: No transcription model configured"
        );
    }
}
