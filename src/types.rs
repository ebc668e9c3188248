use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

pub const NOTION_API_BASE_URL: &str = "https://api.notion.com/v1";
pub const NOTION_API_VERSION: &str = "2022-06-28";
pub const OPENAI_API_BASE_URL: &str = "https://api.openai.com/v1";

pub const KEYCHAIN_SERVICE: &str = "com.keeponfirst.notion-dashboard";
pub const NOTION_USERNAME: &str = "notion_api_key";
pub const OPENAI_USERNAME: &str = "openai_api_key";
pub const NOTION_API_KEY_ENV: &str = "NOTION_API_KEY";
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const STT_BASE_PROMPT_ENV: &str = "STT_BASE_PROMPT";

pub const SETTINGS_DIR_NAME: &str = "notion-dashboard";
pub const SETTINGS_FILE_NAME: &str = "settings.json";

pub const DEFAULT_CHAT_MODEL: &str = "gpt-4.1-mini";
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "gpt-4o-mini-transcribe";

pub const MAX_DATABASE_PAGE_SIZE: usize = 100;
pub const MAX_PAGE_QUERY_SIZE: usize = 50;
pub const MAX_CHILDREN_PER_REQUEST: usize = 100;
pub const MAX_RICH_TEXT_CHARS: usize = 2000;

pub const UNTITLED_DATABASE: &str = "Untitled Database";
pub const UNTITLED_PAGE: &str = "Untitled Page";
pub const DEFAULT_NOTE_TITLE: &str = "New Note";
pub const DEFAULT_TITLE_PROPERTY: &str = "Name";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DatabaseProperty {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NotionDatabase {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub created_time: String,
    pub last_edited_time: String,
    pub properties: Vec<DatabaseProperty>,
    pub archived: bool,
    pub is_inline: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NotionPage {
    pub id: String,
    pub title: String,
    pub url: String,
    pub created_time: String,
    pub last_edited_time: String,
    pub archived: bool,
    pub in_trash: bool,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DatabaseList {
    pub databases: Vec<NotionDatabase>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
    pub total_count: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PageList {
    pub pages: Vec<NotionPage>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
    pub total_count: usize,
    pub database_id: String,
}

/// Query options for a database's page list.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub page_size: Option<usize>,
    pub start_cursor: Option<String>,
    pub filter: Option<Value>,
    pub sorts: Option<Value>,
}

impl PageQuery {
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            page_size: Some(page_size),
            ..Self::default()
        }
    }

    pub fn effective_page_size(&self) -> usize {
        self.page_size
            .unwrap_or(MAX_PAGE_QUERY_SIZE)
            .clamp(1, MAX_PAGE_QUERY_SIZE)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CreatedPage {
    pub id: String,
    pub url: Option<String>,
}

/// A Notion page that has been created from a Markdown note.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PublishedNote {
    pub page: CreatedPage,
    pub title: String,
}

/// Outcome of converting a batch of pages. Every id is attempted; failures
/// are reported next to the successes rather than aborting the batch.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MarkdownBatch {
    pub success: bool,
    pub data: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<BTreeMap<String, String>>,
    pub processed_count: usize,
    pub error_count: usize,
}

impl MarkdownBatch {
    pub fn from_parts(data: BTreeMap<String, String>, errors: BTreeMap<String, String>) -> Self {
        Self {
            success: !data.is_empty(),
            processed_count: data.len(),
            error_count: errors.len(),
            errors: if errors.is_empty() { None } else { Some(errors) },
            data,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Transcription {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotionSettings {
    #[serde(default)]
    pub default_database_id: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for NotionSettings {
    fn default() -> Self {
        Self {
            default_database_id: None,
            page_size: default_page_size(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OpenAiSettings {
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,
    #[serde(default)]
    pub stt_base_prompt: String,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            chat_model: default_chat_model(),
            transcription_model: default_transcription_model(),
            stt_base_prompt: String::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    #[serde(default)]
    pub notion: NotionSettings,
    #[serde(default)]
    pub openai: OpenAiSettings,
    #[serde(default)]
    pub ui_preferences: Value,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            notion: NotionSettings::default(),
            openai: OpenAiSettings::default(),
            ui_preferences: json!({}),
        }
    }
}

fn default_page_size() -> usize {
    MAX_PAGE_QUERY_SIZE
}

fn default_chat_model() -> String {
    DEFAULT_CHAT_MODEL.to_string()
}

fn default_transcription_model() -> String {
    DEFAULT_TRANSCRIPTION_MODEL.to_string()
}
