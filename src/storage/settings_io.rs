use crate::error::Result;
use crate::types::{
    AppSettings, DEFAULT_CHAT_MODEL, DEFAULT_TRANSCRIPTION_MODEL, MAX_PAGE_QUERY_SIZE,
    SETTINGS_DIR_NAME, SETTINGS_FILE_NAME, STT_BASE_PROMPT_ENV,
};
use crate::util::{option_non_empty, write_atomic};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

pub fn app_settings_path() -> PathBuf {
    let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join(SETTINGS_DIR_NAME).join(SETTINGS_FILE_NAME)
}

pub fn normalize_settings(mut settings: AppSettings) -> AppSettings {
    settings.notion.default_database_id = settings
        .notion
        .default_database_id
        .take()
        .and_then(option_non_empty);
    settings.notion.page_size = settings.notion.page_size.clamp(1, MAX_PAGE_QUERY_SIZE);

    if settings.openai.chat_model.trim().is_empty() {
        settings.openai.chat_model = DEFAULT_CHAT_MODEL.to_string();
    }
    if settings.openai.transcription_model.trim().is_empty() {
        settings.openai.transcription_model = DEFAULT_TRANSCRIPTION_MODEL.to_string();
    }
    settings.openai.chat_model = settings.openai.chat_model.trim().to_string();
    settings.openai.transcription_model = settings.openai.transcription_model.trim().to_string();

    if !settings.ui_preferences.is_object() {
        settings.ui_preferences = json!({});
    }
    settings
}

/// Missing or unreadable files yield defaults; the dashboard must still start.
pub fn load_settings_from(path: &Path) -> AppSettings {
    if !path.exists() {
        return AppSettings::default();
    }

    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<AppSettings>(&content) {
            Ok(settings) => normalize_settings(settings),
            Err(error) => {
                log::warn!("Ignoring corrupt settings file {}: {error}", path.display());
                AppSettings::default()
            }
        },
        Err(error) => {
            log::warn!("Cannot read settings file {}: {error}", path.display());
            AppSettings::default()
        }
    }
}

pub fn load_settings() -> AppSettings {
    load_settings_from(&app_settings_path())
}

pub fn save_settings_to(path: &Path, settings: &AppSettings) -> Result<AppSettings> {
    let normalized = normalize_settings(settings.clone());
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let bytes = serde_json::to_vec_pretty(&normalized)?;
    write_atomic(path, &bytes)?;
    Ok(normalized)
}

pub fn save_settings(settings: &AppSettings) -> Result<AppSettings> {
    save_settings_to(&app_settings_path(), settings)
}

/// Transcription prompt: `STT_BASE_PROMPT` wins over the settings file.
pub fn effective_stt_prompt(settings: &AppSettings) -> String {
    std::env::var(STT_BASE_PROMPT_ENV)
        .ok()
        .and_then(option_non_empty)
        .unwrap_or_else(|| settings.openai.stt_base_prompt.trim().to_string())
}

pub fn ui_preference<'a>(settings: &'a AppSettings, key: &str) -> Option<&'a Value> {
    settings.ui_preferences.get(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = load_settings_from(&dir.path().join("absent.json"));
        assert_eq!(settings, AppSettings::default());
        assert_eq!(settings.openai.chat_model, DEFAULT_CHAT_MODEL);
        assert_eq!(settings.notion.page_size, 50);
    }

    #[test]
    fn corrupt_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").expect("write");
        assert_eq!(load_settings_from(&path), AppSettings::default());
    }

    #[test]
    fn save_normalizes_and_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("settings.json");

        let mut settings = AppSettings::default();
        settings.notion.default_database_id = Some("  db-1 ".to_string());
        settings.notion.page_size = 400;
        settings.openai.chat_model = " ".to_string();
        settings.ui_preferences = json!({ "theme": "dark" });

        let saved = save_settings_to(&path, &settings).expect("save");
        assert_eq!(saved.notion.default_database_id.as_deref(), Some("db-1"));
        assert_eq!(saved.notion.page_size, 50);
        assert_eq!(saved.openai.chat_model, DEFAULT_CHAT_MODEL);

        let loaded = load_settings_from(&path);
        assert_eq!(loaded, saved);
        assert_eq!(ui_preference(&loaded, "theme"), Some(&json!("dark")));
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "openai": { "sttBasePrompt": "Product names: Notion" } }"#)
            .expect("write");
        let loaded = load_settings_from(&path);
        assert_eq!(loaded.openai.stt_base_prompt, "Product names: Notion");
        assert_eq!(loaded.openai.transcription_model, DEFAULT_TRANSCRIPTION_MODEL);
        assert_eq!(loaded.ui_preferences, json!({}));
    }
}
