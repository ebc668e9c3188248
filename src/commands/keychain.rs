use crate::error::CommandError;
use crate::storage::keychain::{clear_secret, has_secret, set_secret, Secret};

#[tauri::command]
pub fn set_notion_api_key(api_key: String) -> Result<bool, CommandError> {
    Ok(set_secret(Secret::Notion, api_key)?)
}

#[tauri::command]
pub fn has_notion_api_key() -> Result<bool, CommandError> {
    Ok(has_secret(Secret::Notion)?)
}

#[tauri::command]
pub fn clear_notion_api_key() -> Result<bool, CommandError> {
    Ok(clear_secret(Secret::Notion)?)
}

#[tauri::command]
pub fn set_openai_api_key(api_key: String) -> Result<bool, CommandError> {
    Ok(set_secret(Secret::OpenAi, api_key)?)
}

#[tauri::command]
pub fn has_openai_api_key() -> Result<bool, CommandError> {
    Ok(has_secret(Secret::OpenAi)?)
}

#[tauri::command]
pub fn clear_openai_api_key() -> Result<bool, CommandError> {
    Ok(clear_secret(Secret::OpenAi)?)
}
