use super::DashboardState;
use crate::error::CommandError;
use crate::types::AppSettings;

#[tauri::command]
pub fn get_app_settings(state: DashboardState<'_>) -> Result<AppSettings, CommandError> {
    Ok(state.settings()?)
}

#[tauri::command]
pub fn save_app_settings(
    state: DashboardState<'_>,
    settings: AppSettings,
) -> Result<AppSettings, CommandError> {
    Ok(state.update_settings(settings)?)
}
