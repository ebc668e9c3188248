use super::{run_blocking, DashboardState};
use crate::error::CommandError;
use crate::store::{FetchOutcome, StoreSnapshot};
use crate::types::DatabaseList;

#[tauri::command]
pub async fn list_databases(state: DashboardState<'_>) -> Result<DatabaseList, CommandError> {
    run_blocking(&state, |dashboard| dashboard.load_databases()).await
}

#[tauri::command]
pub async fn set_active_database(
    state: DashboardState<'_>,
    database_id: String,
) -> Result<Option<FetchOutcome>, CommandError> {
    run_blocking(&state, move |dashboard| dashboard.set_active_database(&database_id)).await
}

#[tauri::command]
pub async fn choose_database(
    state: DashboardState<'_>,
    database_id: String,
) -> Result<Option<FetchOutcome>, CommandError> {
    run_blocking(&state, move |dashboard| dashboard.choose_database(&database_id)).await
}

#[tauri::command]
pub async fn refresh_pages(state: DashboardState<'_>) -> Result<Option<FetchOutcome>, CommandError> {
    run_blocking(&state, |dashboard| dashboard.refresh_pages()).await
}

#[tauri::command]
pub fn get_dashboard_state(state: DashboardState<'_>) -> Result<StoreSnapshot, CommandError> {
    Ok(state.snapshot()?)
}
