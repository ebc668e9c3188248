use super::DashboardState;
use crate::drag::{DragEffect, Modifiers, PointerTarget};
use crate::error::CommandError;
use crate::store::Selection;

#[tauri::command]
pub fn replace_selection(
    state: DashboardState<'_>,
    selection: Selection,
) -> Result<usize, CommandError> {
    Ok(state.replace_selection(selection)?)
}

#[tauri::command]
pub fn toggle_row(state: DashboardState<'_>, row_index: usize) -> Result<usize, CommandError> {
    Ok(state.toggle_row(row_index)?)
}

#[tauri::command]
pub fn select_all(state: DashboardState<'_>, selected: bool) -> Result<usize, CommandError> {
    Ok(state.select_all(selected)?)
}

#[tauri::command]
pub fn clear_selection(state: DashboardState<'_>) -> Result<(), CommandError> {
    Ok(state.clear_selection()?)
}

#[tauri::command]
pub fn pointer_down(
    state: DashboardState<'_>,
    row_index: usize,
    target: Option<PointerTarget>,
    modifiers: Option<Modifiers>,
) -> Result<DragEffect, CommandError> {
    Ok(state.pointer_down(
        row_index,
        target.unwrap_or_default(),
        modifiers.unwrap_or_default(),
    )?)
}

#[tauri::command]
pub fn pointer_enter(state: DashboardState<'_>, row_index: usize) -> Result<DragEffect, CommandError> {
    Ok(state.pointer_enter(row_index)?)
}

#[tauri::command]
pub fn pointer_up(state: DashboardState<'_>) -> Result<DragEffect, CommandError> {
    Ok(state.pointer_up()?)
}

#[tauri::command]
pub fn escape_drag(state: DashboardState<'_>) -> Result<DragEffect, CommandError> {
    Ok(state.escape()?)
}
