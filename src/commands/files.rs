use crate::error::{AppError, Result};
use crate::session::{FileSummary, SessionState, TablePreview};
use crate::state::AppState;
use serde::Serialize;
use tauri::State;

const PREVIEW_ROWS: usize = 10;

#[derive(Debug, Serialize)]
pub struct FilesView {
    pub files: Vec<FileSummary>,
    pub current: Option<String>,
}

impl FilesView {
    fn of(session: &SessionState) -> Self {
        Self {
            files: session.files().iter().map(|f| f.summary()).collect(),
            current: session.current_file_id().map(str::to_string),
        }
    }
}

/// `contents` is the file's text as read by the frontend.
#[tauri::command]
pub async fn upload_file(
    state: State<'_, AppState>,
    name: String,
    contents: String,
) -> Result<FileSummary> {
    let mut session = state.session.lock().await;
    Ok(session.upload(&name, contents.as_bytes())?.summary())
}

#[tauri::command]
pub async fn list_files(state: State<'_, AppState>) -> Result<FilesView> {
    let session = state.session.lock().await;
    if !session.is_authenticated() {
        return Err(AppError::NotSignedIn);
    }
    Ok(FilesView::of(&session))
}

#[tauri::command]
pub async fn switch_file(state: State<'_, AppState>, file_id: String) -> Result<FileSummary> {
    let mut session = state.session.lock().await;
    Ok(session.switch_to(&file_id)?.summary())
}

#[tauri::command]
pub async fn delete_current_file(state: State<'_, AppState>) -> Result<FilesView> {
    let mut session = state.session.lock().await;
    session.delete_current()?;
    Ok(FilesView::of(&session))
}

#[tauri::command]
pub async fn clear_chat(state: State<'_, AppState>) -> Result<()> {
    let mut session = state.session.lock().await;
    session.clear_chat()
}

#[tauri::command]
pub async fn preview_file(state: State<'_, AppState>) -> Result<TablePreview> {
    let session = state.session.lock().await;
    session.preview(PREVIEW_ROWS)
}
