use crate::answer::ChatEntry;
use crate::error::{AppError, Result};
use crate::orchestrator::AskOutcome;
use crate::state::AppState;
use tauri::State;

/// Ask about the current file. Starting a new question cancels one that is
/// still running.
#[tauri::command]
pub async fn ask_question(state: State<'_, AppState>, question: String) -> Result<AskOutcome> {
    let factory = state.agent_factory();
    let request = state.begin_request();
    let outcome = {
        let mut session = state.session.lock().await;
        session.ask(&factory, &question, &request.token).await
    };
    state.finish_request(&request);
    outcome
}

#[tauri::command]
pub fn cancel_question(state: State<'_, AppState>) -> bool {
    state.cancel_inflight()
}

#[tauri::command]
pub async fn get_history(state: State<'_, AppState>) -> Result<Vec<ChatEntry>> {
    let session = state.session.lock().await;
    let file = session.current().ok_or(AppError::NoCurrentFile)?;
    Ok(file.chat_history.clone())
}
