use crate::auth;
use crate::error::Result;
use crate::session::SignedInUser;
use crate::state::AppState;
use tauri::State;

#[tauri::command]
pub async fn login(
    state: State<'_, AppState>,
    username: String,
    password: String,
) -> Result<SignedInUser> {
    let mut session = state.session.lock().await;
    Ok(session.login(&state.db, &username, &password)?.clone())
}

#[tauri::command]
pub fn register(
    state: State<'_, AppState>,
    username: String,
    password: String,
    name: String,
) -> Result<()> {
    auth::register(&state.db, &username, &password, &name)
}

/// Saves every file session, then forgets them.
#[tauri::command]
pub async fn logout(state: State<'_, AppState>) -> Result<()> {
    state.cancel_inflight();
    let mut session = state.session.lock().await;
    session.logout(&state.db)
}

#[tauri::command]
pub async fn current_user(state: State<'_, AppState>) -> Result<Option<SignedInUser>> {
    let session = state.session.lock().await;
    Ok(session.user().cloned())
}

#[tauri::command]
pub async fn save_session(state: State<'_, AppState>) -> Result<()> {
    let session = state.session.lock().await;
    session.save(&state.db)
}
