use crate::config::{self, mask_secret, SETTING_KEYS};
use crate::error::{AppError, Result};
use crate::state::AppState;
use std::collections::HashMap;
use tauri::State;

fn check_key(key: &str) -> Result<()> {
    if config::is_setting_key(key) {
        Ok(())
    } else {
        Err(AppError::InvalidInput(format!("Unknown setting key: {}", key)))
    }
}

/// Stored overrides only; values from the environment are not shown.
#[tauri::command]
pub fn get_settings(state: State<'_, AppState>) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();
    for (key, _) in SETTING_KEYS {
        if let Some(value) = state.db.get_setting(key)? {
            let shown = if key.ends_with("api_key") {
                mask_secret(&value)
            } else {
                value
            };
            map.insert(key.to_string(), shown);
        }
    }
    Ok(map)
}

#[tauri::command]
pub fn set_setting(state: State<'_, AppState>, key: String, value: String) -> Result<()> {
    config::update_setting(&state.db, &key, &value)
}

#[tauri::command]
pub fn delete_setting(state: State<'_, AppState>, key: String) -> Result<()> {
    check_key(&key)?;
    state.db.delete_setting(&key)?;
    Ok(())
}
