use super::AppState;
use crate::config::{check_setting, Settings, SETTING_KEYS};
use std::collections::HashMap;
use tauri::State;

/// Effective settings, defaults included.
#[tauri::command]
pub fn get_settings(state: State<'_, AppState>) -> Result<Settings, String> {
    Settings::load(&state.db, &state.data_dir).map_err(|e| e.to_string())
}

/// Raw stored values only.
#[tauri::command]
pub fn get_stored_settings(state: State<'_, AppState>) -> Result<HashMap<String, String>, String> {
    let mut map = HashMap::new();
    for key in SETTING_KEYS {
        if let Some(value) = state.db.get_setting(key).map_err(|e| e.to_string())? {
            map.insert(key.to_string(), value);
        }
    }
    Ok(map)
}

/// Takes effect on the next start.
#[tauri::command]
pub fn set_setting(state: State<'_, AppState>, key: String, value: String) -> Result<(), String> {
    check_setting(&key, &value)?;
    state.db.set_setting(&key, &value).map_err(|e| e.to_string())
}

#[tauri::command]
pub fn delete_setting(state: State<'_, AppState>, key: String) -> Result<(), String> {
    state
        .db
        .delete_setting(&key)
        .map(|_| ())
        .map_err(|e| e.to_string())
}
