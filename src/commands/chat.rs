use super::AppState;
use crate::models::ChatMessage;
use crate::session::Retry;
use serde::Serialize;
use tauri::State;

#[derive(Serialize)]
pub struct RetryPayload {
    prefill: String,
    options: Vec<String>,
}

impl From<Retry> for RetryPayload {
    fn from(r: Retry) -> Self {
        Self {
            prefill: r.prefill,
            options: r.options,
        }
    }
}

#[tauri::command]
pub fn get_messages(state: State<'_, AppState>) -> Vec<ChatMessage> {
    state.controller.messages().as_ref().clone()
}

#[tauri::command]
pub async fn load_history(state: State<'_, AppState>) -> Result<usize, String> {
    state
        .controller
        .load_history()
        .await
        .map_err(|e| e.to_string())
}

/// Always resolves with the bot reply (possibly the fallback), or `null`
/// for blank input.
#[tauri::command]
pub async fn send_message(
    state: State<'_, AppState>,
    content: String,
) -> Result<Option<ChatMessage>, String> {
    Ok(state.controller.send(&content).await)
}

#[tauri::command]
pub fn feedback_target(state: State<'_, AppState>) -> Option<usize> {
    state.controller.feedback_target()
}

#[tauri::command]
pub fn thumbs_up(state: State<'_, AppState>) {
    state.controller.thumbs_up();
}

#[tauri::command]
pub fn thumbs_down(state: State<'_, AppState>) -> Option<RetryPayload> {
    state.controller.thumbs_down().map(RetryPayload::from)
}

#[tauri::command]
pub async fn resubmit(
    state: State<'_, AppState>,
    content: String,
    target: String,
) -> Result<Option<ChatMessage>, String> {
    Ok(state.controller.resubmit(&content, &target).await)
}
