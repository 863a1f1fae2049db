use super::AppState;
use crate::models::{CustomDocument, SheetDescriptor};
use serde::Serialize;
use std::path::PathBuf;
use tauri::{Emitter, State};

#[derive(Clone, Serialize)]
struct UploadProgressEvent {
    document_id: String,
    progress: u8,
}

#[derive(Serialize)]
pub struct DocumentList {
    documents: Vec<CustomDocument>,
    fetch_failed: bool,
}

#[tauri::command]
pub fn list_documents(state: State<'_, AppState>) -> DocumentList {
    DocumentList {
        documents: state.controller.documents().as_ref().clone(),
        fetch_failed: state.controller.documents_fetch_failed(),
    }
}

#[tauri::command]
pub async fn refresh_documents(state: State<'_, AppState>) -> Result<DocumentList, String> {
    state.controller.refresh().await;
    Ok(list_documents(state))
}

#[tauri::command]
pub async fn delete_document(
    state: State<'_, AppState>,
    name: String,
) -> Result<DocumentList, String> {
    state.controller.delete(&name).await;
    Ok(list_documents(state))
}

#[tauri::command]
pub async fn prepare_upload(
    state: State<'_, AppState>,
    file_path: String,
    mime: Option<String>,
) -> Result<Vec<SheetDescriptor>, String> {
    state
        .controller
        .prepare_upload(&PathBuf::from(file_path), mime.as_deref())
        .await
        .map_err(|e| e.to_string())
}

/// Start an upload and stream its progress as `upload-progress` events.
#[tauri::command]
pub async fn upload_document(
    app: tauri::AppHandle,
    state: State<'_, AppState>,
    file_path: String,
    descriptors: Vec<SheetDescriptor>,
) -> Result<String, String> {
    let handle = state
        .controller
        .upload(PathBuf::from(file_path), descriptors)
        .map_err(|e| e.to_string())?;
    let document_id = handle.document_id.clone();
    let mut progress = handle.progress();

    let id = document_id.clone();
    tauri::async_runtime::spawn(async move {
        while progress.changed().await.is_ok() {
            let value = *progress.borrow_and_update();
            let _ = app.emit(
                "upload-progress",
                UploadProgressEvent {
                    document_id: id.clone(),
                    progress: value,
                },
            );
        }
    });
    tauri::async_runtime::spawn(async move {
        if let Err(e) = handle.finish().await {
            tracing::debug!(error = %e, "desktop upload finished with error");
        }
    });
    Ok(document_id)
}
