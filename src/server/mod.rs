//! Local transcript endpoint: `GET`/`POST /api/chat/:id` over a JSON file.

pub mod store;

pub use store::{ChatFileStore, StoreError};

use crate::models::ChatMessage;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;

pub fn router(store: Arc<ChatFileStore>) -> Router {
    Router::new()
        .route("/api/chat/:id", get(get_chat).post(append_chat))
        .with_state(store)
}

/// Bind `addr` and serve until ctrl-c.
pub async fn serve(addr: SocketAddr, store: Arc<ChatFileStore>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        file = %store.path().display(),
        "chat store listening"
    );
    axum::serve(listener, router(store))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}

async fn get_chat(State(store): State<Arc<ChatFileStore>>, Path(id): Path<String>) -> Response {
    match store.get(&id).await {
        Ok(Some(record)) => Json(record).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Chat not found" })),
        )
            .into_response(),
        Err(e) => internal(e),
    }
}

async fn append_chat(
    State(store): State<Arc<ChatFileStore>>,
    Path(id): Path<String>,
    Json(messages): Json<Vec<ChatMessage>>,
) -> Response {
    let count = messages.len();
    match store.append(&id, messages).await {
        Ok(record) => {
            tracing::debug!(chat_id = %id, appended = count, total = record.messages.len(), "chat appended");
            Json(record).into_response()
        }
        Err(e) => internal(e),
    }
}

fn internal(e: StoreError) -> Response {
    tracing::error!(error = %e, "chat store failure");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": e.to_string() })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChatRecord;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app() -> (Router, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ChatFileStore::new(dir.path().join("chatResponses.json")));
        (router(store), dir)
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_chat_is_404() {
        let (app, _dir) = app();
        let resp = app
            .oneshot(Request::get("/api/chat/1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(resp).await["message"], "Chat not found");
    }

    #[tokio::test]
    async fn test_post_appends_and_echoes_record() {
        let (app, _dir) = app();
        let batch = vec![ChatMessage::user("hi"), ChatMessage::bot("hello", "/bot.png")];

        let post = Request::post("/api/chat/1")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&batch).unwrap()))
            .unwrap();
        let resp = app.clone().oneshot(post).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let echoed: ChatRecord = serde_json::from_value(body_json(resp).await).unwrap();
        assert_eq!(echoed.messages, batch);

        let resp = app
            .oneshot(Request::get("/api/chat/1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let fetched: ChatRecord = serde_json::from_value(body_json(resp).await).unwrap();
        assert_eq!(fetched.messages.len(), 2);
        assert!(fetched.messages[1].is_bot);
    }

    #[tokio::test]
    async fn test_malformed_body_is_rejected() {
        let (app, _dir) = app();
        let post = Request::post("/api/chat/1")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"not":"an array"}"#))
            .unwrap();
        let resp = app.oneshot(post).await.unwrap();
        assert!(resp.status().is_client_error());
    }
}
