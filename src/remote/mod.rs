pub mod chat_store;
pub mod chatbot;

pub use chat_store::StoreClient;
pub use chatbot::ChatbotClient;

use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
}

impl Serialize for BackendError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Turn a non-success response into `BackendError::Api`.
async fn check(resp: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        return Err(BackendError::Api {
            status,
            message: text,
        });
    }
    Ok(resp)
}

/// Join `segments` onto `base`, percent-encoding each one.
fn endpoint(base: &str, segments: &[&str]) -> Result<reqwest::Url, BackendError> {
    let mut url =
        reqwest::Url::parse(base).map_err(|e| BackendError::Parse(format!("{}: {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| BackendError::Parse(format!("{} cannot be a base URL", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
