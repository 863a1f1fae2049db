use super::{check, endpoint, BackendError};
use crate::models::{ChatMessage, ChatRecord};
use reqwest::{Client, StatusCode};

/// Client for the local transcript store (`/api/chat/{id}`).
#[derive(Debug, Clone)]
pub struct StoreClient {
    base_url: String,
    client: Client,
}

impl StoreClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::new(),
        }
    }

    /// `Ok(None)` when the store has no record for `chat_id`.
    pub async fn fetch(&self, chat_id: &str) -> Result<Option<ChatRecord>, BackendError> {
        let url = endpoint(&self.base_url, &["api", "chat", chat_id])?;
        let resp = self.client.get(url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let record = check(resp).await?.json::<ChatRecord>().await?;
        Ok(Some(record))
    }

    /// Append `messages` to the stored transcript; returns the whole record.
    pub async fn append(
        &self,
        chat_id: &str,
        messages: &[ChatMessage],
    ) -> Result<ChatRecord, BackendError> {
        let url = endpoint(&self.base_url, &["api", "chat", chat_id])?;
        let resp = self.client.post(url).json(messages).send().await?;
        Ok(check(resp).await?.json::<ChatRecord>().await?)
    }
}
