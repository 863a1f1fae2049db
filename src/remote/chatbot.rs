use super::{check, endpoint, BackendError};
use crate::models::{RemoteDocument, SheetDescriptor};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Client for the remote chatbot service.
#[derive(Debug, Clone)]
pub struct ChatbotClient {
    base_url: String,
    client: Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    chat_id: Option<&'a str>,
}

#[derive(Serialize)]
struct QueryDocRequest<'a> {
    message: &'a str,
    file: &'a str,
}

#[derive(Serialize)]
struct DescriptionEntry<'a> {
    name: &'a str,
    description: &'a str,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListingResponse {
    Bare(Vec<RemoteDocument>),
    Wrapped { documents: Vec<RemoteDocument> },
}

impl ChatbotClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    pub async fn list_documents(&self) -> Result<Vec<RemoteDocument>, BackendError> {
        let url = endpoint(&self.base_url, &["documents"])?;
        tracing::debug!(%url, "listing documents");
        let resp = check(self.client.get(url).send().await?).await?;
        let text = resp.text().await?;
        let listing: ListingResponse =
            serde_json::from_str(&text).map_err(|e| BackendError::Parse(e.to_string()))?;
        Ok(match listing {
            ListingResponse::Bare(docs) | ListingResponse::Wrapped { documents: docs } => docs,
        })
    }

    pub async fn delete_document(&self, name: &str) -> Result<(), BackendError> {
        let url = endpoint(&self.base_url, &["documents", name])?;
        tracing::debug!(%url, "deleting document");
        check(self.client.delete(url).send().await?).await?;
        Ok(())
    }

    pub async fn post_descriptions(
        &self,
        descriptors: &[SheetDescriptor],
    ) -> Result<(), BackendError> {
        let url = endpoint(&self.base_url, &["descriptions"])?;
        let body: Vec<DescriptionEntry> = descriptors
            .iter()
            .map(|d| DescriptionEntry {
                name: &d.name,
                description: &d.title,
            })
            .collect();
        tracing::debug!(%url, count = body.len(), "posting descriptions");
        check(self.client.post(url).json(&body).send().await?).await?;
        Ok(())
    }

    /// Multipart upload of the raw file, tagged with `id`.
    pub async fn upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        id: &str,
    ) -> Result<(), BackendError> {
        let url = endpoint(&self.base_url, &["upload"])?;
        let size = bytes.len();
        let part = Part::bytes(bytes).file_name(file_name.to_string());
        let form = Form::new().text("id", id.to_string()).part("file", part);
        tracing::debug!(%url, file = file_name, size, "uploading file");
        check(self.client.post(url).multipart(form).send().await?).await?;
        Ok(())
    }

    /// General query. Returns the reply text.
    pub async fn query(&self, message: &str, chat_id: Option<&str>) -> Result<String, BackendError> {
        let url = endpoint(&self.base_url, &["query"])?;
        let body = QueryRequest { message, chat_id };
        let resp = check(self.client.post(url).json(&body).send().await?).await?;
        reply_text(resp).await
    }

    /// Query scoped to one document or sheet.
    pub async fn query_doc(&self, message: &str, file: &str) -> Result<String, BackendError> {
        let url = endpoint(&self.base_url, &["querydoc"])?;
        let body = QueryDocRequest { message, file };
        let resp = check(self.client.post(url).json(&body).send().await?).await?;
        reply_text(resp).await
    }
}

async fn reply_text(resp: reqwest::Response) -> Result<String, BackendError> {
    let text = resp.text().await?;
    Ok(extract_reply(&text))
}

/// Pull the answer out of a reply body. Object bodies carry it in `message`
/// (or `response`/`answer`); a bare JSON string is the answer itself;
/// anything else is used verbatim.
pub fn extract_reply(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::String(s)) => s,
        Ok(serde_json::Value::Object(map)) => ["message", "response", "answer"]
            .iter()
            .find_map(|k| map.get(*k).and_then(|v| v.as_str()))
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string()),
        _ => body.to_string(),
    }
}
