use crate::models::{ChatMessage, ChatRecord};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store I/O error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Store file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

type Records = BTreeMap<String, ChatRecord>;

/// Chat transcripts kept in one JSON file, rewritten whole on every append.
pub struct ChatFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ChatFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get(&self, chat_id: &str) -> Result<Option<ChatRecord>, StoreError> {
        let mut records = self.read_all().await?;
        Ok(records.remove(chat_id))
    }

    /// Append to `chat_id`, creating the record if needed. Returns the record.
    pub async fn append(
        &self,
        chat_id: &str,
        messages: Vec<ChatMessage>,
    ) -> Result<ChatRecord, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.read_all().await?;
        let record = records.entry(chat_id.to_string()).or_default();
        record.messages.extend(messages);
        let record = record.clone();
        self.write_all(&records).await?;
        Ok(record)
    }

    async fn read_all(&self) -> Result<Records, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Records::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Records::new()),
            Err(source) => Err(self.io_error(source)),
        }
    }

    async fn write_all(&self, records: &Records) -> Result<(), StoreError> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
        records.serialize(&mut ser)?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| self.io_error(e))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &out)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_creates_and_extends() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChatFileStore::new(dir.path().join("chatResponses.json"));
        assert_eq!(store.get("1").await.unwrap(), None);

        let first = store.append("1", vec![ChatMessage::user("hi")]).await.unwrap();
        assert_eq!(first.messages.len(), 1);

        let second = store
            .append("1", vec![ChatMessage::bot("hello", "/bot.png")])
            .await
            .unwrap();
        assert_eq!(second.messages.len(), 2);
        assert_eq!(second.messages[1].message, "hello");

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\n    \"1\": {"), "file uses four-space indent");
        assert_eq!(store.get("1").await.unwrap(), Some(second));
        assert_eq!(store.get("2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chatResponses.json");
        std::fs::write(&path, "{ nope").unwrap();
        let store = ChatFileStore::new(&path);
        assert!(matches!(store.get("1").await, Err(StoreError::Json(_))));
    }

    #[tokio::test]
    async fn test_concurrent_appends_in_one_process_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(ChatFileStore::new(dir.path().join("c.json")));
        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .append("1", vec![ChatMessage::user(&format!("m{}", i))])
                        .await
                        .unwrap();
                })
            })
            .collect();
        for t in tasks {
            t.await.unwrap();
        }
        assert_eq!(store.get("1").await.unwrap().unwrap().messages.len(), 8);
    }
}
