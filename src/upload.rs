use crate::documents::DocumentStore;
use crate::models::SheetDescriptor;
use crate::notice::Notifier;
use crate::remote::{BackendError, ChatbotClient};
use crate::sheets::{self, FileKind, SheetError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Highest value the simulated animation may show before the server confirms.
pub const SIMULATED_CAP: u8 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ProgressMode {
    /// 0 until the server confirms, then 100.
    Binary,
    /// Advance by `step` every `tick` until `ceiling` has elapsed.
    Simulated {
        step: u8,
        tick: Duration,
        ceiling: Duration,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("{0} is not a supported file type (xls, xlsx, csv, pdf)")]
    Rejected(String),
    #[error(transparent)]
    Sheets(#[from] SheetError),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("Upload task failed: {0}")]
    Task(String),
}

impl Serialize for UploadError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Percent complete, updated as the upload advances.
pub type ProgressStream = watch::Receiver<u8>;

/// A running upload. Dropping the handle does not cancel it.
pub struct UploadHandle {
    pub document_id: String,
    progress: ProgressStream,
    task: JoinHandle<Result<(), UploadError>>,
}

impl UploadHandle {
    pub fn progress(&self) -> ProgressStream {
        self.progress.clone()
    }

    /// Wait for the upload and the follow-up refresh to finish.
    pub async fn finish(self) -> Result<(), UploadError> {
        self.task
            .await
            .map_err(|e| UploadError::Task(e.to_string()))?
    }
}

pub struct UploadPipeline {
    client: Arc<ChatbotClient>,
    documents: Arc<DocumentStore>,
    notifier: Notifier,
    mode: ProgressMode,
}

impl UploadPipeline {
    pub fn new(
        client: Arc<ChatbotClient>,
        documents: Arc<DocumentStore>,
        notifier: Notifier,
        mode: ProgressMode,
    ) -> Self {
        Self {
            client,
            documents,
            notifier,
            mode,
        }
    }

    /// Check a dropped file against the allow-list. A MIME type, when it says
    /// anything, must be allowed too.
    pub fn validate(&self, name: &str, mime: Option<&str>) -> Result<FileKind, UploadError> {
        let by_name = FileKind::from_name(name);
        let mime_ok = match mime.map(str::trim) {
            None | Some("") | Some("application/octet-stream") => true,
            Some(m) => FileKind::from_mime(m).is_some(),
        };
        match by_name {
            Some(kind) if mime_ok => Ok(kind),
            _ => {
                tracing::info!(file = name, mime = ?mime, "rejected upload");
                self.notifier
                    .error(format!("{}: only xls, xlsx, csv and pdf files are supported", name));
                Err(UploadError::Rejected(name.to_string()))
            }
        }
    }

    /// Validate `path` and list the descriptors the user should fill in.
    pub async fn prepare(
        &self,
        path: &Path,
        mime: Option<&str>,
    ) -> Result<Vec<SheetDescriptor>, UploadError> {
        let name = sheets::file_name(path);
        self.validate(&name, mime)?;
        sheets::read(path).await.map_err(|e| {
            tracing::warn!(file = %name, error = %e, "could not read sheets");
            self.notifier.error(format!("Could not read {}: {}", name, e));
            UploadError::from(e)
        })
    }

    /// Post the descriptions and the file, then refresh the document list.
    /// Files outside the allow-list are refused before anything is sent.
    pub fn submit(
        &self,
        path: PathBuf,
        descriptors: Vec<SheetDescriptor>,
    ) -> Result<UploadHandle, UploadError> {
        let name = sheets::file_name(&path);
        self.validate(&name, None)?;
        let sheet_names = descriptors.iter().filter_map(|d| d.sheet.clone()).collect();
        let document_id = self.documents.add_pending(&name, path.clone(), sheet_names);
        let (tx, rx) = watch::channel(0u8);

        let job = Job {
            client: self.client.clone(),
            documents: self.documents.clone(),
            notifier: self.notifier.clone(),
            mode: self.mode,
            progress: Arc::new(tx),
            document_id: document_id.clone(),
            path,
            name,
            descriptors,
        };
        Ok(UploadHandle {
            document_id,
            progress: rx,
            task: tokio::spawn(job.run()),
        })
    }
}

struct Job {
    client: Arc<ChatbotClient>,
    documents: Arc<DocumentStore>,
    notifier: Notifier,
    mode: ProgressMode,
    progress: Arc<watch::Sender<u8>>,
    document_id: String,
    path: PathBuf,
    name: String,
    descriptors: Vec<SheetDescriptor>,
}

impl Job {
    async fn run(self) -> Result<(), UploadError> {
        let ticker = match self.mode {
            ProgressMode::Simulated {
                step,
                tick,
                ceiling,
            } => Some(tokio::spawn(animate(
                self.progress.clone(),
                self.documents.clone(),
                self.document_id.clone(),
                step,
                tick,
                ceiling,
            ))),
            ProgressMode::Binary => None,
        };

        let result = self.transfer().await;
        if let Some(ticker) = ticker {
            ticker.abort();
        }

        match &result {
            Ok(()) => {
                advance(&self.progress, &self.documents, &self.document_id, 100);
                tracing::info!(file = %self.name, "upload complete");
                self.notifier
                    .success(format!("{} uploaded successfully", self.name));
            }
            Err(e) => {
                tracing::warn!(file = %self.name, error = %e, "upload failed");
                self.notifier.error(format!("{} upload failed", self.name));
            }
        }

        self.documents.refresh().await;
        result
    }

    async fn transfer(&self) -> Result<(), UploadError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| UploadError::Io {
                path: self.path.display().to_string(),
                source,
            })?;
        let upload_id = uuid::Uuid::new_v4().to_string();
        futures::try_join!(
            self.client.post_descriptions(&self.descriptors),
            self.client.upload(&self.name, bytes, &upload_id),
        )?;
        Ok(())
    }
}

async fn animate(
    progress: Arc<watch::Sender<u8>>,
    documents: Arc<DocumentStore>,
    document_id: String,
    step: u8,
    tick: Duration,
    ceiling: Duration,
) {
    let run = async {
        let mut interval = tokio::time::interval(tick);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            let next = progress.borrow().saturating_add(step).min(SIMULATED_CAP);
            advance(&progress, &documents, &document_id, next);
            if next >= SIMULATED_CAP {
                break;
            }
        }
    };
    if tokio::time::timeout(ceiling, run).await.is_err() {
        tracing::debug!(document = %document_id, "progress animation reached its time ceiling");
    }
}

/// Raise progress to `value`; never lowers it.
fn advance(progress: &watch::Sender<u8>, documents: &DocumentStore, id: &str, value: u8) {
    progress.send_if_modified(|p| {
        if value > *p {
            *p = value;
            true
        } else {
            false
        }
    });
    documents.set_progress(id, value);
}
