use crate::models::{CustomDocument, GENERAL_QUERY};
use crate::notice::Notifier;
use crate::remote::ChatbotClient;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Documents known to the UI: the last remote listing plus any local uploads
/// still in flight. Every change replaces the whole list.
pub struct DocumentStore {
    client: Arc<ChatbotClient>,
    notifier: Notifier,
    docs: Mutex<Arc<Vec<CustomDocument>>>,
    fetch_failed: AtomicBool,
}

impl DocumentStore {
    pub fn new(client: Arc<ChatbotClient>, notifier: Notifier) -> Self {
        Self {
            client,
            notifier,
            docs: Mutex::new(Arc::new(Vec::new())),
            fetch_failed: AtomicBool::new(false),
        }
    }

    pub fn documents(&self) -> Arc<Vec<CustomDocument>> {
        self.docs.lock().unwrap().clone()
    }

    /// Set when the last listing request failed; cleared by a good one.
    pub fn fetch_failed(&self) -> bool {
        self.fetch_failed.load(Ordering::SeqCst)
    }

    pub async fn refresh(&self) {
        self.replace(Vec::new());
        match self.client.list_documents().await {
            Ok(remote) => {
                let docs: Vec<CustomDocument> = remote
                    .into_iter()
                    .filter(|d| d.file != GENERAL_QUERY)
                    .map(CustomDocument::fetched)
                    .collect();
                tracing::debug!(count = docs.len(), "document listing refreshed");
                self.replace(docs);
                self.fetch_failed.store(false, Ordering::SeqCst);
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch documents");
                self.fetch_failed.store(true, Ordering::SeqCst);
                self.notifier.error("Failed to fetch documents");
            }
        }
    }

    /// Delete on the server, then reconcile with the listing either way.
    pub async fn delete(&self, name: &str) {
        match self.client.delete_document(name).await {
            Ok(()) => {
                tracing::info!(document = name, "document deleted");
                self.notifier.success(format!("{} deleted", name));
            }
            Err(e) => {
                tracing::warn!(document = name, error = %e, "failed to delete document");
                self.notifier.error(format!("Failed to delete {}", name));
            }
        }
        self.refresh().await;
    }

    /// Show a local upload at 0% until the next refresh replaces it.
    pub fn add_pending(&self, name: &str, file: PathBuf, sheets: Vec<String>) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let doc = CustomDocument {
            name: name.to_string(),
            file: Some(file),
            progress: 0,
            id: id.clone(),
            sheets,
        };
        self.update(|docs| docs.push(doc));
        id
    }

    /// Raise progress for the pending document `id`. Progress never goes down.
    pub fn set_progress(&self, id: &str, progress: u8) {
        let progress = progress.min(100);
        self.update(|docs| {
            if let Some(doc) = docs.iter_mut().find(|d| d.id == id) {
                doc.progress = doc.progress.max(progress);
            }
        });
    }

    /// Targets offered by the thumbs-down picker.
    pub fn picker_options(&self) -> Vec<String> {
        let docs = self.documents();
        let mut options = vec![GENERAL_QUERY.to_string()];
        for doc in docs.iter().filter(|d| d.is_complete()) {
            options.push(doc.name.clone());
            options.extend(doc.sheets.iter().map(|s| format!("{}/{}", doc.name, s)));
        }
        options
    }

    fn replace(&self, docs: Vec<CustomDocument>) {
        *self.docs.lock().unwrap() = Arc::new(docs);
    }

    fn update(&self, f: impl FnOnce(&mut Vec<CustomDocument>)) {
        let mut guard = self.docs.lock().unwrap();
        let mut next = guard.as_ref().clone();
        f(&mut next);
        *guard = Arc::new(next);
    }
}
