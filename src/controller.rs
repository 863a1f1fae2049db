use crate::config::Settings;
use crate::documents::DocumentStore;
use crate::models::{ChatMessage, CustomDocument, SheetDescriptor};
use crate::notice::{Notice, Notifier};
use crate::remote::{BackendError, ChatbotClient, StoreClient};
use crate::session::{ChatSession, QueryTarget, Retry};
use crate::upload::{UploadError, UploadHandle, UploadPipeline};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Single owner of the chat session, the document list and the upload
/// pipeline. All state changes go through these methods.
pub struct Controller {
    session: ChatSession,
    documents: Arc<DocumentStore>,
    uploads: UploadPipeline,
}

impl Controller {
    pub fn new(settings: &Settings) -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (notifier, rx) = Notifier::channel();
        let client = Arc::new(ChatbotClient::new(settings.backend_url.clone()));
        let store = settings.store_url.clone().map(StoreClient::new);
        let documents = Arc::new(DocumentStore::new(client.clone(), notifier.clone()));
        let session = ChatSession::new(
            client.clone(),
            store,
            notifier.clone(),
            settings.chat_id.clone(),
            settings.bot_avatar.clone(),
        );
        let uploads =
            UploadPipeline::new(client, documents.clone(), notifier, settings.progress_mode);
        (
            Self {
                session,
                documents,
                uploads,
            },
            rx,
        )
    }

    // ── Chat ──

    pub fn messages(&self) -> Arc<Vec<ChatMessage>> {
        self.session.messages()
    }

    pub async fn send(&self, text: &str) -> Option<ChatMessage> {
        self.session.send(text).await
    }

    pub async fn send_scoped(&self, text: &str, target: &QueryTarget) -> Option<ChatMessage> {
        self.session.send_to(text, target).await
    }

    pub async fn load_history(&self) -> Result<usize, BackendError> {
        self.session.load().await
    }

    pub fn feedback_target(&self) -> Option<usize> {
        self.session.feedback_target()
    }

    pub fn thumbs_up(&self) {
        self.session.thumbs_up();
    }

    /// Pre-fill text and picker options for a thumbs-down on the latest reply.
    pub fn thumbs_down(&self) -> Option<Retry> {
        let prefill = self.session.thumbs_down()?;
        Some(Retry {
            prefill,
            options: self.documents.picker_options(),
        })
    }

    /// Resubmit a question against the option picked after a thumbs-down.
    pub async fn resubmit(&self, text: &str, option: &str) -> Option<ChatMessage> {
        self.session
            .send_to(text, &QueryTarget::from_option(option))
            .await
    }

    // ── Documents ──

    pub fn documents(&self) -> Arc<Vec<CustomDocument>> {
        self.documents.documents()
    }

    pub fn documents_fetch_failed(&self) -> bool {
        self.documents.fetch_failed()
    }

    pub async fn refresh(&self) {
        self.documents.refresh().await;
    }

    pub async fn delete(&self, name: &str) {
        self.documents.delete(name).await;
    }

    // ── Uploads ──

    pub async fn prepare_upload(
        &self,
        path: &Path,
        mime: Option<&str>,
    ) -> Result<Vec<SheetDescriptor>, UploadError> {
        self.uploads.prepare(path, mime).await
    }

    pub fn upload(
        &self,
        path: PathBuf,
        descriptors: Vec<SheetDescriptor>,
    ) -> Result<UploadHandle, UploadError> {
        self.uploads.submit(path, descriptors)
    }
}
