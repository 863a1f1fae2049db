use crate::models::{self, ChatMessage, GENERAL_QUERY};
use crate::notice::Notifier;
use crate::remote::{BackendError, ChatbotClient, StoreClient};
use std::sync::{Arc, Mutex};

pub const FALLBACK_REPLY: &str = "Sorry, I didn't understand that. Please try again.";

/// Where a question is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryTarget {
    General,
    /// A document name, or `doc/sheet` for a single worksheet.
    Document(String),
}

impl QueryTarget {
    /// Map a picker option back to a target.
    pub fn from_option(option: &str) -> Self {
        let option = option.trim();
        if option.is_empty() || option == GENERAL_QUERY {
            QueryTarget::General
        } else {
            QueryTarget::Document(option.to_string())
        }
    }
}

/// What the thumbs-down flow needs to show its picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retry {
    pub prefill: String,
    pub options: Vec<String>,
}

/// One chat transcript kept in sync with the chatbot service.
///
/// The transcript is an immutable snapshot that every update replaces.
/// Sends are not serialized: a reply is appended to whatever the transcript
/// holds when the reply arrives, so overlapping sends keep every message.
pub struct ChatSession {
    client: Arc<ChatbotClient>,
    store: Option<StoreClient>,
    notifier: Notifier,
    chat_id: String,
    bot_avatar: String,
    transcript: Mutex<Arc<Vec<ChatMessage>>>,
}

impl ChatSession {
    pub fn new(
        client: Arc<ChatbotClient>,
        store: Option<StoreClient>,
        notifier: Notifier,
        chat_id: impl Into<String>,
        bot_avatar: impl Into<String>,
    ) -> Self {
        Self {
            client,
            store,
            notifier,
            chat_id: chat_id.into(),
            bot_avatar: bot_avatar.into(),
            transcript: Mutex::new(Arc::new(Vec::new())),
        }
    }

    pub fn messages(&self) -> Arc<Vec<ChatMessage>> {
        self.transcript.lock().unwrap().clone()
    }

    /// Replace the local transcript with the persisted one.
    pub async fn load(&self) -> Result<usize, BackendError> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let messages = store
            .fetch(&self.chat_id)
            .await?
            .map(|r| r.messages)
            .unwrap_or_default();
        let count = messages.len();
        *self.transcript.lock().unwrap() = Arc::new(messages);
        tracing::debug!(chat_id = %self.chat_id, count, "transcript loaded");
        Ok(count)
    }

    pub async fn send(&self, text: &str) -> Option<ChatMessage> {
        self.send_to(text, &QueryTarget::General).await
    }

    /// Append `text` as a user message, ask the service, append the reply.
    /// Returns the bot message, or `None` for blank input.
    pub async fn send_to(&self, text: &str, target: &QueryTarget) -> Option<ChatMessage> {
        if text.trim().is_empty() {
            return None;
        }

        let question = ChatMessage::user(text);
        self.append(question.clone());

        let result = match target {
            QueryTarget::General => self.client.query(text, Some(&self.chat_id)).await,
            QueryTarget::Document(file) => self.client.query_doc(text, file).await,
        };
        let reply = match result {
            Ok(answer) => ChatMessage::bot(&answer, &self.bot_avatar),
            Err(e) => {
                tracing::warn!(error = %e, "query failed, using fallback reply");
                self.notifier.error("Something went wrong. Please try again.");
                ChatMessage::bot(FALLBACK_REPLY, &self.bot_avatar)
            }
        };
        self.append(reply.clone());
        self.mirror(&[question, reply.clone()]).await;
        Some(reply)
    }

    /// Index of the message that shows feedback controls.
    pub fn feedback_target(&self) -> Option<usize> {
        models::feedback_target(&self.messages())
    }

    pub fn thumbs_up(&self) {
        self.notifier.success("Thanks for your feedback!");
    }

    /// The user message that prompted the latest bot reply, used to pre-fill
    /// the input before resubmitting against a specific document.
    pub fn thumbs_down(&self) -> Option<String> {
        let messages = self.messages();
        let target = models::feedback_target(&messages)?;
        messages[..target]
            .iter()
            .rev()
            .find(|m| !m.is_bot)
            .map(|m| m.message.clone())
    }

    fn append(&self, message: ChatMessage) {
        let mut guard = self.transcript.lock().unwrap();
        let mut next = guard.as_ref().clone();
        next.push(message);
        *guard = Arc::new(next);
    }

    async fn mirror(&self, batch: &[ChatMessage]) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.append(&self.chat_id, batch).await {
            tracing::warn!(chat_id = %self.chat_id, error = %e, "failed to persist messages");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notice::{drain, Notice};

    fn offline_session() -> (ChatSession, tokio::sync::mpsc::UnboundedReceiver<Notice>) {
        let (notifier, rx) = Notifier::channel();
        // Port 9 (discard) is closed on test machines, so every query fails fast.
        let client = Arc::new(ChatbotClient::new("http://127.0.0.1:9"));
        (ChatSession::new(client, None, notifier, "1", "/bot.png"), rx)
    }

    #[test]
    fn test_query_target_from_option() {
        assert_eq!(QueryTarget::from_option("General Query"), QueryTarget::General);
        assert_eq!(QueryTarget::from_option(""), QueryTarget::General);
        assert_eq!(
            QueryTarget::from_option("Q1.xlsx/Sheet1"),
            QueryTarget::Document("Q1.xlsx/Sheet1".into())
        );
    }

    #[tokio::test]
    async fn test_blank_input_is_ignored() {
        let (session, mut rx) = offline_session();
        assert!(session.send("   ").await.is_none());
        assert!(session.messages().is_empty());
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_network_failure_gets_fallback_reply() {
        let (session, mut rx) = offline_session();
        let reply = session.send("hi").await.unwrap();
        assert_eq!(reply.message, FALLBACK_REPLY);

        let messages = session.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].message, "hi");
        assert!(!messages[0].is_bot);
        assert!(messages[1].is_bot);
        assert_eq!(messages[1].avatar.as_deref(), Some("/bot.png"));

        let notices = drain(&mut rx);
        assert_eq!(notices.len(), 1);
        assert!(notices[0].is_error());
    }

    #[tokio::test]
    async fn test_thumbs_down_prefills_previous_question() {
        let (session, _rx) = offline_session();
        assert_eq!(session.thumbs_down(), None);

        session.send("first").await;
        session.send("second").await;
        assert_eq!(session.feedback_target(), Some(3));
        assert_eq!(session.thumbs_down().as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_load_without_store_keeps_transcript() {
        let (session, _rx) = offline_session();
        session.send("hi").await;
        assert_eq!(session.load().await.unwrap(), 0);
        assert_eq!(session.messages().len(), 2);
    }
}
