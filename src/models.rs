use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Id given to every document that came from the remote listing.
pub const FETCHED_ID: &str = "fetched";

/// Reserved document name used for queries that target no document.
pub const GENERAL_QUERY: &str = "General Query";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub message: String,
    pub is_bot: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub timestamp: String,
}

impl ChatMessage {
    pub fn user(text: &str) -> Self {
        Self::new(text, false, Some(String::new()))
    }

    pub fn bot(text: &str, avatar: &str) -> Self {
        Self::new(text, true, Some(avatar.to_string()))
    }

    fn new(text: &str, is_bot: bool, avatar: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            message: text.to_string(),
            is_bot,
            avatar,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Persisted transcript for one chat id.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct ChatRecord {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CustomDocument {
    pub name: String,
    /// Local source file; `None` once the bytes live server-side.
    pub file: Option<PathBuf>,
    pub progress: u8,
    pub id: String,
    #[serde(default)]
    pub sheets: Vec<String>,
}

impl CustomDocument {
    pub fn fetched(remote: RemoteDocument) -> Self {
        Self {
            name: remote.file,
            file: None,
            progress: 100,
            id: FETCHED_ID.to_string(),
            sheets: remote.children,
        }
    }

    pub fn is_fetched(&self) -> bool {
        self.file.is_none() && self.id == FETCHED_ID
    }

    pub fn is_complete(&self) -> bool {
        self.progress >= 100
    }
}

/// One entry of the remote `/documents` listing.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RemoteDocument {
    pub file: String,
    #[serde(default)]
    pub children: Vec<String>,
}

/// A worksheet (or whole file) awaiting a user description before upload.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SheetDescriptor {
    pub name: String,
    pub title: String,
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
}

/// Index of the only message that shows thumbs-up/down controls.
pub fn feedback_target(messages: &[ChatMessage]) -> Option<usize> {
    messages.iter().rposition(|m| m.is_bot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_wire_format() {
        let msg = ChatMessage::bot("hello", "/bot.png");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["isBot"], true);
        assert_eq!(value["message"], "hello");
        assert_eq!(value["avatar"], "/bot.png");
        assert!(chrono::DateTime::parse_from_rfc3339(value["timestamp"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_message_without_avatar_parses() {
        let raw = r#"{"id":"a","message":"hi","isBot":false,"timestamp":"2024-01-01T00:00:00Z"}"#;
        let msg: ChatMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.avatar, None);
        assert!(!msg.is_bot);
    }

    #[test]
    fn test_feedback_target_tracks_last_bot_message() {
        let mut messages = vec![];
        assert_eq!(feedback_target(&messages), None);

        messages.push(ChatMessage::user("hi"));
        assert_eq!(feedback_target(&messages), None);

        messages.push(ChatMessage::bot("hello", ""));
        assert_eq!(feedback_target(&messages), Some(1));

        messages.push(ChatMessage::user("again"));
        assert_eq!(feedback_target(&messages), Some(1));

        messages.push(ChatMessage::bot("sure", ""));
        assert_eq!(feedback_target(&messages), Some(3));
    }

    #[test]
    fn test_fetched_document() {
        let doc = CustomDocument::fetched(RemoteDocument {
            file: "Q1.xlsx".into(),
            children: vec!["Sheet1".into()],
        });
        assert!(doc.is_fetched());
        assert!(doc.is_complete());
        assert_eq!(doc.sheets, vec!["Sheet1"]);
    }
}
