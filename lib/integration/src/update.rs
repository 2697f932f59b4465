//! Inbound webhook payloads.
//!
//! Only the fields the chat channel reads are modelled; everything else in
//! the platform's update object is ignored during deserialization.

use ledgerbot_core::ChatId;
use serde::{Deserialize, Serialize};

/// One webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
}

/// The chat this message arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
}

/// The sender, when the platform includes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    #[serde(default)]
    pub username: Option<String>,
}

/// One size variant of a photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

/// A user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub photo: Option<Vec<PhotoSize>>,
    #[serde(default)]
    pub from: Option<Sender>,
}

impl IncomingMessage {
    /// File reference of the largest attached photo size.
    #[must_use]
    pub fn largest_photo(&self) -> Option<&str> {
        self.photo
            .as_ref()?
            .iter()
            .max_by_key(|p| u64::from(p.width) * u64::from(p.height))
            .map(|p| p.file_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_message_and_ignores_unknown_fields() {
        let json = r#"{
            "update_id": 7,
            "message": {
                "message_id": 42,
                "date": 1700000000,
                "chat": {"id": 1001, "type": "private"},
                "from": {"id": 5, "is_bot": false, "username": "alice"},
                "text": "/start"
            }
        }"#;

        let update: Update = serde_json::from_str(json).expect("parse");
        let message = update.message.expect("message");
        assert_eq!(message.chat.id, ChatId::new(1001));
        assert_eq!(message.text.as_deref(), Some("/start"));
        assert_eq!(
            message.from.and_then(|f| f.username).as_deref(),
            Some("alice")
        );
    }

    #[test]
    fn picks_largest_photo() {
        let json = r#"{
            "message_id": 1,
            "chat": {"id": 1},
            "photo": [
                {"file_id": "small", "width": 90, "height": 90},
                {"file_id": "large", "width": 1280, "height": 960},
                {"file_id": "medium", "width": 320, "height": 240}
            ]
        }"#;

        let message: IncomingMessage = serde_json::from_str(json).expect("parse");
        assert_eq!(message.largest_photo(), Some("large"));
    }

    #[test]
    fn update_without_message_is_accepted() {
        let update: Update =
            serde_json::from_str(r#"{"update_id": 9, "edited_message": {}}"#).expect("parse");
        assert!(update.message.is_none());
    }
}
