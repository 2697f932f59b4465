//! Outbound messaging seam.

use crate::error::MessengerError;
use async_trait::async_trait;
use ledgerbot_core::{ChatId, Result};
use serde::Serialize;

/// Keyboard attached to an outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyMarkup {
    /// A fixed keyboard; each inner vector is one row of button labels.
    Keyboard(Vec<Vec<String>>),
    /// Remove any keyboard currently shown.
    Remove,
}

impl ReplyMarkup {
    /// Builds a keyboard from rows of labels.
    #[must_use]
    pub fn keyboard<R, L>(rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = L>,
        L: Into<String>,
    {
        Self::Keyboard(
            rows.into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        )
    }

    /// Every button label, row by row.
    #[must_use]
    pub fn labels(&self) -> Vec<&str> {
        match self {
            Self::Keyboard(rows) => rows.iter().flatten().map(String::as_str).collect(),
            Self::Remove => Vec::new(),
        }
    }

    /// The platform's JSON shape for this markup.
    #[must_use]
    pub fn to_wire(&self) -> WireMarkup<'_> {
        match self {
            Self::Keyboard(rows) => WireMarkup::Keyboard {
                keyboard: rows
                    .iter()
                    .map(|row| row.iter().map(|text| WireButton { text }).collect())
                    .collect(),
                resize_keyboard: true,
            },
            Self::Remove => WireMarkup::Remove {
                remove_keyboard: true,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WireButton<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum WireMarkup<'a> {
    Keyboard {
        keyboard: Vec<Vec<WireButton<'a>>>,
        resize_keyboard: bool,
    },
    Remove {
        remove_keyboard: bool,
    },
}

/// A file fetched from the messaging platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// The messaging platform as seen by the chat channel.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Sends `text` to a chat, optionally with a keyboard.
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        markup: Option<&ReplyMarkup>,
    ) -> Result<(), MessengerError>;

    /// Deletes a message from a chat.
    async fn delete_message(&self, chat_id: ChatId, message_id: i64)
    -> Result<(), MessengerError>;

    /// Resolves a file reference to a download URL.
    async fn resolve_file(&self, file_ref: &str) -> Result<String, MessengerError>;

    /// Downloads the bytes behind a URL returned by `resolve_file`.
    async fn download(&self, url: &str) -> Result<DownloadedFile, MessengerError>;
}
