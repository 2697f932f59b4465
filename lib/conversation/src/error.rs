//! Error types for the conversation crate.
//!
//! - `SessionStoreError`: the session store could not load or persist state
//! - `ConversationError`: a turn could not be completed

use ledgerbot_core::ChatId;
use std::fmt;

/// Errors from session storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStoreError {
    /// The store could not be reached or rejected the operation.
    Unavailable { reason: String },
    /// Another chat already holds the verified binding for the account.
    BindingConflict { chat_id: ChatId },
    /// A stored row could not be decoded into a session.
    Corrupt { chat_id: ChatId, reason: String },
}

impl fmt::Display for SessionStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { reason } => write!(f, "session store unavailable: {reason}"),
            Self::BindingConflict { chat_id } => {
                write!(f, "account already bound to another chat (saving chat {chat_id})")
            }
            Self::Corrupt { chat_id, reason } => {
                write!(f, "stored session for chat {chat_id} is corrupt: {reason}")
            }
        }
    }
}

impl std::error::Error for SessionStoreError {}

/// Errors that abort a conversation turn.
///
/// The dispatcher answers these with a generic failure message and leaves
/// the stored state as it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationError {
    /// Loading or saving the session failed.
    Persistence { chat_id: ChatId, reason: String },
    /// A collaborator needed to answer the turn failed.
    Collaborator { chat_id: ChatId, reason: String },
}

impl fmt::Display for ConversationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Persistence { chat_id, reason } => {
                write!(f, "session persistence failed for chat {chat_id}: {reason}")
            }
            Self::Collaborator { chat_id, reason } => {
                write!(f, "turn failed for chat {chat_id}: {reason}")
            }
        }
    }
}

impl std::error::Error for ConversationError {}

impl ConversationError {
    pub(crate) fn persistence<E: fmt::Display>(chat_id: ChatId) -> impl FnOnce(E) -> Self {
        move |e| Self::Persistence {
            chat_id,
            reason: e.to_string(),
        }
    }

    pub(crate) fn collaborator<E: fmt::Display>(chat_id: ChatId) -> impl FnOnce(E) -> Self {
        move |e| Self::Collaborator {
            chat_id,
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_store_error_display() {
        let err = SessionStoreError::Corrupt {
            chat_id: ChatId::new(5),
            reason: "unknown step".to_string(),
        };
        assert!(err.to_string().contains("chat 5"));
        assert!(err.to_string().contains("unknown step"));
    }

    #[test]
    fn conversation_error_display() {
        let err = ConversationError::Persistence {
            chat_id: ChatId::new(9),
            reason: "timeout".to_string(),
        };
        assert!(err.to_string().contains("timeout"));
    }
}
