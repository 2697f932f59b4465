//! Per-chat session state.
//!
//! A chat is either part-way through authentication or bound to an account
//! and somewhere in the menu flow. The state is a tagged union so that every
//! step carries exactly the draft data collected so far.

use crate::error::SessionStoreError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use ledgerbot_core::{AccountId, BankAccountId, ChatId, Result};
use ledgerbot_ledger::{Amount, RecordKind};
use ledgerbot_platform_access::Email;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Default lifetime of an unfinished authentication.
pub const DEFAULT_PENDING_TTL_MINUTES: i64 = 10;

/// Which credential the negotiator is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStep {
    AwaitEmail,
    AwaitPassword,
}

/// An authentication in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuth {
    pub step: AuthStep,
    /// Set once the email step succeeds.
    #[serde(default)]
    pub email: Option<Email>,
    /// Failed password attempts so far.
    #[serde(default)]
    pub attempts: u32,
    pub issued_at: DateTime<Utc>,
}

impl PendingAuth {
    /// A fresh authentication waiting for an email.
    #[must_use]
    pub fn begin(now: DateTime<Utc>) -> Self {
        Self {
            step: AuthStep::AwaitEmail,
            email: None,
            attempts: 0,
            issued_at: now,
        }
    }

    /// True once the email is known and the next message is the password.
    #[must_use]
    pub fn awaits_password(&self) -> bool {
        self.step == AuthStep::AwaitPassword
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.issued_at > ttl
    }
}

/// How an entry is paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Bank {
        bank_account_id: BankAccountId,
        name: String,
    },
}

impl PaymentMethod {
    #[must_use]
    pub fn bank_account_id(&self) -> Option<BankAccountId> {
        match self {
            Self::Cash => None,
            Self::Bank {
                bank_account_id, ..
            } => Some(*bank_account_id),
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Cash => "Cash",
            Self::Bank { name, .. } => name,
        }
    }
}

/// Everything collected for an entry before the optional receipt image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftEntry {
    pub kind: RecordKind,
    pub amount: Amount,
    pub payment: PaymentMethod,
    #[serde(default)]
    pub description: Option<String>,
}

/// Position in the menu flow of a verified chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum MenuState {
    Idle,
    AwaitAmount {
        kind: RecordKind,
    },
    AwaitPayment {
        kind: RecordKind,
        amount: Amount,
    },
    AwaitDescription {
        kind: RecordKind,
        amount: Amount,
        payment: PaymentMethod,
    },
    AwaitImage {
        entry: DraftEntry,
    },
    ConfirmDisconnect,
}

/// The state half of a chat session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SessionState {
    PendingAuth(PendingAuth),
    Menu(MenuState),
}

/// A chat's session.
///
/// `verified` is true exactly when the state is a menu state and an account
/// is bound; the constructors are the only way to build one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSession {
    chat_id: ChatId,
    account_id: Option<AccountId>,
    state: SessionState,
}

impl ChatSession {
    #[must_use]
    pub fn pending(chat_id: ChatId, auth: PendingAuth) -> Self {
        Self {
            chat_id,
            account_id: None,
            state: SessionState::PendingAuth(auth),
        }
    }

    #[must_use]
    pub fn verified(chat_id: ChatId, account_id: AccountId, menu: MenuState) -> Self {
        Self {
            chat_id,
            account_id: Some(account_id),
            state: SessionState::Menu(menu),
        }
    }

    /// Rebuilds a session from stored columns, rejecting inconsistent rows.
    pub fn from_parts(
        chat_id: ChatId,
        account_id: Option<AccountId>,
        verified: bool,
        state: SessionState,
    ) -> std::result::Result<Self, SessionStoreError> {
        match (&state, account_id, verified) {
            (SessionState::PendingAuth(_), None, false) => Ok(Self {
                chat_id,
                account_id: None,
                state,
            }),
            (SessionState::Menu(_), Some(account_id), true) => Ok(Self {
                chat_id,
                account_id: Some(account_id),
                state,
            }),
            _ => Err(SessionStoreError::Corrupt {
                chat_id,
                reason: format!(
                    "verified={verified} with account {} does not match stored state",
                    account_id.map_or_else(|| "none".to_string(), |a| a.to_string())
                ),
            }),
        }
    }

    #[must_use]
    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    #[must_use]
    pub fn account_id(&self) -> Option<AccountId> {
        self.account_id
    }

    #[must_use]
    pub fn is_verified(&self) -> bool {
        matches!(self.state, SessionState::Menu(_))
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Issue time of a pending authentication.
    #[must_use]
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            SessionState::PendingAuth(auth) => Some(auth.issued_at),
            SessionState::Menu(_) => None,
        }
    }
}

/// Durable storage for chat sessions.
///
/// Writes for one chat are last-writer-wins. `bind_verified` must be atomic:
/// at no point may two chats hold a verified binding for the same account,
/// and an observer never sees the account unbound mid-swap.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    async fn load(&self, chat_id: ChatId) -> Result<Option<ChatSession>, SessionStoreError>;

    /// Inserts or replaces the session for its chat.
    ///
    /// Fails with `BindingConflict` if the session is verified and another
    /// chat already holds the account.
    async fn save(&self, session: &ChatSession) -> Result<(), SessionStoreError>;

    async fn delete(&self, chat_id: ChatId) -> Result<(), SessionStoreError>;

    /// The chat currently holding the verified binding for an account.
    async fn find_verified_chat(
        &self,
        account_id: AccountId,
    ) -> Result<Option<ChatId>, SessionStoreError>;

    /// Binds `account_id` to `chat_id` at the idle menu, removing any other
    /// chat's binding for the same account in the same step.
    ///
    /// Returns the evicted chat, if any.
    async fn bind_verified(
        &self,
        chat_id: ChatId,
        account_id: AccountId,
    ) -> Result<Option<ChatId>, SessionStoreError>;

    /// Deletes pending sessions issued before `cutoff`. Returns the count.
    async fn delete_pending_issued_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, SessionStoreError>;
}

/// Session access with pending-auth expiry applied.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn SessionBackend>,
    pending_ttl: Duration,
}

impl SessionStore {
    #[must_use]
    pub fn new(backend: Arc<dyn SessionBackend>) -> Self {
        Self {
            backend,
            pending_ttl: Duration::minutes(DEFAULT_PENDING_TTL_MINUTES),
        }
    }

    #[must_use]
    pub fn with_pending_ttl(mut self, pending_ttl: Duration) -> Self {
        self.pending_ttl = pending_ttl;
        self
    }

    #[must_use]
    pub fn pending_ttl(&self) -> Duration {
        self.pending_ttl
    }

    /// Loads a chat's session. Expired pending sessions read as absent.
    pub async fn get(
        &self,
        chat_id: ChatId,
        now: DateTime<Utc>,
    ) -> Result<Option<ChatSession>, SessionStoreError> {
        let Some(session) = self.backend.load(chat_id).await? else {
            return Ok(None);
        };
        if let SessionState::PendingAuth(auth) = session.state() {
            if auth.is_expired(now, self.pending_ttl) {
                debug!(%chat_id, issued_at = %auth.issued_at, "pending session expired");
                return Ok(None);
            }
        }
        Ok(Some(session))
    }

    pub async fn set(&self, session: &ChatSession) -> Result<(), SessionStoreError> {
        self.backend.save(session).await
    }

    pub async fn clear(&self, chat_id: ChatId) -> Result<(), SessionStoreError> {
        self.backend.delete(chat_id).await
    }

    pub async fn find_verified_chat(
        &self,
        account_id: AccountId,
    ) -> Result<Option<ChatId>, SessionStoreError> {
        self.backend.find_verified_chat(account_id).await
    }

    pub async fn bind_verified(
        &self,
        chat_id: ChatId,
        account_id: AccountId,
    ) -> Result<Option<ChatId>, SessionStoreError> {
        self.backend.bind_verified(chat_id, account_id).await
    }

    /// Removes every pending session past its TTL.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, SessionStoreError> {
        self.backend
            .delete_pending_issued_before(now - self.pending_ttl)
            .await
    }
}
