//! In-process test collaborators for the conversation crate.
//!
//! Each fake has failure switches for the degraded paths.

use crate::error::SessionStoreError;
use crate::session::{ChatSession, MenuState, SessionBackend};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ledgerbot_core::{AccountId, ChatId, Result};
use ledgerbot_integration::{
    BlobError, BlobStore, DownloadedFile, Messenger, MessengerError, ReplyMarkup,
};
use ledgerbot_platform_access::{Account, AccountError, AccountStore, Email};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Sessions keyed by chat.
#[derive(Debug, Default)]
pub struct InMemorySessionBackend {
    sessions: Mutex<HashMap<ChatId, ChatSession>>,
    corrupt: Mutex<HashSet<ChatId>>,
    unavailable: AtomicBool,
}

impl InMemorySessionBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.sessions).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Makes every operation fail as if the store were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes the chat's row undecodable until it is overwritten or deleted.
    pub fn mark_corrupt(&self, chat_id: ChatId) {
        lock(&self.corrupt).insert(chat_id);
    }

    fn check(&self) -> Result<(), SessionStoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SessionStoreError::Unavailable {
                reason: "session store offline".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl SessionBackend for InMemorySessionBackend {
    async fn load(&self, chat_id: ChatId) -> Result<Option<ChatSession>, SessionStoreError> {
        self.check()?;
        if lock(&self.corrupt).contains(&chat_id) {
            return Err(SessionStoreError::Corrupt {
                chat_id,
                reason: "unknown variant `legacy`, expected one of `pending_auth`, `menu`"
                    .to_string(),
            }
            .into());
        }
        Ok(lock(&self.sessions).get(&chat_id).cloned())
    }

    async fn save(&self, session: &ChatSession) -> Result<(), SessionStoreError> {
        self.check()?;
        let mut sessions = lock(&self.sessions);
        if let Some(account_id) = session.account_id() {
            let held_elsewhere = sessions.values().any(|other| {
                other.chat_id() != session.chat_id() && other.account_id() == Some(account_id)
            });
            if held_elsewhere {
                return Err(SessionStoreError::BindingConflict {
                    chat_id: session.chat_id(),
                }
                .into());
            }
        }
        sessions.insert(session.chat_id(), session.clone());
        lock(&self.corrupt).remove(&session.chat_id());
        Ok(())
    }

    async fn delete(&self, chat_id: ChatId) -> Result<(), SessionStoreError> {
        self.check()?;
        lock(&self.sessions).remove(&chat_id);
        lock(&self.corrupt).remove(&chat_id);
        Ok(())
    }

    async fn find_verified_chat(
        &self,
        account_id: AccountId,
    ) -> Result<Option<ChatId>, SessionStoreError> {
        self.check()?;
        Ok(lock(&self.sessions)
            .values()
            .find(|s| s.account_id() == Some(account_id))
            .map(ChatSession::chat_id))
    }

    async fn bind_verified(
        &self,
        chat_id: ChatId,
        account_id: AccountId,
    ) -> Result<Option<ChatId>, SessionStoreError> {
        self.check()?;
        let mut sessions = lock(&self.sessions);
        let evicted = sessions
            .values()
            .find(|s| s.chat_id() != chat_id && s.account_id() == Some(account_id))
            .map(ChatSession::chat_id);
        if let Some(evicted) = evicted {
            sessions.remove(&evicted);
        }
        sessions.insert(
            chat_id,
            ChatSession::verified(chat_id, account_id, MenuState::Idle),
        );
        Ok(evicted)
    }

    async fn delete_pending_issued_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, SessionStoreError> {
        self.check()?;
        let mut sessions = lock(&self.sessions);
        let before = sessions.len();
        sessions.retain(|_, s| s.issued_at().is_none_or(|issued| issued >= cutoff));
        Ok((before - sessions.len()) as u64)
    }
}

/// Accounts with plaintext passwords.
#[derive(Debug, Default)]
pub struct InMemoryAccounts {
    accounts: Mutex<HashMap<AccountId, (Account, String)>>,
    fail_credential_checks: AtomicBool,
}

impl InMemoryAccounts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an account and returns it.
    pub fn add(&self, email: Email, password: &str) -> Account {
        let account = Account::new(AccountId::new(), email, Utc::now());
        lock(&self.accounts).insert(account.id(), (account.clone(), password.to_string()));
        account
    }

    pub fn fail_credential_checks(&self, fail: bool) {
        self.fail_credential_checks.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl AccountStore for InMemoryAccounts {
    async fn find_by_email(&self, email: &Email) -> Result<Option<Account>, AccountError> {
        Ok(lock(&self.accounts)
            .values()
            .find(|(account, _)| account.email() == email)
            .map(|(account, _)| account.clone()))
    }

    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, AccountError> {
        Ok(lock(&self.accounts)
            .get(&id)
            .map(|(account, _)| account.clone()))
    }

    async fn verify_credential(
        &self,
        account: &Account,
        password: &str,
    ) -> Result<bool, AccountError> {
        if self.fail_credential_checks.load(Ordering::SeqCst) {
            return Err(AccountError::CredentialCheckFailed {
                reason: "account store offline".to_string(),
            }
            .into());
        }
        Ok(lock(&self.accounts)
            .get(&account.id())
            .is_some_and(|(_, stored)| stored == password))
    }
}

/// An outbound message captured by `RecordingMessenger`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub chat_id: ChatId,
    pub text: String,
    pub markup: Option<ReplyMarkup>,
}

/// A messenger that records what it was asked to send.
///
/// Files resolve to `https://files.test/{file_ref}` and download as a
/// small JPEG payload.
#[derive(Debug, Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<SentMessage>>,
    deleted: Mutex<Vec<(ChatId, i64)>>,
    fail_sends: AtomicBool,
    fail_file_access: AtomicBool,
}

impl RecordingMessenger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn sent(&self) -> Vec<SentMessage> {
        lock(&self.sent).clone()
    }

    /// Messages sent to one chat, in order.
    #[must_use]
    pub fn sent_to(&self, chat_id: ChatId) -> Vec<SentMessage> {
        lock(&self.sent)
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn last_to(&self, chat_id: ChatId) -> Option<SentMessage> {
        self.sent_to(chat_id).pop()
    }

    #[must_use]
    pub fn deleted(&self) -> Vec<(ChatId, i64)> {
        lock(&self.deleted).clone()
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Makes file resolution and download fail.
    pub fn fail_file_access(&self, fail: bool) {
        self.fail_file_access.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        markup: Option<&ReplyMarkup>,
    ) -> Result<(), MessengerError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(MessengerError::Transport {
                method: "sendMessage".to_string(),
                reason: "network down".to_string(),
            }
            .into());
        }
        lock(&self.sent).push(SentMessage {
            chat_id,
            text: text.to_string(),
            markup: markup.cloned(),
        });
        Ok(())
    }

    async fn delete_message(
        &self,
        chat_id: ChatId,
        message_id: i64,
    ) -> Result<(), MessengerError> {
        lock(&self.deleted).push((chat_id, message_id));
        Ok(())
    }

    async fn resolve_file(&self, file_ref: &str) -> Result<String, MessengerError> {
        if self.fail_file_access.load(Ordering::SeqCst) {
            return Err(MessengerError::Rejected {
                method: "getFile".to_string(),
                description: "file is too big".to_string(),
            }
            .into());
        }
        Ok(format!("https://files.test/{file_ref}"))
    }

    async fn download(&self, url: &str) -> Result<DownloadedFile, MessengerError> {
        if self.fail_file_access.load(Ordering::SeqCst) {
            return Err(MessengerError::Transport {
                method: "download".to_string(),
                reason: format!("could not fetch {url}"),
            }
            .into());
        }
        Ok(DownloadedFile {
            bytes: vec![0xFF, 0xD8, 0xFF, 0xE0],
            content_type: "image/jpeg".to_string(),
        })
    }
}

/// Blob storage that remembers uploaded paths.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    objects: Mutex<Vec<(String, Vec<u8>)>>,
    fail_uploads: AtomicBool,
}

impl InMemoryBlobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths uploaded so far, in order.
    #[must_use]
    pub fn uploads(&self) -> Vec<String> {
        lock(&self.objects)
            .iter()
            .map(|(path, _)| path.clone())
            .collect()
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, BlobError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(BlobError::Rejected {
                path: path.to_string(),
                status: 503,
            }
            .into());
        }
        lock(&self.objects).push((path.to_string(), bytes));
        Ok(format!("https://blobs.test/{path}"))
    }
}
