//! Two-step authentication that binds a chat to an account.
//!
//! `/start` opens a pending session waiting for an email; a known email
//! moves it to the password step. Each wrong password counts as an attempt
//! and the session is dropped once the attempts run out. Messages without
//! text at the password step are not checked and cost nothing. A correct
//! password binds the chat, replacing whichever chat held the account before.

use crate::error::ConversationError;
use crate::input::{self, Input};
use crate::reply::Reply;
use crate::session::{AuthStep, ChatSession, MenuState, PendingAuth, SessionStore};
use chrono::{DateTime, Utc};
use ledgerbot_core::{ChatId, Result};
use ledgerbot_integration::ReplyMarkup;
use ledgerbot_platform_access::{AccountStore, Email};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Default number of password attempts before the pending session is dropped.
pub const DEFAULT_MAX_PASSWORD_ATTEMPTS: u32 = 4;

/// The result of one authentication turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthTurn {
    pub reply: Reply,
    /// Chat that lost its binding because this one logged in.
    pub evicted: Option<ChatId>,
}

impl AuthTurn {
    fn reply(reply: Reply) -> Self {
        Self {
            reply,
            evicted: None,
        }
    }
}

/// Runs the email and password challenge.
#[derive(Clone)]
pub struct AuthNegotiator {
    accounts: Arc<dyn AccountStore>,
    sessions: SessionStore,
    max_attempts: u32,
}

impl AuthNegotiator {
    #[must_use]
    pub fn new(accounts: Arc<dyn AccountStore>, sessions: SessionStore) -> Self {
        Self {
            accounts,
            sessions,
            max_attempts: DEFAULT_MAX_PASSWORD_ATTEMPTS,
        }
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Handles `/start`.
    ///
    /// A verified chat goes back to the idle menu. Anything else starts a
    /// fresh challenge.
    #[instrument(skip(self, existing), fields(%chat_id))]
    pub async fn start(
        &self,
        chat_id: ChatId,
        existing: Option<&ChatSession>,
        now: DateTime<Utc>,
    ) -> Result<Reply, ConversationError> {
        if let Some(account_id) = existing
            .filter(|s| s.is_verified())
            .and_then(ChatSession::account_id)
        {
            self.sessions
                .set(&ChatSession::verified(chat_id, account_id, MenuState::Idle))
                .await
                .map_err(ConversationError::persistence(chat_id))?;
            return Ok(Reply::text("You are already connected. Choose an action.")
                .with_markup(input::main_menu()));
        }

        self.sessions
            .set(&ChatSession::pending(chat_id, PendingAuth::begin(now)))
            .await
            .map_err(ConversationError::persistence(chat_id))?;
        info!("authentication started");
        Ok(Reply::text(
            "Welcome! Send the email address of your finance tracker account.",
        )
        .with_markup(ReplyMarkup::Remove))
    }

    /// Handles `/cancel` during authentication.
    pub async fn cancel(&self, chat_id: ChatId) -> Result<Reply, ConversationError> {
        self.sessions
            .clear(chat_id)
            .await
            .map_err(ConversationError::persistence(chat_id))?;
        Ok(Reply::text("Login cancelled. Send /start to begin again.")
            .with_markup(ReplyMarkup::Remove))
    }

    /// Advances a pending authentication with the user's message.
    pub async fn advance(
        &self,
        chat_id: ChatId,
        auth: PendingAuth,
        input: &Input,
        now: DateTime<Utc>,
    ) -> Result<AuthTurn, ConversationError> {
        let text = input.text().unwrap_or_default();
        match (auth.step, auth.email.clone()) {
            (AuthStep::AwaitEmail, _) => self.take_email(chat_id, text, now).await,
            (AuthStep::AwaitPassword, Some(_)) if text.trim().is_empty() => Ok(AuthTurn::reply(
                Reply::text("Please send your password as a text message."),
            )),
            (AuthStep::AwaitPassword, Some(email)) => {
                self.take_password(chat_id, auth, &email, text).await
            }
            (AuthStep::AwaitPassword, None) => {
                warn!(%chat_id, "password step without an email, restarting challenge");
                self.sessions
                    .set(&ChatSession::pending(chat_id, PendingAuth::begin(now)))
                    .await
                    .map_err(ConversationError::persistence(chat_id))?;
                Ok(AuthTurn::reply(Reply::text(
                    "Please send your email address again.",
                )))
            }
        }
    }

    #[instrument(skip(self, text), fields(%chat_id))]
    async fn take_email(
        &self,
        chat_id: ChatId,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<AuthTurn, ConversationError> {
        let Ok(email) = Email::parse(text) else {
            return Ok(AuthTurn::reply(Reply::text(
                "That does not look like an email address. Please try again.",
            )));
        };

        let account = self
            .accounts
            .find_by_email(&email)
            .await
            .map_err(ConversationError::collaborator(chat_id))?;
        let Some(account) = account else {
            info!("login attempt for unknown email");
            return Ok(AuthTurn::reply(Reply::text(
                "No account found for that email. Check it and try again.",
            )));
        };

        let holder = self
            .sessions
            .find_verified_chat(account.id())
            .await
            .map_err(ConversationError::persistence(chat_id))?;
        if holder.is_some_and(|holder| holder != chat_id) {
            info!(account_id = %account.id(), "account already connected elsewhere");
            return Ok(AuthTurn::reply(Reply::text(
                "This account is already connected in another chat. \
                 Disconnect it there first, then try again.",
            )));
        }

        let pending = PendingAuth {
            step: AuthStep::AwaitPassword,
            email: Some(email),
            attempts: 0,
            issued_at: now,
        };
        self.sessions
            .set(&ChatSession::pending(chat_id, pending))
            .await
            .map_err(ConversationError::persistence(chat_id))?;
        Ok(AuthTurn::reply(Reply::text(
            "Account found. Now send your password.",
        )))
    }

    #[instrument(skip(self, auth, password), fields(%chat_id))]
    async fn take_password(
        &self,
        chat_id: ChatId,
        mut auth: PendingAuth,
        email: &Email,
        password: &str,
    ) -> Result<AuthTurn, ConversationError> {
        auth.attempts += 1;

        let account = self
            .accounts
            .find_by_email(email)
            .await
            .map_err(ConversationError::collaborator(chat_id))?;
        let verified = match &account {
            Some(account) => self
                .accounts
                .verify_credential(account, password)
                .await
                .map_err(ConversationError::collaborator(chat_id))?,
            None => false,
        };

        if let (true, Some(account)) = (verified, account) {
            let evicted = self
                .sessions
                .bind_verified(chat_id, account.id())
                .await
                .map_err(ConversationError::persistence(chat_id))?;
            if let Some(evicted) = evicted {
                info!(account_id = %account.id(), %evicted, "previous chat evicted");
            }
            info!(account_id = %account.id(), "chat connected");
            return Ok(AuthTurn {
                reply: Reply::text(format!("Connected as {}.", account.email()))
                    .with_markup(input::main_menu()),
                evicted,
            });
        }

        if auth.attempts >= self.max_attempts {
            warn!(attempts = auth.attempts, "too many failed password attempts");
            self.sessions
                .clear(chat_id)
                .await
                .map_err(ConversationError::persistence(chat_id))?;
            return Ok(AuthTurn::reply(Reply::text(
                "Too many failed attempts. Send /start to try again.",
            )));
        }

        let remaining = self.max_attempts - auth.attempts;
        self.sessions
            .set(&ChatSession::pending(chat_id, auth))
            .await
            .map_err(ConversationError::persistence(chat_id))?;
        Ok(AuthTurn::reply(Reply::text(format!(
            "Wrong password. {remaining} attempt{} left.",
            if remaining == 1 { "" } else { "s" }
        ))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryAccounts, InMemorySessionBackend};
    use crate::session::SessionState;

    struct Fixture {
        accounts: Arc<InMemoryAccounts>,
        sessions: SessionStore,
        auth: AuthNegotiator,
    }

    fn fixture() -> Fixture {
        let accounts = Arc::new(InMemoryAccounts::new());
        let sessions = SessionStore::new(Arc::new(InMemorySessionBackend::new()));
        let auth = AuthNegotiator::new(accounts.clone(), sessions.clone());
        Fixture {
            accounts,
            sessions,
            auth,
        }
    }

    fn email(s: &str) -> Email {
        Email::parse(s).expect("valid email")
    }

    async fn pending(f: &Fixture, chat: ChatId) -> PendingAuth {
        match f.sessions.get(chat, Utc::now()).await.expect("get") {
            Some(session) => match session.state() {
                SessionState::PendingAuth(auth) => auth.clone(),
                SessionState::Menu(_) => panic!("expected pending session"),
            },
            None => panic!("expected a session"),
        }
    }

    #[tokio::test]
    async fn start_opens_email_step() {
        let f = fixture();
        let chat = ChatId::new(1);
        f.auth.start(chat, None, Utc::now()).await.expect("start");
        let auth = pending(&f, chat).await;
        assert_eq!(auth.step, AuthStep::AwaitEmail);
        assert_eq!(auth.attempts, 0);
    }

    #[tokio::test]
    async fn invalid_email_changes_nothing() {
        let f = fixture();
        let chat = ChatId::new(1);
        f.auth.start(chat, None, Utc::now()).await.expect("start");
        let before = pending(&f, chat).await;
        let turn = f
            .auth
            .advance(chat, before.clone(), &Input::from_text("not-an-email"), Utc::now())
            .await
            .expect("advance");
        assert!(turn.reply.text.contains("email address"));
        assert_eq!(pending(&f, chat).await, before);
    }

    #[tokio::test]
    async fn email_lookup_is_case_insensitive() {
        let f = fixture();
        f.accounts.add(email("alice@example.com"), "pw");
        let chat = ChatId::new(1);
        f.auth.start(chat, None, Utc::now()).await.expect("start");
        let auth = pending(&f, chat).await;
        f.auth
            .advance(chat, auth, &Input::from_text("Alice@Example.com"), Utc::now())
            .await
            .expect("advance");
        let auth = pending(&f, chat).await;
        assert_eq!(auth.step, AuthStep::AwaitPassword);
        assert_eq!(auth.email, Some(email("alice@example.com")));
    }

    #[tokio::test]
    async fn unknown_email_stays_without_penalty() {
        let f = fixture();
        let chat = ChatId::new(1);
        f.auth.start(chat, None, Utc::now()).await.expect("start");
        let auth = pending(&f, chat).await;
        let turn = f
            .auth
            .advance(chat, auth, &Input::from_text("nobody@example.com"), Utc::now())
            .await
            .expect("advance");
        assert!(turn.reply.text.contains("No account"));
        let auth = pending(&f, chat).await;
        assert_eq!(auth.step, AuthStep::AwaitEmail);
        assert_eq!(auth.attempts, 0);
    }

    #[tokio::test]
    async fn email_for_account_bound_elsewhere_is_refused() {
        let f = fixture();
        let account = f.accounts.add(email("alice@example.com"), "pw");
        f.sessions
            .bind_verified(ChatId::new(99), account.id())
            .await
            .expect("bind");

        let chat = ChatId::new(1);
        f.auth.start(chat, None, Utc::now()).await.expect("start");
        let auth = pending(&f, chat).await;
        let turn = f
            .auth
            .advance(chat, auth, &Input::from_text("alice@example.com"), Utc::now())
            .await
            .expect("advance");
        assert!(turn.reply.text.contains("already connected"));
        assert_eq!(pending(&f, chat).await.step, AuthStep::AwaitEmail);
    }

    #[tokio::test]
    async fn fourth_wrong_password_clears_session() {
        let f = fixture();
        f.accounts.add(email("alice@example.com"), "right");
        let chat = ChatId::new(1);
        f.auth.start(chat, None, Utc::now()).await.expect("start");
        let auth = pending(&f, chat).await;
        f.auth
            .advance(chat, auth, &Input::from_text("alice@example.com"), Utc::now())
            .await
            .expect("email");

        for (attempt, remaining) in [
            (1, "3 attempts left"),
            (2, "2 attempts left"),
            (3, "1 attempt left"),
        ] {
            let auth = pending(&f, chat).await;
            let turn = f
                .auth
                .advance(chat, auth, &Input::from_text("wrong"), Utc::now())
                .await
                .expect("password");
            assert!(
                turn.reply.text.contains(remaining),
                "attempt {attempt}: {}",
                turn.reply.text
            );
            assert_eq!(pending(&f, chat).await.attempts, attempt);
        }

        let auth = pending(&f, chat).await;
        let turn = f
            .auth
            .advance(chat, auth, &Input::from_text("wrong"), Utc::now())
            .await
            .expect("password");
        assert!(turn.reply.text.contains("Too many failed attempts"));
        assert!(f.sessions.get(chat, Utc::now()).await.expect("get").is_none());
    }

    #[tokio::test]
    async fn password_step_ignores_messages_without_text() {
        let f = fixture();
        f.accounts.add(email("alice@example.com"), "right");
        let chat = ChatId::new(1);
        f.auth.start(chat, None, Utc::now()).await.expect("start");
        let auth = pending(&f, chat).await;
        f.auth
            .advance(chat, auth, &Input::from_text("alice@example.com"), Utc::now())
            .await
            .expect("email");

        for input in [
            Input::Photo("photo-1".to_string()),
            Input::Photo("photo-2".to_string()),
            Input::from_text("   "),
            Input::Photo("photo-3".to_string()),
            Input::Photo("photo-4".to_string()),
        ] {
            let auth = pending(&f, chat).await;
            let turn = f
                .auth
                .advance(chat, auth, &input, Utc::now())
                .await
                .expect("advance");
            assert!(turn.reply.text.contains("password as a text message"));
        }
        let auth = pending(&f, chat).await;
        assert_eq!(auth.step, AuthStep::AwaitPassword);
        assert_eq!(auth.attempts, 0);

        let turn = f
            .auth
            .advance(chat, auth, &Input::from_text("right"), Utc::now())
            .await
            .expect("password");
        assert!(turn.reply.text.starts_with("Connected as"));
    }

    #[tokio::test]
    async fn correct_password_binds_and_reports_eviction() {
        let f = fixture();
        let account = f.accounts.add(email("alice@example.com"), "right");
        let chat = ChatId::new(2);
        let auth = PendingAuth {
            step: AuthStep::AwaitPassword,
            email: Some(email("alice@example.com")),
            attempts: 0,
            issued_at: Utc::now(),
        };
        // Another chat bound between this chat's email and password steps.
        f.sessions
            .bind_verified(ChatId::new(1), account.id())
            .await
            .expect("bind");

        let turn = f
            .auth
            .advance(chat, auth, &Input::from_text("right"), Utc::now())
            .await
            .expect("password");
        assert_eq!(turn.evicted, Some(ChatId::new(1)));
        assert!(turn.reply.text.contains("alice@example.com"));
        assert_eq!(
            f.sessions.find_verified_chat(account.id()).await.expect("find"),
            Some(chat)
        );
    }

    #[tokio::test]
    async fn start_when_verified_resets_to_idle() {
        let f = fixture();
        let account = f.accounts.add(email("alice@example.com"), "pw");
        let chat = ChatId::new(1);
        let session = ChatSession::verified(
            chat,
            account.id(),
            MenuState::AwaitAmount {
                kind: ledgerbot_ledger::RecordKind::Income,
            },
        );
        f.sessions.set(&session).await.expect("save");

        let reply = f
            .auth
            .start(chat, Some(&session), Utc::now())
            .await
            .expect("start");
        assert!(reply.text.contains("already connected"));
        let stored = f.sessions.get(chat, Utc::now()).await.expect("get").expect("present");
        assert_eq!(stored.state(), &SessionState::Menu(MenuState::Idle));
    }

    #[tokio::test]
    async fn cancel_clears_pending() {
        let f = fixture();
        let chat = ChatId::new(1);
        f.auth.start(chat, None, Utc::now()).await.expect("start");
        f.auth.cancel(chat).await.expect("cancel");
        assert!(f.sessions.get(chat, Utc::now()).await.expect("get").is_none());
    }
}
