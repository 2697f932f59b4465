//! One webhook delivery, start to finish.
//!
//! The dispatcher reloads the chat's session, routes the message to the
//! negotiator or the engine, and sends the reply after the new state is
//! stored. It never fails: errors become a generic reply and are logged.

use crate::auth::{AuthNegotiator, AuthTurn};
use crate::engine::ConversationEngine;
use crate::error::{ConversationError, SessionStoreError};
use crate::input::Input;
use crate::reply::{self, Reply};
use crate::session::{SessionState, SessionStore};
use ledgerbot_core::{ChatId, Clock, Result};
use ledgerbot_integration::{Messenger, ReplyMarkup, Update};
use rootcause::Report;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

/// What a turn produced besides state changes.
struct Outcome {
    reply: Reply,
    evicted: Option<ChatId>,
    scrub_message: bool,
}

impl From<Reply> for Outcome {
    fn from(reply: Reply) -> Self {
        Self {
            reply,
            evicted: None,
            scrub_message: false,
        }
    }
}

impl From<AuthTurn> for Outcome {
    fn from(turn: AuthTurn) -> Self {
        Self {
            reply: turn.reply,
            evicted: turn.evicted,
            scrub_message: false,
        }
    }
}

fn failed(chat_id: ChatId, e: &Report<ConversationError>) -> Outcome {
    error!(%chat_id, error = %e, "turn failed");
    Reply::text(reply::GENERIC_FAILURE).into()
}

/// Entry point for inbound updates.
#[derive(Clone)]
pub struct Dispatcher {
    sessions: SessionStore,
    auth: AuthNegotiator,
    engine: ConversationEngine,
    messenger: Arc<dyn Messenger>,
    clock: Arc<dyn Clock>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        sessions: SessionStore,
        auth: AuthNegotiator,
        engine: ConversationEngine,
        messenger: Arc<dyn Messenger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sessions,
            auth,
            engine,
            messenger,
            clock,
        }
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Handles one update.
    #[instrument(skip_all, fields(update_id = update.update_id))]
    pub async fn handle(&self, update: Update) {
        let Some(message) = update.message else {
            debug!("update without a message ignored");
            return;
        };
        let chat_id = message.chat.id;
        let input = Input::classify(&message);

        let outcome = self.turn(chat_id, &input).await;

        if outcome.scrub_message {
            if let Err(e) = self
                .messenger
                .delete_message(chat_id, message.message_id)
                .await
            {
                warn!(%chat_id, error = %e, "could not delete password message");
            }
        }
        self.send(chat_id, &outcome.reply).await;
        if let Some(evicted) = outcome.evicted {
            self.send(
                evicted,
                &Reply::text(reply::EVICTED).with_markup(ReplyMarkup::Remove),
            )
            .await;
        }
    }

    /// Runs one turn. Errors become the generic reply.
    async fn turn(&self, chat_id: ChatId, input: &Input) -> Outcome {
        match self.route(chat_id, input).await {
            Ok(outcome) => outcome,
            Err(e) => failed(chat_id, &e),
        }
    }

    async fn route(&self, chat_id: ChatId, input: &Input) -> Result<Outcome, ConversationError> {
        let now = self.clock.now();
        let session = match self.sessions.get(chat_id, now).await {
            Ok(session) => session,
            Err(e)
                if *input == Input::Start
                    && matches!(e.current_context(), SessionStoreError::Corrupt { .. }) =>
            {
                warn!(%chat_id, error = %e, "discarding undecodable session on /start");
                self.sessions
                    .clear(chat_id)
                    .await
                    .map_err(ConversationError::persistence(chat_id))?;
                None
            }
            Err(e) => return Err(ConversationError::persistence(chat_id)(e).into()),
        };

        if *input == Input::Start {
            return Ok(self.auth.start(chat_id, session.as_ref(), now).await?.into());
        }
        let Some(session) = session else {
            return Ok(Reply::text(reply::NOT_CONNECTED).into());
        };

        match (session.state(), session.account_id()) {
            (SessionState::PendingAuth(_), _) if *input == Input::Cancel => {
                Ok(self.auth.cancel(chat_id).await?.into())
            }
            (SessionState::PendingAuth(auth), _) => {
                // The password leaves the chat even when checking it fails.
                let scrub_message = auth.awaits_password() && input.text().is_some();
                let mut outcome = match self.auth.advance(chat_id, auth.clone(), input, now).await
                {
                    Ok(turn) => Outcome::from(turn),
                    Err(e) => failed(chat_id, &e),
                };
                outcome.scrub_message = scrub_message;
                Ok(outcome)
            }
            (SessionState::Menu(menu), Some(account_id)) => Ok(self
                .engine
                .advance(chat_id, account_id, menu, input)
                .await?
                .into()),
            (SessionState::Menu(_), None) => Ok(Reply::text(reply::NOT_CONNECTED).into()),
        }
    }

    /// Sends a reply. Failures are logged and not retried.
    async fn send(&self, chat_id: ChatId, reply: &Reply) {
        if let Err(e) = self
            .messenger
            .send_message(chat_id, &reply.text, reply.markup.as_ref())
            .await
        {
            warn!(%chat_id, error = %e, "could not deliver reply");
        }
    }
}
