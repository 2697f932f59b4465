//! Chat session persistence.
//!
//! The state lives in one JSONB column. A unique partial index on
//! `account_id WHERE verified` keeps at most one bound chat per account;
//! binding swaps the holder inside a single transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ledgerbot_conversation::{
    ChatSession, MenuState, SessionBackend, SessionState, SessionStoreError,
};
use ledgerbot_core::{AccountId, ChatId, Result};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use tracing::{debug, instrument};

#[derive(FromRow)]
struct ChatSessionRow {
    chat_id: i64,
    account_id: Option<String>,
    verified: bool,
    state: serde_json::Value,
}

impl ChatSessionRow {
    fn try_into_session(self) -> std::result::Result<ChatSession, SessionStoreError> {
        let chat_id = ChatId::new(self.chat_id);
        let corrupt = |reason: String| SessionStoreError::Corrupt { chat_id, reason };
        let account_id = self
            .account_id
            .map(|id| {
                AccountId::from_str(&id).map_err(|e| corrupt(format!("account id '{id}': {e}")))
            })
            .transpose()?;
        let state: SessionState = serde_json::from_value(self.state)
            .map_err(|e| corrupt(format!("state: {e}")))?;
        ChatSession::from_parts(chat_id, account_id, self.verified, state)
    }
}

fn unavailable(e: sqlx::Error) -> SessionStoreError {
    SessionStoreError::Unavailable {
        reason: e.to_string(),
    }
}

/// A unique violation means another chat holds the account's binding.
fn conflict_or_unavailable(e: sqlx::Error, chat_id: ChatId) -> SessionStoreError {
    if e
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation())
    {
        SessionStoreError::BindingConflict { chat_id }
    } else {
        unavailable(e)
    }
}

fn encode_state(state: &SessionState) -> std::result::Result<serde_json::Value, SessionStoreError> {
    serde_json::to_value(state).map_err(|e| SessionStoreError::Unavailable {
        reason: format!("could not encode session state: {e}"),
    })
}

/// Repository for chat sessions.
#[derive(Clone)]
pub struct ChatSessionRepository {
    pool: PgPool,
}

impl ChatSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionBackend for ChatSessionRepository {
    #[instrument(skip(self))]
    async fn load(&self, chat_id: ChatId) -> Result<Option<ChatSession>, SessionStoreError> {
        let row: Option<ChatSessionRow> = sqlx::query_as(
            r#"
            SELECT chat_id, account_id, verified, state
            FROM chat_sessions
            WHERE chat_id = $1
            "#,
        )
        .bind(chat_id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        match row {
            Some(r) => Ok(Some(r.try_into_session()?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, session), fields(chat_id = %session.chat_id()))]
    async fn save(&self, session: &ChatSession) -> Result<(), SessionStoreError> {
        let state = encode_state(session.state())?;
        sqlx::query(
            r#"
            INSERT INTO chat_sessions (chat_id, account_id, verified, state, issued_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, now())
            ON CONFLICT (chat_id) DO UPDATE
            SET account_id = EXCLUDED.account_id,
                verified = EXCLUDED.verified,
                state = EXCLUDED.state,
                issued_at = EXCLUDED.issued_at,
                updated_at = now()
            "#,
        )
        .bind(session.chat_id().get())
        .bind(session.account_id().map(|id| id.to_string()))
        .bind(session.is_verified())
        .bind(state)
        .bind(session.issued_at())
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_unavailable(e, session.chat_id()))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, chat_id: ChatId) -> Result<(), SessionStoreError> {
        sqlx::query("DELETE FROM chat_sessions WHERE chat_id = $1")
            .bind(chat_id.get())
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_verified_chat(
        &self,
        account_id: AccountId,
    ) -> Result<Option<ChatId>, SessionStoreError> {
        let chat_id: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT chat_id
            FROM chat_sessions
            WHERE account_id = $1 AND verified
            "#,
        )
        .bind(account_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(chat_id.map(ChatId::new))
    }

    #[instrument(skip(self))]
    async fn bind_verified(
        &self,
        chat_id: ChatId,
        account_id: AccountId,
    ) -> Result<Option<ChatId>, SessionStoreError> {
        let state = encode_state(&SessionState::Menu(MenuState::Idle))?;
        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        let removed: Vec<i64> = sqlx::query_scalar(
            r#"
            DELETE FROM chat_sessions
            WHERE chat_id = $1 OR (account_id = $2 AND verified)
            RETURNING chat_id
            "#,
        )
        .bind(chat_id.get())
        .bind(account_id.to_string())
        .fetch_all(&mut *tx)
        .await
        .map_err(unavailable)?;

        sqlx::query(
            r#"
            INSERT INTO chat_sessions (chat_id, account_id, verified, state, issued_at, updated_at)
            VALUES ($1, $2, TRUE, $3, NULL, now())
            "#,
        )
        .bind(chat_id.get())
        .bind(account_id.to_string())
        .bind(state)
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_or_unavailable(e, chat_id))?;

        tx.commit().await.map_err(unavailable)?;

        let evicted = removed
            .into_iter()
            .map(ChatId::new)
            .find(|removed| *removed != chat_id);
        debug!(?evicted, "binding replaced");
        Ok(evicted)
    }

    #[instrument(skip(self))]
    async fn delete_pending_issued_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, SessionStoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM chat_sessions
            WHERE NOT verified AND issued_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(result.rows_affected())
    }
}
