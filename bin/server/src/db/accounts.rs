//! Account lookup.
//!
//! Accounts are owned by the dashboard; this repository only reads them.
//! Passwords are stored as pgcrypto hashes and checked with `crypt()`.

use super::decode_error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ledgerbot_core::{AccountId, Result};
use ledgerbot_platform_access::{Account, AccountError, AccountStore, Email};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use tracing::instrument;

#[derive(FromRow)]
struct AccountRow {
    id: String,
    email: String,
    created_at: DateTime<Utc>,
}

impl AccountRow {
    fn try_into_account(self) -> std::result::Result<Account, sqlx::Error> {
        let id = AccountId::from_str(&self.id)
            .map_err(|e| decode_error("account id", &self.id, e))?;
        let email =
            Email::parse(&self.email).map_err(|e| decode_error("email", &self.email, e))?;
        Ok(Account::new(id, email, self.created_at))
    }
}

/// Repository for account reads.
#[derive(Clone)]
pub struct AccountRepository {
    pool: PgPool,
}

impl AccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn lookup_failed(e: sqlx::Error) -> AccountError {
    AccountError::LookupFailed {
        reason: e.to_string(),
    }
}

#[async_trait]
impl AccountStore for AccountRepository {
    #[instrument(skip(self))]
    async fn find_by_email(&self, email: &Email) -> Result<Option<Account>, AccountError> {
        let row: Option<AccountRow> = sqlx::query_as(
            r#"
            SELECT id, email, created_at
            FROM accounts
            WHERE lower(email) = $1
            "#,
        )
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(lookup_failed)?;

        match row {
            Some(r) => Ok(Some(r.try_into_account().map_err(lookup_failed)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, AccountError> {
        let row: Option<AccountRow> = sqlx::query_as(
            r#"
            SELECT id, email, created_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(lookup_failed)?;

        match row {
            Some(r) => Ok(Some(r.try_into_account().map_err(lookup_failed)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, account, password), fields(account_id = %account.id()))]
    async fn verify_credential(
        &self,
        account: &Account,
        password: &str,
    ) -> Result<bool, AccountError> {
        let matches: Option<bool> = sqlx::query_scalar(
            r#"
            SELECT password_hash = crypt($2, password_hash)
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(account.id().to_string())
        .bind(password)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AccountError::CredentialCheckFailed {
            reason: e.to_string(),
        })?;

        Ok(matches.unwrap_or(false))
    }
}
