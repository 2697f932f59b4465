//! Account identity as seen by the chat channel.
//!
//! Accounts are created and managed by the dashboard. The chat channel only
//! looks them up by email and checks a password against the stored hash.

use crate::error::{AccountError, EmailError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ledgerbot_core::{AccountId, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));

/// A syntactically valid, lower-cased email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Validates and normalizes user input.
    ///
    /// Surrounding whitespace is ignored and the address is lower-cased, so
    /// lookups are case-insensitive exact matches.
    pub fn parse(input: &str) -> std::result::Result<Self, EmailError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(EmailError::Empty);
        }
        if !EMAIL_PATTERN.is_match(trimmed) {
            return Err(EmailError::Malformed {
                input: trimmed.to_string(),
            });
        }
        Ok(Self(trimmed.to_lowercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A credential-holding identity that owns bank accounts and ledger rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    id: AccountId,
    email: Email,
    created_at: DateTime<Utc>,
}

impl Account {
    #[must_use]
    pub fn new(id: AccountId, email: Email, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            email,
            created_at,
        }
    }

    #[must_use]
    pub fn id(&self) -> AccountId {
        self.id
    }

    #[must_use]
    pub fn email(&self) -> &Email {
        &self.email
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Read-only access to accounts and their credentials.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Finds an account by case-insensitive exact email match.
    async fn find_by_email(&self, email: &Email) -> Result<Option<Account>, AccountError>;

    /// Finds an account by ID.
    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, AccountError>;

    /// Returns true if `password` matches the account's stored credential.
    async fn verify_credential(
        &self,
        account: &Account,
        password: &str,
    ) -> Result<bool, AccountError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_lowercased_and_trimmed() {
        let email = Email::parse("  Alice@Example.COM ").expect("valid");
        assert_eq!(email.as_str(), "alice@example.com");
    }

    #[test]
    fn email_rejects_missing_domain() {
        assert!(matches!(
            Email::parse("alice@"),
            Err(EmailError::Malformed { .. })
        ));
        assert!(matches!(
            Email::parse("alice@example"),
            Err(EmailError::Malformed { .. })
        ));
    }

    #[test]
    fn email_rejects_blank_input() {
        assert_eq!(Email::parse("   "), Err(EmailError::Empty));
    }

    #[test]
    fn email_rejects_embedded_whitespace() {
        assert!(Email::parse("al ice@example.com").is_err());
    }

    #[test]
    fn account_serde_roundtrip() {
        let account = Account::new(
            AccountId::new(),
            Email::parse("bob@example.com").expect("valid"),
            Utc::now(),
        );
        let json = serde_json::to_string(&account).expect("serialize");
        let parsed: Account = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(account, parsed);
    }
}
