//! Error types for the platform-access crate.
//!
//! - `EmailError`: the submitted text is not an email address
//! - `AccountError`: the account store could not answer

use std::fmt;

/// Rejection of a submitted email address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    /// Nothing was submitted.
    Empty,
    /// The text does not look like `local@domain.tld`.
    Malformed { input: String },
}

impl fmt::Display for EmailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "email address is empty"),
            Self::Malformed { input } => write!(f, "malformed email address: {input}"),
        }
    }
}

impl std::error::Error for EmailError {}

/// Errors from the account store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountError {
    /// The lookup could not be performed.
    LookupFailed { reason: String },
    /// The credential check could not be performed.
    CredentialCheckFailed { reason: String },
}

impl fmt::Display for AccountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LookupFailed { reason } => write!(f, "account lookup failed: {reason}"),
            Self::CredentialCheckFailed { reason } => {
                write!(f, "credential check failed: {reason}")
            }
        }
    }
}

impl std::error::Error for AccountError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_email_display_includes_input() {
        let err = EmailError::Malformed {
            input: "not-an-email".to_string(),
        };
        assert!(err.to_string().contains("not-an-email"));
    }

    #[test]
    fn account_error_display() {
        let err = AccountError::LookupFailed {
            reason: "connection reset".to_string(),
        };
        assert!(err.to_string().contains("lookup failed"));
        assert!(err.to_string().contains("connection reset"));
    }
}
