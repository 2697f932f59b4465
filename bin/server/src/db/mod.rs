//! Postgres repositories behind the library store traits.
//!
//! - accounts: read-only account lookup and `crypt()` credential checks
//! - ledger: bank balances and append-only records
//! - sessions: chat sessions with single-device binding

pub mod accounts;
pub mod ledger;
pub mod sessions;

pub use accounts::AccountRepository;
pub use ledger::{BankAccountRepository, RecordRepository};
pub use sessions::ChatSessionRepository;

/// Wraps a row-decoding failure the way sqlx reports its own.
pub(crate) fn decode_error(what: &str, value: &str, reason: impl std::fmt::Display) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("invalid {what} '{value}': {reason}"),
    )))
}
