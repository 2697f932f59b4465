//! Error types for the ledger crate.
//!
//! - `StoreError`: a ledger store could not complete a read or write
//! - `LedgerError`: a commit or report could not be produced

use std::fmt;

/// Errors from ledger stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The referenced row does not exist.
    NotFound { entity: &'static str, id: String },
    /// The store rejected or failed the operation.
    Unavailable { reason: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Unavailable { reason } => write!(f, "ledger store unavailable: {reason}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Errors from ledger operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The transaction or loan row could not be inserted; nothing was written.
    RecordInsertFailed { reason: String },
    /// Ledger rows could not be read for a report.
    ReadFailed { reason: String },
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RecordInsertFailed { reason } => {
                write!(f, "failed to record ledger entry: {reason}")
            }
            Self::ReadFailed { reason } => write!(f, "failed to read ledger: {reason}"),
        }
    }
}

impl std::error::Error for LedgerError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_not_found_display() {
        let err = StoreError::NotFound {
            entity: "bank account",
            id: "bank_123".to_string(),
        };
        assert_eq!(err.to_string(), "bank account not found: bank_123");
    }

    #[test]
    fn ledger_error_display() {
        let err = LedgerError::RecordInsertFailed {
            reason: "disk full".to_string(),
        };
        assert!(err.to_string().contains("disk full"));
    }
}
