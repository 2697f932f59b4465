//! Error types for the integration crate.
//!
//! - `MessengerError`: the messaging platform call failed
//! - `BlobError`: the blob store upload failed

use std::fmt;

/// Errors from messaging platform calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessengerError {
    /// The request could not be sent or timed out.
    Transport { method: String, reason: String },
    /// The platform answered with `ok: false` or a non-success status.
    Rejected { method: String, description: String },
    /// The platform answered with something we could not decode.
    InvalidResponse { method: String, reason: String },
}

impl fmt::Display for MessengerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport { method, reason } => {
                write!(f, "{method} request failed: {reason}")
            }
            Self::Rejected {
                method,
                description,
            } => write!(f, "{method} rejected by platform: {description}"),
            Self::InvalidResponse { method, reason } => {
                write!(f, "{method} returned an invalid response: {reason}")
            }
        }
    }
}

impl std::error::Error for MessengerError {}

/// Errors from the blob store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobError {
    /// The upload could not be sent or timed out.
    Transport { path: String, reason: String },
    /// The store answered with a non-success status.
    Rejected { path: String, status: u16 },
}

impl fmt::Display for BlobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport { path, reason } => write!(f, "upload of {path} failed: {reason}"),
            Self::Rejected { path, status } => {
                write!(f, "upload of {path} rejected with status {status}")
            }
        }
    }
}

impl std::error::Error for BlobError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messenger_error_names_method() {
        let err = MessengerError::Rejected {
            method: "getFile".to_string(),
            description: "file is too big".to_string(),
        };
        assert!(err.to_string().contains("getFile"));
        assert!(err.to_string().contains("file is too big"));
    }

    #[test]
    fn blob_error_display() {
        let err = BlobError::Rejected {
            path: "acct_1/receipt.jpg".to_string(),
            status: 403,
        };
        assert!(err.to_string().contains("403"));
    }
}
