//! Account access for the ledgerbot chat channel.
//!
//! This crate provides:
//! - `Account` and the normalized `Email` used to look it up
//! - The `AccountStore` trait implemented by the server's database layer
//! - Error types for lookups and credential checks

pub mod account;
pub mod error;

pub use account::{Account, AccountStore, Email};
pub use error::{AccountError, EmailError};
