//! Core domain types and utilities for ledgerbot.
//!
//! This crate provides the identifiers, error handling, and time source
//! shared by the ledger, conversation, and server crates.

pub mod clock;
pub mod error;
pub mod id;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::Result;
pub use id::{AccountId, BankAccountId, ChatId, LoanId, ParseIdError, TransactionId};
