//! Ledger for ledgerbot.
//!
//! This crate provides:
//!
//! - **Records**: transactions, loans, bank accounts, and validated amounts
//! - **Stores**: the persistence seams the server implements
//! - **Writer**: commits a finalized entry and moves the bank balance
//! - **Reports**: read-only summaries with a running-balance walk

pub mod error;
pub mod memory;
pub mod record;
pub mod report;
pub mod store;
pub mod writer;

pub use error::{LedgerError, StoreError};
pub use memory::InMemoryLedger;
pub use record::{
    Amount, BankAccount, LedgerRecord, Loan, LoanKind, LoanStatus, NewEntry, RecordKind,
    RecordRef, Transaction, TransactionKind,
};
pub use report::{LedgerReport, ReportComposer, StatementLine};
pub use store::{BankAccountStore, RecordStore};
pub use writer::{BalanceChange, CommitOutcome, LedgerWriter};
