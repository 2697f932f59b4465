//! Storage seams for the ledger.
//!
//! The server implements these against Postgres; `memory` provides an
//! in-process implementation for tests and local runs.

use crate::error::StoreError;
use crate::record::{BankAccount, Loan, Transaction};
use async_trait::async_trait;
use ledgerbot_core::{AccountId, BankAccountId, Result};
use rust_decimal::Decimal;

/// Bank accounts and their running balances.
#[async_trait]
pub trait BankAccountStore: Send + Sync {
    /// Lists the bank accounts owned by `owner`, ordered by name.
    async fn list_by_owner(&self, owner: AccountId) -> Result<Vec<BankAccount>, StoreError>;

    /// Reads the current balance of a bank account.
    async fn read_balance(&self, id: BankAccountId) -> Result<Decimal, StoreError>;

    /// Sets the balance to `new` only if it still equals `expected`.
    ///
    /// Returns false when another writer changed the balance first.
    async fn compare_and_swap_balance(
        &self,
        id: BankAccountId,
        expected: Decimal,
        new: Decimal,
    ) -> Result<bool, StoreError>;
}

/// Append-only transaction and loan rows.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert_transaction(&self, transaction: &Transaction) -> Result<(), StoreError>;

    async fn insert_loan(&self, loan: &Loan) -> Result<(), StoreError>;

    /// All transactions of `owner`, oldest first.
    async fn list_transactions(&self, owner: AccountId) -> Result<Vec<Transaction>, StoreError>;

    /// All loans of `owner`, oldest first.
    async fn list_loans(&self, owner: AccountId) -> Result<Vec<Loan>, StoreError>;
}
