//! In-process ledger storage.
//!
//! Backs the store traits with mutex-guarded maps. Failure switches let
//! callers exercise the partial-failure paths of a commit.

use crate::error::StoreError;
use crate::record::{BankAccount, Loan, Transaction};
use crate::store::{BankAccountStore, RecordStore};
use async_trait::async_trait;
use ledgerbot_core::{AccountId, BankAccountId, Result};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Ledger rows and bank balances held in memory.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    banks: Mutex<HashMap<BankAccountId, BankAccount>>,
    transactions: Mutex<Vec<Transaction>>,
    loans: Mutex<Vec<Loan>>,
    balance_writes: AtomicUsize,
    fail_inserts: AtomicBool,
    fail_balance_updates: AtomicBool,
    force_swap_conflicts: AtomicBool,
}

impl InMemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bank account for `owner` and returns its ID.
    pub fn add_bank_account(&self, owner: AccountId, name: &str, balance: Decimal) -> BankAccountId {
        let id = BankAccountId::new();
        lock(&self.banks).insert(
            id,
            BankAccount {
                id,
                owner,
                name: name.to_string(),
                current_balance: balance,
            },
        );
        id
    }

    #[must_use]
    pub fn balance_of(&self, id: BankAccountId) -> Option<Decimal> {
        lock(&self.banks).get(&id).map(|b| b.current_balance)
    }

    /// Number of successful balance writes so far.
    #[must_use]
    pub fn balance_writes(&self) -> usize {
        self.balance_writes.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn transactions(&self) -> Vec<Transaction> {
        lock(&self.transactions).clone()
    }

    #[must_use]
    pub fn loans(&self) -> Vec<Loan> {
        lock(&self.loans).clone()
    }

    /// Makes every row insert fail.
    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// Makes every balance read fail.
    pub fn fail_balance_updates(&self, fail: bool) {
        self.fail_balance_updates.store(fail, Ordering::SeqCst);
    }

    /// Makes every compare-and-swap report a conflict.
    pub fn force_swap_conflicts(&self, force: bool) {
        self.force_swap_conflicts.store(force, Ordering::SeqCst);
    }

    fn check_insert(&self) -> Result<(), StoreError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                reason: "insert rejected".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl BankAccountStore for InMemoryLedger {
    async fn list_by_owner(&self, owner: AccountId) -> Result<Vec<BankAccount>, StoreError> {
        let mut accounts: Vec<BankAccount> = lock(&self.banks)
            .values()
            .filter(|b| b.owner == owner)
            .cloned()
            .collect();
        accounts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(accounts)
    }

    async fn read_balance(&self, id: BankAccountId) -> Result<Decimal, StoreError> {
        if self.fail_balance_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                reason: "balance read rejected".to_string(),
            }
            .into());
        }
        let balance = self
            .balance_of(id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "bank account",
                id: id.to_string(),
            })?;
        // Let other writers interleave between read and swap.
        tokio::task::yield_now().await;
        Ok(balance)
    }

    async fn compare_and_swap_balance(
        &self,
        id: BankAccountId,
        expected: Decimal,
        new: Decimal,
    ) -> Result<bool, StoreError> {
        if self.force_swap_conflicts.load(Ordering::SeqCst) {
            return Ok(false);
        }
        let mut banks = lock(&self.banks);
        let bank = banks.get_mut(&id).ok_or_else(|| StoreError::NotFound {
            entity: "bank account",
            id: id.to_string(),
        })?;
        if bank.current_balance != expected {
            return Ok(false);
        }
        bank.current_balance = new;
        self.balance_writes.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }
}

#[async_trait]
impl RecordStore for InMemoryLedger {
    async fn insert_transaction(&self, transaction: &Transaction) -> Result<(), StoreError> {
        self.check_insert()?;
        lock(&self.transactions).push(transaction.clone());
        Ok(())
    }

    async fn insert_loan(&self, loan: &Loan) -> Result<(), StoreError> {
        self.check_insert()?;
        lock(&self.loans).push(loan.clone());
        Ok(())
    }

    async fn list_transactions(&self, owner: AccountId) -> Result<Vec<Transaction>, StoreError> {
        let mut rows: Vec<Transaction> = lock(&self.transactions)
            .iter()
            .filter(|t| t.account_id == owner)
            .cloned()
            .collect();
        rows.sort_by_key(|t| t.created_at);
        Ok(rows)
    }

    async fn list_loans(&self, owner: AccountId) -> Result<Vec<Loan>, StoreError> {
        let mut rows: Vec<Loan> = lock(&self.loans)
            .iter()
            .filter(|l| l.account_id == owner)
            .cloned()
            .collect();
        rows.sort_by_key(|l| l.created_at);
        Ok(rows)
    }
}
