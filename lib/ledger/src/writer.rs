//! The ledger writer: the single place where a finalized entry becomes data.
//!
//! A commit runs in two steps:
//! 1. Insert the transaction or loan row. If this fails nothing else runs.
//! 2. If the entry names a bank account, apply the signed delta to its
//!    balance with compare-and-swap, re-reading and retrying on conflict.
//!
//! Step 2 failing after step 1 leaves the row recorded and the balance
//! untouched; the outcome reports this as `BalanceStale`.

use crate::error::LedgerError;
use crate::record::{LedgerRecord, NewEntry, RecordRef};
use crate::store::{BankAccountStore, RecordStore};
use chrono::Utc;
use ledgerbot_core::{BankAccountId, Result};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

/// Default number of compare-and-swap attempts before giving up.
pub const DEFAULT_BALANCE_RETRY_LIMIT: u32 = 5;

/// A balance that was moved by a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceChange {
    pub bank_account_id: BankAccountId,
    pub before: Decimal,
    pub after: Decimal,
}

/// What a successful commit did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The row was written and, if a bank account was named, its balance moved.
    Recorded {
        record: RecordRef,
        balance: Option<BalanceChange>,
    },
    /// The row was written but the balance could not be updated.
    BalanceStale {
        record: RecordRef,
        bank_account_id: BankAccountId,
        reason: String,
    },
}

impl CommitOutcome {
    #[must_use]
    pub fn record(&self) -> RecordRef {
        match self {
            Self::Recorded { record, .. } | Self::BalanceStale { record, .. } => *record,
        }
    }
}

/// Commits finalized entries to the ledger.
#[derive(Clone)]
pub struct LedgerWriter {
    records: Arc<dyn RecordStore>,
    banks: Arc<dyn BankAccountStore>,
    retry_limit: u32,
}

impl LedgerWriter {
    #[must_use]
    pub fn new(records: Arc<dyn RecordStore>, banks: Arc<dyn BankAccountStore>) -> Self {
        Self {
            records,
            banks,
            retry_limit: DEFAULT_BALANCE_RETRY_LIMIT,
        }
    }

    /// Sets how many compare-and-swap attempts a balance update gets.
    #[must_use]
    pub fn with_retry_limit(mut self, retry_limit: u32) -> Self {
        self.retry_limit = retry_limit.max(1);
        self
    }

    /// Commits `entry`.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::RecordInsertFailed` if the row could not be
    /// written. Balance problems are reported through the outcome instead.
    #[instrument(skip(self, entry), fields(account_id = %entry.account_id, kind = ?entry.kind))]
    pub async fn commit(&self, entry: NewEntry) -> Result<CommitOutcome, LedgerError> {
        let delta = entry.kind.signed_delta(entry.amount);
        let bank_account_id = entry.bank_account_id;
        let record = entry.into_record(Utc::now());

        let inserted = match &record {
            LedgerRecord::Transaction(t) => self.records.insert_transaction(t).await,
            LedgerRecord::Loan(l) => self.records.insert_loan(l).await,
        };
        inserted.map_err(|e| LedgerError::RecordInsertFailed {
            reason: e.to_string(),
        })?;
        let reference = record.reference();
        debug!(record = ?reference, "ledger row inserted");

        let Some(bank_account_id) = bank_account_id else {
            return Ok(CommitOutcome::Recorded {
                record: reference,
                balance: None,
            });
        };

        match self.apply_delta(bank_account_id, delta).await {
            Ok(change) => Ok(CommitOutcome::Recorded {
                record: reference,
                balance: Some(change),
            }),
            Err(reason) => {
                error!(
                    bank_account_id = %bank_account_id,
                    record = ?reference,
                    reason = reason.as_str(),
                    "ledger row recorded but balance update failed"
                );
                Ok(CommitOutcome::BalanceStale {
                    record: reference,
                    bank_account_id,
                    reason,
                })
            }
        }
    }

    async fn apply_delta(
        &self,
        id: BankAccountId,
        delta: Decimal,
    ) -> std::result::Result<BalanceChange, String> {
        for attempt in 1..=self.retry_limit {
            let before = self
                .banks
                .read_balance(id)
                .await
                .map_err(|e| e.to_string())?;
            let after = before + delta;
            let swapped = self
                .banks
                .compare_and_swap_balance(id, before, after)
                .await
                .map_err(|e| e.to_string())?;
            if swapped {
                return Ok(BalanceChange {
                    bank_account_id: id,
                    before,
                    after,
                });
            }
            warn!(bank_account_id = %id, attempt, "balance changed concurrently, retrying");
        }
        Err(format!(
            "balance kept changing after {} attempts",
            self.retry_limit
        ))
    }
}
