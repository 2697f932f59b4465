//! Read-only ledger summaries for the chat channel.

use crate::error::LedgerError;
use crate::record::{LoanKind, LoanStatus, Transaction, TransactionKind};
use crate::store::RecordStore;
use chrono::{DateTime, Utc};
use ledgerbot_core::{AccountId, Result};
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;
use tracing::instrument;

/// Default number of transactions shown in the running-balance walk.
pub const DEFAULT_RECENT_LIMIT: usize = 10;

/// One line of the running-balance walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementLine {
    pub at: DateTime<Utc>,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub description: Option<String>,
    /// Net of every transaction up to and including this one.
    pub running_total: Decimal,
}

/// Totals and recent activity for one account.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LedgerReport {
    pub total_income: Decimal,
    pub total_expense: Decimal,
    pub active_loans_taken: Decimal,
    pub active_loans_given: Decimal,
    pub recent: Vec<StatementLine>,
}

impl LedgerReport {
    #[must_use]
    pub fn net(&self) -> Decimal {
        self.total_income - self.total_expense
    }

    /// Builds a report from rows in any order.
    #[must_use]
    pub fn from_rows(
        mut transactions: Vec<Transaction>,
        loans: &[crate::record::Loan],
        recent_limit: usize,
    ) -> Self {
        let mut report = Self::default();
        transactions.sort_by_key(|t| t.created_at);

        let mut running = Decimal::ZERO;
        let mut walk = Vec::with_capacity(transactions.len());
        for t in &transactions {
            match t.kind {
                TransactionKind::Income => report.total_income += t.amount.value(),
                TransactionKind::Expense => report.total_expense += t.amount.value(),
            }
            running += t.signed_amount();
            walk.push(StatementLine {
                at: t.created_at,
                kind: t.kind,
                amount: t.amount.value(),
                description: t.description.clone(),
                running_total: running,
            });
        }
        let skip = walk.len().saturating_sub(recent_limit);
        report.recent = walk.split_off(skip);

        for loan in loans.iter().filter(|l| l.status == LoanStatus::Active) {
            match loan.kind {
                LoanKind::Take => report.active_loans_taken += loan.amount.value(),
                LoanKind::Give => report.active_loans_given += loan.amount.value(),
            }
        }
        report
    }
}

impl fmt::Display for LedgerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Summary")?;
        writeln!(f, "Income: {:.2}", self.total_income)?;
        writeln!(f, "Expense: {:.2}", self.total_expense)?;
        writeln!(f, "Net: {:.2}", self.net())?;
        writeln!(f, "Active loans taken: {:.2}", self.active_loans_taken)?;
        writeln!(f, "Active loans given: {:.2}", self.active_loans_given)?;
        if self.recent.is_empty() {
            return write!(f, "\nNo transactions yet.");
        }
        write!(f, "\nRecent transactions")?;
        for line in &self.recent {
            let sign = match line.kind {
                TransactionKind::Income => '+',
                TransactionKind::Expense => '-',
            };
            write!(
                f,
                "\n{} {}{:.2} -> {:.2}",
                line.at.format("%Y-%m-%d"),
                sign,
                line.amount,
                line.running_total
            )?;
            if let Some(description) = &line.description {
                write!(f, " ({description})")?;
            }
        }
        Ok(())
    }
}

/// Composes reports from ledger reads.
#[derive(Clone)]
pub struct ReportComposer {
    records: Arc<dyn RecordStore>,
    recent_limit: usize,
}

impl ReportComposer {
    #[must_use]
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self {
            records,
            recent_limit: DEFAULT_RECENT_LIMIT,
        }
    }

    #[must_use]
    pub fn with_recent_limit(mut self, recent_limit: usize) -> Self {
        self.recent_limit = recent_limit;
        self
    }

    /// Builds the report for `owner`.
    #[instrument(skip(self), fields(account_id = %owner))]
    pub async fn compose(&self, owner: AccountId) -> Result<LedgerReport, LedgerError> {
        let transactions = self
            .records
            .list_transactions(owner)
            .await
            .map_err(|e| LedgerError::ReadFailed {
                reason: e.to_string(),
            })?;
        let loans = self
            .records
            .list_loans(owner)
            .await
            .map_err(|e| LedgerError::ReadFailed {
                reason: e.to_string(),
            })?;
        Ok(LedgerReport::from_rows(transactions, &loans, self.recent_limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryLedger;
    use crate::record::{Amount, Loan};
    use chrono::Duration;
    use ledgerbot_core::{LoanId, TransactionId};
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).expect("valid decimal")
    }

    fn transaction(
        owner: AccountId,
        kind: TransactionKind,
        amount: &str,
        at: DateTime<Utc>,
    ) -> Transaction {
        Transaction {
            id: TransactionId::new(),
            account_id: owner,
            kind,
            amount: Amount::parse(amount).expect("valid amount"),
            bank_account_id: None,
            description: None,
            image_url: None,
            created_at: at,
        }
    }

    fn loan(owner: AccountId, kind: LoanKind, amount: &str, status: LoanStatus) -> Loan {
        Loan {
            id: LoanId::new(),
            account_id: owner,
            kind,
            amount: Amount::parse(amount).expect("valid amount"),
            status,
            bank_account_id: None,
            description: None,
            image_url: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn running_total_walks_in_chronological_order() {
        let owner = AccountId::new();
        let t0 = Utc::now() - Duration::days(3);
        // Deliberately out of order.
        let rows = vec![
            transaction(owner, TransactionKind::Expense, "30", t0 + Duration::days(2)),
            transaction(owner, TransactionKind::Income, "100", t0),
            transaction(owner, TransactionKind::Expense, "20", t0 + Duration::days(1)),
        ];

        let report = LedgerReport::from_rows(rows, &[], 10);

        let totals: Vec<Decimal> = report.recent.iter().map(|l| l.running_total).collect();
        assert_eq!(totals, vec![dec("100"), dec("80"), dec("50")]);
        assert_eq!(report.net(), dec("50"));
    }

    #[test]
    fn recent_window_keeps_latest_lines_with_full_running_total() {
        let owner = AccountId::new();
        let t0 = Utc::now() - Duration::days(10);
        let rows = (0..5)
            .map(|i| transaction(owner, TransactionKind::Income, "10", t0 + Duration::days(i)))
            .collect();

        let report = LedgerReport::from_rows(rows, &[], 2);

        assert_eq!(report.recent.len(), 2);
        assert_eq!(report.recent[1].running_total, dec("50"));
        assert_eq!(report.total_income, dec("50"));
    }

    #[test]
    fn only_active_loans_are_totalled() {
        let owner = AccountId::new();
        let loans = vec![
            loan(owner, LoanKind::Take, "200", LoanStatus::Active),
            loan(owner, LoanKind::Take, "50", LoanStatus::Refunded),
            loan(owner, LoanKind::Give, "70", LoanStatus::Active),
        ];

        let report = LedgerReport::from_rows(Vec::new(), &loans, 10);

        assert_eq!(report.active_loans_taken, dec("200"));
        assert_eq!(report.active_loans_given, dec("70"));
        assert!(report.to_string().contains("No transactions yet"));
    }

    #[test]
    fn rendered_report_lists_totals_and_lines() {
        let owner = AccountId::new();
        let mut row = transaction(owner, TransactionKind::Income, "500", Utc::now());
        row.description = Some("salary".to_string());

        let text = LedgerReport::from_rows(vec![row], &[], 10).to_string();

        assert!(text.contains("Income: 500.00"));
        assert!(text.contains("+500.00 -> 500.00 (salary)"));
    }

    #[tokio::test]
    async fn composer_reads_only_the_owners_rows() {
        let ledger = Arc::new(InMemoryLedger::new());
        let owner = AccountId::new();
        let other = AccountId::new();
        ledger
            .insert_transaction(&transaction(owner, TransactionKind::Income, "10", Utc::now()))
            .await
            .expect("insert");
        ledger
            .insert_transaction(&transaction(other, TransactionKind::Income, "99", Utc::now()))
            .await
            .expect("insert");

        let report = ReportComposer::new(ledger.clone())
            .compose(owner)
            .await
            .expect("report");

        assert_eq!(report.total_income, dec("10"));
    }
}
