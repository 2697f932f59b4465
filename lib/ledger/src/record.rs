//! Ledger record types.
//!
//! Transactions and loans are append-only. Bank accounts carry a mutable
//! running balance that the writer adjusts once per committed entry.

use chrono::{DateTime, Utc};
use ledgerbot_core::{AccountId, BankAccountId, LoanId, TransactionId};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static AMOUNT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,12}(\.\d{1,2})?$").expect("valid amount pattern"));

/// A strictly positive money amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    /// Wraps a decimal, rejecting zero and negative values.
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        (value > Decimal::ZERO).then_some(Self(value))
    }

    /// Parses user input such as `500` or `12.50`.
    ///
    /// Only plain digits with an optional fractional part of at most two
    /// places are accepted; signs, exponents, and separators are rejected.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if !AMOUNT_PATTERN.is_match(trimmed) {
            return None;
        }
        Decimal::from_str(trimmed).ok().and_then(Self::new)
    }

    #[must_use]
    pub fn value(self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = String;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("amount must be positive, got {value}"))
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// What kind of ledger entry the user is recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Income,
    Expense,
    /// Money borrowed from someone.
    LoanTake,
    /// Money lent to someone.
    LoanGive,
}

impl RecordKind {
    /// All kinds, in menu order.
    pub const ALL: [Self; 4] = [Self::Income, Self::Expense, Self::LoanTake, Self::LoanGive];

    /// Signed balance delta for `amount` of this kind.
    ///
    /// Income and borrowed money increase the balance; expenses and lent
    /// money decrease it.
    #[must_use]
    pub fn signed_delta(self, amount: Amount) -> Decimal {
        match self {
            Self::Income | Self::LoanTake => amount.value(),
            Self::Expense | Self::LoanGive => -amount.value(),
        }
    }

    #[must_use]
    pub fn is_loan(self) -> bool {
        matches!(self, Self::LoanTake | Self::LoanGive)
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Income => "Income",
            Self::Expense => "Expense",
            Self::LoanTake => "Loan taken",
            Self::LoanGive => "Loan given",
        }
    }
}

/// Direction of an income/expense row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }

    #[must_use]
    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "income" => Some(Self::Income),
            "expense" => Some(Self::Expense),
            _ => None,
        }
    }
}

/// Direction of a loan row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanKind {
    Take,
    Give,
}

impl LoanKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Take => "take",
            Self::Give => "give",
        }
    }

    #[must_use]
    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "take" => Some(Self::Take),
            "give" => Some(Self::Give),
            _ => None,
        }
    }
}

/// Loan settlement status. Settlement happens on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Active,
    Refunded,
}

impl LoanStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Refunded => "refunded",
        }
    }

    #[must_use]
    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "refunded" => Some(Self::Refunded),
            _ => None,
        }
    }
}

/// A bank account and its running balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankAccount {
    pub id: BankAccountId,
    pub owner: AccountId,
    pub name: String,
    pub current_balance: Decimal,
}

/// An income or expense row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub account_id: AccountId,
    pub kind: TransactionKind,
    pub amount: Amount,
    pub bank_account_id: Option<BankAccountId>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Signed effect of this row on a running total.
    #[must_use]
    pub fn signed_amount(&self) -> Decimal {
        match self.kind {
            TransactionKind::Income => self.amount.value(),
            TransactionKind::Expense => -self.amount.value(),
        }
    }
}

/// A loan row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub account_id: AccountId,
    pub kind: LoanKind,
    pub amount: Amount,
    pub status: LoanStatus,
    pub bank_account_id: Option<BankAccountId>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A finalized entry ready to be committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub account_id: AccountId,
    pub kind: RecordKind,
    pub amount: Amount,
    pub bank_account_id: Option<BankAccountId>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

/// Reference to the row a commit created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordRef {
    Transaction(TransactionId),
    Loan(LoanId),
}

impl NewEntry {
    /// Materializes the row this entry becomes.
    #[must_use]
    pub fn into_record(self, now: DateTime<Utc>) -> LedgerRecord {
        match self.kind {
            RecordKind::Income | RecordKind::Expense => {
                let kind = if self.kind == RecordKind::Income {
                    TransactionKind::Income
                } else {
                    TransactionKind::Expense
                };
                LedgerRecord::Transaction(Transaction {
                    id: TransactionId::new(),
                    account_id: self.account_id,
                    kind,
                    amount: self.amount,
                    bank_account_id: self.bank_account_id,
                    description: self.description,
                    image_url: self.image_url,
                    created_at: now,
                })
            }
            RecordKind::LoanTake | RecordKind::LoanGive => {
                let kind = if self.kind == RecordKind::LoanTake {
                    LoanKind::Take
                } else {
                    LoanKind::Give
                };
                LedgerRecord::Loan(Loan {
                    id: LoanId::new(),
                    account_id: self.account_id,
                    kind,
                    amount: self.amount,
                    status: LoanStatus::Active,
                    bank_account_id: self.bank_account_id,
                    description: self.description,
                    image_url: self.image_url,
                    created_at: now,
                })
            }
        }
    }
}

/// Either kind of append-only ledger row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerRecord {
    Transaction(Transaction),
    Loan(Loan),
}

impl LedgerRecord {
    #[must_use]
    pub fn reference(&self) -> RecordRef {
        match self {
            Self::Transaction(t) => RecordRef::Transaction(t.id),
            Self::Loan(l) => RecordRef::Loan(l.id),
        }
    }
}
