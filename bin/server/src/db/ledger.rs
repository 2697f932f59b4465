//! Bank accounts and ledger rows.

use super::decode_error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ledgerbot_core::{AccountId, BankAccountId, LoanId, Result, TransactionId};
use ledgerbot_ledger::{
    Amount, BankAccount, BankAccountStore, Loan, LoanKind, LoanStatus, RecordStore, StoreError,
    Transaction, TransactionKind,
};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use tracing::instrument;

fn unavailable(e: sqlx::Error) -> StoreError {
    StoreError::Unavailable {
        reason: e.to_string(),
    }
}

fn parse_amount(value: Decimal) -> std::result::Result<Amount, sqlx::Error> {
    Amount::new(value).ok_or_else(|| decode_error("amount", &value.to_string(), "not positive"))
}

fn parse_bank_id(value: Option<String>) -> std::result::Result<Option<BankAccountId>, sqlx::Error> {
    value
        .map(|id| BankAccountId::from_str(&id).map_err(|e| decode_error("bank account id", &id, e)))
        .transpose()
}

#[derive(FromRow)]
struct BankAccountRow {
    id: String,
    owner_id: String,
    name: String,
    current_balance: Decimal,
}

impl BankAccountRow {
    fn try_into_bank_account(self) -> std::result::Result<BankAccount, sqlx::Error> {
        let id = BankAccountId::from_str(&self.id)
            .map_err(|e| decode_error("bank account id", &self.id, e))?;
        let owner = AccountId::from_str(&self.owner_id)
            .map_err(|e| decode_error("account id", &self.owner_id, e))?;
        Ok(BankAccount {
            id,
            owner,
            name: self.name,
            current_balance: self.current_balance,
        })
    }
}

#[derive(FromRow)]
struct TransactionRow {
    id: String,
    account_id: String,
    kind: String,
    amount: Decimal,
    bank_account_id: Option<String>,
    description: Option<String>,
    image_url: Option<String>,
    created_at: DateTime<Utc>,
}

impl TransactionRow {
    fn try_into_transaction(self) -> std::result::Result<Transaction, sqlx::Error> {
        let id = TransactionId::from_str(&self.id)
            .map_err(|e| decode_error("transaction id", &self.id, e))?;
        let account_id = AccountId::from_str(&self.account_id)
            .map_err(|e| decode_error("account id", &self.account_id, e))?;
        let kind = TransactionKind::from_str_value(&self.kind)
            .ok_or_else(|| decode_error("transaction kind", &self.kind, "unknown"))?;
        Ok(Transaction {
            id,
            account_id,
            kind,
            amount: parse_amount(self.amount)?,
            bank_account_id: parse_bank_id(self.bank_account_id)?,
            description: self.description,
            image_url: self.image_url,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct LoanRow {
    id: String,
    account_id: String,
    kind: String,
    amount: Decimal,
    status: String,
    bank_account_id: Option<String>,
    description: Option<String>,
    image_url: Option<String>,
    created_at: DateTime<Utc>,
}

impl LoanRow {
    fn try_into_loan(self) -> std::result::Result<Loan, sqlx::Error> {
        let id = LoanId::from_str(&self.id).map_err(|e| decode_error("loan id", &self.id, e))?;
        let account_id = AccountId::from_str(&self.account_id)
            .map_err(|e| decode_error("account id", &self.account_id, e))?;
        let kind = LoanKind::from_str_value(&self.kind)
            .ok_or_else(|| decode_error("loan kind", &self.kind, "unknown"))?;
        let status = LoanStatus::from_str_value(&self.status)
            .ok_or_else(|| decode_error("loan status", &self.status, "unknown"))?;
        Ok(Loan {
            id,
            account_id,
            kind,
            amount: parse_amount(self.amount)?,
            status,
            bank_account_id: parse_bank_id(self.bank_account_id)?,
            description: self.description,
            image_url: self.image_url,
            created_at: self.created_at,
        })
    }
}

/// Repository for bank accounts and their balances.
#[derive(Clone)]
pub struct BankAccountRepository {
    pool: PgPool,
}

impl BankAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BankAccountStore for BankAccountRepository {
    #[instrument(skip(self))]
    async fn list_by_owner(&self, owner: AccountId) -> Result<Vec<BankAccount>, StoreError> {
        let rows: Vec<BankAccountRow> = sqlx::query_as(
            r#"
            SELECT id, owner_id, name, current_balance
            FROM bank_accounts
            WHERE owner_id = $1
            ORDER BY name
            "#,
        )
        .bind(owner.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(rows
            .into_iter()
            .map(BankAccountRow::try_into_bank_account)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(unavailable)?)
    }

    #[instrument(skip(self))]
    async fn read_balance(&self, id: BankAccountId) -> Result<Decimal, StoreError> {
        let balance: Option<Decimal> = sqlx::query_scalar(
            r#"
            SELECT current_balance
            FROM bank_accounts
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        match balance {
            Some(balance) => Ok(balance),
            None => Err(StoreError::NotFound {
                entity: "bank account",
                id: id.to_string(),
            }
            .into()),
        }
    }

    #[instrument(skip(self))]
    async fn compare_and_swap_balance(
        &self,
        id: BankAccountId,
        expected: Decimal,
        new: Decimal,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE bank_accounts
            SET current_balance = $3, updated_at = now()
            WHERE id = $1 AND current_balance = $2
            "#,
        )
        .bind(id.to_string())
        .bind(expected)
        .bind(new)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(result.rows_affected() == 1)
    }
}

/// Repository for transactions and loans.
#[derive(Clone)]
pub struct RecordRepository {
    pool: PgPool,
}

impl RecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for RecordRepository {
    #[instrument(skip(self, transaction), fields(id = %transaction.id))]
    async fn insert_transaction(&self, transaction: &Transaction) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO transactions
                (id, account_id, kind, amount, bank_account_id, description, image_url, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(transaction.id.to_string())
        .bind(transaction.account_id.to_string())
        .bind(transaction.kind.as_str())
        .bind(transaction.amount.value())
        .bind(transaction.bank_account_id.map(|id| id.to_string()))
        .bind(transaction.description.as_deref())
        .bind(transaction.image_url.as_deref())
        .bind(transaction.created_at)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(())
    }

    #[instrument(skip(self, loan), fields(id = %loan.id))]
    async fn insert_loan(&self, loan: &Loan) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO loans
                (id, account_id, kind, amount, status, bank_account_id, description, image_url, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(loan.id.to_string())
        .bind(loan.account_id.to_string())
        .bind(loan.kind.as_str())
        .bind(loan.amount.value())
        .bind(loan.status.as_str())
        .bind(loan.bank_account_id.map(|id| id.to_string()))
        .bind(loan.description.as_deref())
        .bind(loan.image_url.as_deref())
        .bind(loan.created_at)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_transactions(&self, owner: AccountId) -> Result<Vec<Transaction>, StoreError> {
        let rows: Vec<TransactionRow> = sqlx::query_as(
            r#"
            SELECT id, account_id, kind, amount, bank_account_id, description, image_url, created_at
            FROM transactions
            WHERE account_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(owner.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(rows
            .into_iter()
            .map(TransactionRow::try_into_transaction)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(unavailable)?)
    }

    #[instrument(skip(self))]
    async fn list_loans(&self, owner: AccountId) -> Result<Vec<Loan>, StoreError> {
        let rows: Vec<LoanRow> = sqlx::query_as(
            r#"
            SELECT id, account_id, kind, amount, status, bank_account_id, description, image_url, created_at
            FROM loans
            WHERE account_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(owner.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(rows
            .into_iter()
            .map(LoanRow::try_into_loan)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(unavailable)?)
    }
}
