//! PostgreSQL storage backend.
//!
//! Every unit of work is a sqlx transaction at READ COMMITTED. Account rows
//! are read with `SELECT ... FOR UPDATE`, which serializes balance
//! mutations per account across server processes. An uncommitted
//! `sqlx::Transaction` rolls back when dropped.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::{Account, LogEntry, LogView, TransactionRecord, User};

use super::{LedgerStore, StoreError, StoreResult, UnitOfWork};

/// Postgres unique_violation
const UNIQUE_VIOLATION: &str = "23505";

/// Postgres-backed ledger store
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn find_user(&self, uid: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, uid, phone_number, first_name, last_name, address, created_at
            FROM users
            WHERE uid = $1
            "#,
        )
        .bind(uid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(UserRow::into_domain))
    }

    async fn find_account(&self, user_id: Uuid) -> StoreResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, user_id, current_balance, last_balance, created_at, updated_at
            FROM accounts
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(AccountRow::into_domain))
    }

    async fn list_logs(&self, user: &User) -> StoreResult<Vec<LogView>> {
        // Counterpart: the other account on the owning transaction record.
        // FAILED transfer entries have no committed record, so none is shown.
        let rows = sqlx::query_as::<_, LogViewRow>(
            r#"
            SELECT
                l.transaction_reff,
                l.status,
                cu.uid AS counterpart_uid,
                l.transaction_type,
                l.transaction_category,
                l.amount,
                l.remarks,
                l.balance_before,
                l.balance_after,
                l.err_message,
                l.created_at
            FROM account_transaction_logs l
            JOIN accounts a ON a.id = l.account_id
            LEFT JOIN wallet_transactions t ON t.id = l.transaction_reff
            LEFT JOIN accounts ca ON ca.id = CASE
                WHEN t.account_id = l.account_id THEN t.target_account_id
                ELSE t.account_id
            END
            LEFT JOIN users cu ON cu.id = ca.user_id
            WHERE a.user_id = $1
            ORDER BY l.seq DESC
            "#,
        )
        .bind(user.id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| row.into_domain(&user.uid))
            .collect()
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Unit of work backed by a sqlx transaction
struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn find_user_by_uid(&mut self, uid: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, uid, phone_number, first_name, last_name, address, created_at
            FROM users
            WHERE uid = $1
            "#,
        )
        .bind(uid)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(UserRow::into_domain))
    }

    async fn find_user_by_phone(&mut self, phone_number: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, uid, phone_number, first_name, last_name, address, created_at
            FROM users
            WHERE phone_number = $1
            "#,
        )
        .bind(phone_number)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(UserRow::into_domain))
    }

    async fn insert_user(&mut self, user: &User) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, uid, phone_number, first_name, last_name, address, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.id)
        .bind(&user.uid)
        .bind(&user.phone_number)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.address)
        .bind(user.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                StoreError::Duplicate(db.constraint().unwrap_or("users").to_string())
            }
            other => StoreError::Database(other),
        })?;

        Ok(())
    }

    async fn has_account(&mut self, user_id: Uuid) -> StoreResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM accounts WHERE user_id = $1)")
                .bind(user_id)
                .fetch_one(&mut *self.tx)
                .await?;

        Ok(exists)
    }

    async fn lock_account(&mut self, user_id: Uuid) -> StoreResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, user_id, current_balance, last_balance, created_at, updated_at
            FROM accounts
            WHERE user_id = $1
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(AccountRow::into_domain))
    }

    async fn lock_or_create_account(&mut self, user_id: Uuid) -> StoreResult<Account> {
        // A concurrent creator makes this insert wait, then do nothing;
        // the locking read below sees the committed row either way.
        let fresh = Account::open(user_id);
        sqlx::query(
            r#"
            INSERT INTO accounts (id, user_id, current_balance, last_balance, created_at, updated_at)
            VALUES ($1, $2, 0, 0, $3, $3)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(fresh.id)
        .bind(user_id)
        .bind(fresh.created_at)
        .execute(&mut *self.tx)
        .await?;

        self.lock_account(user_id)
            .await?
            .ok_or_else(|| StoreError::Corrupt(format!("account for user {} vanished", user_id)))
    }

    async fn save_account(&mut self, account: &Account) -> StoreResult<()> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE accounts
            SET
                current_balance = $2,
                last_balance = $3,
                updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(account.id)
        .bind(account.current_balance)
        .bind(account.last_balance)
        .bind(account.updated_at)
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(StoreError::Corrupt(format!(
                "account {} is not stored",
                account.id
            )));
        }

        Ok(())
    }

    async fn insert_transaction(&mut self, record: &TransactionRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO wallet_transactions (
                id, category, account_id, target_account_id,
                amount, remarks, status, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id)
        .bind(record.category.as_str())
        .bind(record.account_id)
        .bind(record.target_account_id)
        .bind(record.amount)
        .bind(&record.remarks)
        .bind(record.status.as_str())
        .bind(record.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn append_log(&mut self, entry: &LogEntry) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO account_transaction_logs (
                id, account_id, amount, transaction_type, transaction_category,
                transaction_reff, balance_before, balance_after, status,
                remarks, err_message, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(entry.id)
        .bind(entry.account_id)
        .bind(entry.amount)
        .bind(entry.transaction_type.as_str())
        .bind(entry.category.as_str())
        .bind(entry.transaction_ref)
        .bind(entry.balance_before)
        .bind(entry.balance_after)
        .bind(entry.status.as_str())
        .bind(&entry.remarks)
        .bind(&entry.err_message)
        .bind(entry.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

// =========================================================================
// Row types (not exposed outside the adapter)
// =========================================================================

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    uid: String,
    phone_number: String,
    first_name: String,
    last_name: String,
    address: String,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn into_domain(self) -> User {
        User {
            id: self.id,
            uid: self.uid,
            phone_number: self.phone_number,
            first_name: self.first_name,
            last_name: self.last_name,
            address: self.address,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    user_id: Uuid,
    current_balance: Decimal,
    last_balance: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AccountRow {
    fn into_domain(self) -> Account {
        Account {
            id: self.id,
            user_id: self.user_id,
            current_balance: self.current_balance,
            last_balance: self.last_balance,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LogViewRow {
    transaction_reff: Uuid,
    status: String,
    counterpart_uid: Option<String>,
    transaction_type: String,
    transaction_category: String,
    amount: Decimal,
    remarks: Option<String>,
    balance_before: Decimal,
    balance_after: Decimal,
    err_message: Option<String>,
    created_at: DateTime<Utc>,
}

impl LogViewRow {
    fn into_domain(self, uid: &str) -> StoreResult<LogView> {
        Ok(LogView {
            transaction_reff: self.transaction_reff,
            status: self.status.parse().map_err(StoreError::Corrupt)?,
            user_id: uid.to_string(),
            counterpart_user_id: self.counterpart_uid,
            transaction_type: self.transaction_type.parse().map_err(StoreError::Corrupt)?,
            transaction_category: self
                .transaction_category
                .parse()
                .map_err(StoreError::Corrupt)?,
            amount: self.amount,
            remarks: self.remarks,
            balance_before: self.balance_before,
            balance_after: self.balance_after,
            err_message: self.err_message,
            created_at: self.created_at,
        })
    }
}
