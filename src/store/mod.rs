//! Ledger storage
//!
//! The engine talks to storage through two object-safe traits:
//! [`LedgerStore`] for the handle injected at construction time, and
//! [`UnitOfWork`] for one atomic, all-or-nothing sequence of reads and
//! writes. A unit of work that is dropped without `commit` rolls back.

mod memory;
mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Account, LogEntry, LogView, TransactionRecord, User};

pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;

/// Storage-level errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Uniqueness constraint violated
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// Row could not be mapped back to a domain value
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// Failure injected by the memory backend in tests
    #[error("Injected failure: {0}")]
    Injected(&'static str),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Handle to a storage backend.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Open a new unit of work.
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>>;

    /// Look up a user by public id, outside any unit of work.
    async fn find_user(&self, uid: &str) -> StoreResult<Option<User>>;

    /// Current account state for a user, if one was ever created.
    async fn find_account(&self, user_id: Uuid) -> StoreResult<Option<Account>>;

    /// Log entries of the user's account, most recent first.
    async fn list_logs(&self, user: &User) -> StoreResult<Vec<LogView>>;

    /// Connectivity check.
    async fn ping(&self) -> StoreResult<()>;
}

/// One atomic unit of work.
///
/// Account reads through `lock_account` / `lock_or_create_account` hold a
/// row lock until the unit of work commits or rolls back, so at most one
/// balance mutation per account is in flight.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn find_user_by_uid(&mut self, uid: &str) -> StoreResult<Option<User>>;

    async fn find_user_by_phone(&mut self, phone_number: &str) -> StoreResult<Option<User>>;

    /// Fails with `StoreError::Duplicate` on a taken uid or phone number.
    async fn insert_user(&mut self, user: &User) -> StoreResult<()>;

    /// Whether the user has an account. Takes no lock.
    async fn has_account(&mut self, user_id: Uuid) -> StoreResult<bool>;

    /// Lock and return the user's account, if any.
    async fn lock_account(&mut self, user_id: Uuid) -> StoreResult<Option<Account>>;

    /// Lock and return the user's account, creating it with zero balances
    /// when absent. Concurrent callers end up with the same single row.
    async fn lock_or_create_account(&mut self, user_id: Uuid) -> StoreResult<Account>;

    async fn save_account(&mut self, account: &Account) -> StoreResult<()>;

    async fn insert_transaction(&mut self, record: &TransactionRecord) -> StoreResult<()>;

    async fn append_log(&mut self, entry: &LogEntry) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}
