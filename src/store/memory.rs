//! In-process storage backend.
//!
//! A unit of work takes an exclusive lock over the whole state and works on
//! a private copy. `commit` swaps the copy in; dropping the unit of work
//! (explicit rollback, `?` early return, panic) discards it.

use std::collections::HashMap;
#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::domain::{Account, LogEntry, LogView, TransactionRecord, User};

use super::{LedgerStore, StoreError, StoreResult, UnitOfWork};

#[derive(Debug, Clone, Default)]
struct LedgerState {
    users: Vec<User>,
    /// Keyed by owning user id; one account per user
    accounts: HashMap<Uuid, Account>,
    transactions: Vec<TransactionRecord>,
    /// Append order is creation order
    logs: Vec<LogEntry>,
}

impl LedgerState {
    fn user_of_account(&self, account_id: Uuid) -> Option<&User> {
        let account = self.accounts.values().find(|a| a.id == account_id)?;
        self.users.iter().find(|u| u.id == account.user_id)
    }

    fn counterpart_uid(&self, entry: &LogEntry) -> Option<String> {
        let record = self
            .transactions
            .iter()
            .find(|t| t.id == entry.transaction_ref)?;
        let other = if record.account_id == entry.account_id {
            record.target_account_id?
        } else {
            record.account_id
        };
        self.user_of_account(other).map(|u| u.uid.clone())
    }
}

/// Memory-backed ledger store
#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerStore {
    state: Arc<Mutex<LedgerState>>,
    /// Countdown to an injected `append_log` failure; 0 is off
    #[cfg(test)]
    fail_append_at: Arc<AtomicUsize>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `append_log` inside a unit of work fail.
    #[cfg(test)]
    pub(crate) fn fail_next_append(&self) {
        self.fail_nth_append(1);
    }

    /// Make the `n`th `append_log` from now fail (1 is the next one).
    #[cfg(test)]
    pub(crate) fn fail_nth_append(&self, n: usize) {
        self.fail_append_at.store(n, Ordering::SeqCst);
    }

    /// Number of committed accounts owned by `user_id`.
    pub async fn account_count(&self, user_id: Uuid) -> usize {
        let state = self.state.lock().await;
        state.accounts.values().filter(|a| a.user_id == user_id).count()
    }

    /// Committed transaction record by id.
    pub async fn transaction(&self, id: Uuid) -> Option<TransactionRecord> {
        let state = self.state.lock().await;
        state.transactions.iter().find(|t| t.id == id).cloned()
    }

    /// All committed log entries for an account, in creation order.
    pub async fn log_entries(&self, account_id: Uuid) -> Vec<LogEntry> {
        let state = self.state.lock().await;
        state
            .logs
            .iter()
            .filter(|l| l.account_id == account_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryUnitOfWork {
            guard,
            working,
            #[cfg(test)]
            fail_append_at: self.fail_append_at.clone(),
        }))
    }

    async fn find_user(&self, uid: &str) -> StoreResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|u| u.uid == uid).cloned())
    }

    async fn find_account(&self, user_id: Uuid) -> StoreResult<Option<Account>> {
        let state = self.state.lock().await;
        Ok(state.accounts.get(&user_id).cloned())
    }

    async fn list_logs(&self, user: &User) -> StoreResult<Vec<LogView>> {
        let state = self.state.lock().await;
        let Some(account) = state.accounts.get(&user.id) else {
            return Ok(Vec::new());
        };

        Ok(state
            .logs
            .iter()
            .rev()
            .filter(|l| l.account_id == account.id)
            .map(|l| LogView {
                transaction_reff: l.transaction_ref,
                status: l.status,
                user_id: user.uid.clone(),
                counterpart_user_id: state.counterpart_uid(l),
                transaction_type: l.transaction_type,
                transaction_category: l.category,
                amount: l.amount,
                remarks: l.remarks.clone(),
                balance_before: l.balance_before,
                balance_after: l.balance_after,
                err_message: l.err_message.clone(),
                created_at: l.created_at,
            })
            .collect())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Unit of work over the memory store
struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<LedgerState>,
    working: LedgerState,
    #[cfg(test)]
    fail_append_at: Arc<AtomicUsize>,
}

impl MemoryUnitOfWork {
    /// Count down the injected failure; true when this append must fail.
    #[cfg(test)]
    fn injected_append_failure(&self) -> bool {
        self.fail_append_at
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .map(|previous| previous == 1)
            .unwrap_or(false)
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn find_user_by_uid(&mut self, uid: &str) -> StoreResult<Option<User>> {
        Ok(self.working.users.iter().find(|u| u.uid == uid).cloned())
    }

    async fn find_user_by_phone(&mut self, phone_number: &str) -> StoreResult<Option<User>> {
        Ok(self
            .working
            .users
            .iter()
            .find(|u| u.phone_number == phone_number)
            .cloned())
    }

    async fn insert_user(&mut self, user: &User) -> StoreResult<()> {
        if self.working.users.iter().any(|u| u.uid == user.uid) {
            return Err(StoreError::Duplicate("uid".to_string()));
        }
        if self
            .working
            .users
            .iter()
            .any(|u| u.phone_number == user.phone_number)
        {
            return Err(StoreError::Duplicate("phone_number".to_string()));
        }
        self.working.users.push(user.clone());
        Ok(())
    }

    async fn has_account(&mut self, user_id: Uuid) -> StoreResult<bool> {
        Ok(self.working.accounts.contains_key(&user_id))
    }

    async fn lock_account(&mut self, user_id: Uuid) -> StoreResult<Option<Account>> {
        Ok(self.working.accounts.get(&user_id).cloned())
    }

    async fn lock_or_create_account(&mut self, user_id: Uuid) -> StoreResult<Account> {
        Ok(self
            .working
            .accounts
            .entry(user_id)
            .or_insert_with(|| Account::open(user_id))
            .clone())
    }

    async fn save_account(&mut self, account: &Account) -> StoreResult<()> {
        match self.working.accounts.get_mut(&account.user_id) {
            Some(existing) if existing.id == account.id => {
                *existing = account.clone();
                Ok(())
            }
            _ => Err(StoreError::Corrupt(format!(
                "account {} is not stored",
                account.id
            ))),
        }
    }

    async fn insert_transaction(&mut self, record: &TransactionRecord) -> StoreResult<()> {
        if self.working.transactions.iter().any(|t| t.id == record.id) {
            return Err(StoreError::Duplicate("transaction id".to_string()));
        }
        self.working.transactions.push(record.clone());
        Ok(())
    }

    async fn append_log(&mut self, entry: &LogEntry) -> StoreResult<()> {
        #[cfg(test)]
        if self.injected_append_failure() {
            return Err(StoreError::Injected("append_log"));
        }
        self.working.logs.push(entry.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryUnitOfWork {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        // Dropping the working copy releases the lock with state untouched
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(uid: &str, phone: &str) -> User {
        User {
            id: Uuid::new_v4(),
            uid: uid.to_string(),
            phone_number: phone.to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            address: "Somewhere".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_commit_publishes_changes() {
        let store = MemoryLedgerStore::new();
        let alice = user("alice", "0811");

        let mut uow = store.begin().await.unwrap();
        uow.insert_user(&alice).await.unwrap();
        uow.commit().await.unwrap();

        assert_eq!(store.find_user("alice").await.unwrap(), Some(alice));
    }

    #[tokio::test]
    async fn test_rollback_and_drop_discard_changes() {
        let store = MemoryLedgerStore::new();

        let mut uow = store.begin().await.unwrap();
        uow.insert_user(&user("alice", "0811")).await.unwrap();
        uow.rollback().await.unwrap();
        assert!(store.find_user("alice").await.unwrap().is_none());

        {
            let mut uow = store.begin().await.unwrap();
            uow.insert_user(&user("bob", "0812")).await.unwrap();
        }
        assert!(store.find_user("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_phone_rejected() {
        let store = MemoryLedgerStore::new();
        let mut uow = store.begin().await.unwrap();
        uow.insert_user(&user("alice", "0811")).await.unwrap();

        let err = uow.insert_user(&user("bob", "0811")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_lock_or_create_is_idempotent() {
        let store = MemoryLedgerStore::new();
        let owner = Uuid::new_v4();

        let mut uow = store.begin().await.unwrap();
        let first = uow.lock_or_create_account(owner).await.unwrap();
        let second = uow.lock_or_create_account(owner).await.unwrap();
        uow.commit().await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.account_count(owner).await, 1);
    }

    #[tokio::test]
    async fn test_injected_append_failure_fires_once() {
        let store = MemoryLedgerStore::new();
        store.fail_next_append();

        let mut uow = store.begin().await.unwrap();
        let account = uow.lock_or_create_account(Uuid::new_v4()).await.unwrap();
        let entry = LogEntry::failed(
            account.id,
            account.current_balance,
            crate::domain::TransactionCategory::Transfer,
            Uuid::new_v4(),
            &crate::domain::Amount::from_integer(1).unwrap(),
            None,
            "test",
        );

        assert!(matches!(
            uow.append_log(&entry).await,
            Err(StoreError::Injected(_))
        ));
        assert!(uow.append_log(&entry).await.is_ok());
    }

    #[tokio::test]
    async fn test_injected_failure_on_nth_append() {
        let store = MemoryLedgerStore::new();
        store.fail_nth_append(2);

        let mut uow = store.begin().await.unwrap();
        let account = uow.lock_or_create_account(Uuid::new_v4()).await.unwrap();
        let entry = LogEntry::failed(
            account.id,
            account.current_balance,
            crate::domain::TransactionCategory::Transfer,
            Uuid::new_v4(),
            &crate::domain::Amount::from_integer(1).unwrap(),
            None,
            "test",
        );

        assert!(uow.append_log(&entry).await.is_ok());
        assert!(matches!(
            uow.append_log(&entry).await,
            Err(StoreError::Injected(_))
        ));
        assert!(uow.append_log(&entry).await.is_ok());
    }
}
