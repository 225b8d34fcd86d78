//! Account store operations used inside a unit of work.

use rust_decimal::Decimal;

use crate::domain::{Account, LedgerError, User};
use crate::store::{StoreResult, UnitOfWork};

/// Existing account of `user`, or a fresh zero-balance one. Locked either way.
pub(crate) async fn get_or_create(uow: &mut dyn UnitOfWork, user: &User) -> StoreResult<Account> {
    uow.lock_or_create_account(user.id).await
}

/// Existing account of `user`, locked. Debits never create accounts.
pub(crate) async fn require(uow: &mut dyn UnitOfWork, user: &User) -> Result<Account, LedgerError> {
    uow.lock_account(user.id)
        .await?
        .ok_or_else(|| LedgerError::NotFound(format!("account of user {}", user.uid)))
}

/// `last_balance = current_balance; current_balance += delta`, persisted.
pub(crate) async fn apply_delta(
    uow: &mut dyn UnitOfWork,
    account: &mut Account,
    delta: Decimal,
) -> StoreResult<()> {
    account.apply_delta(delta);
    uow.save_account(account).await
}
