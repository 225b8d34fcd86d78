//! Transfer flow: paired debit and credit in one unit of work.

use uuid::Uuid;

use crate::domain::{
    Account, Amount, LedgerError, LogEntry, TransactionCategory, TransactionRecord,
    TransactionType, User,
};
use crate::store::UnitOfWork;

use super::{accounts, OperationReceipt, TransferCommand};

/// Debit the source, then credit the target (created if absent).
///
/// Both log entries share `transaction_id`; the DEBIT entry is always
/// written first.
pub(super) async fn apply(
    uow: &mut dyn UnitOfWork,
    transaction_id: Uuid,
    command: &TransferCommand,
    amount: &Amount,
    remarks: Option<String>,
) -> Result<OperationReceipt, LedgerError> {
    let source_user = uow
        .find_user_by_uid(&command.source_user_id)
        .await?
        .ok_or_else(|| LedgerError::NotFound(command.source_user_id.clone()))?;

    // The source account must exist before the target is looked at. Locks are
    // taken later, in user-id order.
    if !uow.has_account(source_user.id).await? {
        return Err(LedgerError::NotFound(format!(
            "account of user {}",
            source_user.uid
        )));
    }

    let target_user = uow
        .find_user_by_uid(&command.target_user_id)
        .await?
        .ok_or_else(|| LedgerError::TargetNotFound(command.target_user_id.clone()))?;

    let (mut source, mut target) = lock_pair(uow, &source_user, &target_user).await?;

    if !source.is_sufficient_for(amount) {
        return Err(LedgerError::insufficient_balance(
            source.id,
            amount.value(),
            source.current_balance,
        ));
    }

    let record = TransactionRecord::pending(
        transaction_id,
        TransactionCategory::Transfer,
        source.id,
        amount,
    )
    .with_target(target.id)
    .with_remarks(remarks.clone());

    accounts::apply_delta(uow, &mut source, amount.signed(false)).await?;
    uow.append_log(&LogEntry::succeeded(
        &source,
        TransactionType::Debit,
        TransactionCategory::Transfer,
        transaction_id,
        amount,
        remarks.clone(),
    ))
    .await?;

    accounts::apply_delta(uow, &mut target, amount.signed(true)).await?;
    uow.append_log(&LogEntry::succeeded(
        &target,
        TransactionType::Credit,
        TransactionCategory::Transfer,
        transaction_id,
        amount,
        remarks.clone(),
    ))
    .await?;

    let record = record.succeed();
    uow.insert_transaction(&record).await?;

    Ok(OperationReceipt {
        transaction_id,
        category: TransactionCategory::Transfer,
        amount: amount.value(),
        remarks,
        balance_before: source.last_balance,
        balance_after: source.current_balance,
        created_at: record.created_at,
    })
}

/// Lock source and target accounts in ascending user-id order so two
/// opposite transfers cannot deadlock on each other's rows.
async fn lock_pair(
    uow: &mut dyn UnitOfWork,
    source_user: &User,
    target_user: &User,
) -> Result<(Account, Account), LedgerError> {
    if source_user.id < target_user.id {
        let source = accounts::require(uow, source_user).await?;
        let target = accounts::get_or_create(uow, target_user).await?;
        Ok((source, target))
    } else {
        let target = accounts::get_or_create(uow, target_user).await?;
        let source = accounts::require(uow, source_user).await?;
        Ok((source, target))
    }
}
