//! Credit (top-up) flow

use uuid::Uuid;

use crate::domain::{
    Amount, LedgerError, LogEntry, TransactionCategory, TransactionRecord, TransactionType,
};
use crate::store::UnitOfWork;

use super::{accounts, OperationReceipt, TopUpCommand};

/// Resolve (or lazily create) the account, credit it and log one CREDIT entry.
pub(super) async fn apply(
    uow: &mut dyn UnitOfWork,
    transaction_id: Uuid,
    command: &TopUpCommand,
    amount: &Amount,
) -> Result<OperationReceipt, LedgerError> {
    let user = uow
        .find_user_by_uid(&command.user_id)
        .await?
        .ok_or_else(|| LedgerError::NotFound(command.user_id.clone()))?;

    let mut account = accounts::get_or_create(uow, &user).await?;
    let record = TransactionRecord::pending(
        transaction_id,
        TransactionCategory::Topup,
        account.id,
        amount,
    );

    accounts::apply_delta(uow, &mut account, amount.signed(true)).await?;

    uow.append_log(&LogEntry::succeeded(
        &account,
        TransactionType::Credit,
        TransactionCategory::Topup,
        transaction_id,
        amount,
        None,
    ))
    .await?;

    let record = record.succeed();
    uow.insert_transaction(&record).await?;

    Ok(OperationReceipt {
        transaction_id,
        category: TransactionCategory::Topup,
        amount: amount.value(),
        remarks: None,
        balance_before: account.last_balance,
        balance_after: account.current_balance,
        created_at: record.created_at,
    })
}
