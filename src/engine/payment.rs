//! Debit (payment) flow

use uuid::Uuid;

use crate::domain::{
    Amount, LedgerError, LogEntry, TransactionCategory, TransactionRecord, TransactionType,
};
use crate::store::UnitOfWork;

use super::{accounts, OperationReceipt, PaymentCommand};

/// Debit an existing account and log one DEBIT entry.
///
/// An insufficient balance aborts before anything is written, so the
/// rolled-back unit of work leaves no log entry behind.
pub(super) async fn apply(
    uow: &mut dyn UnitOfWork,
    transaction_id: Uuid,
    command: &PaymentCommand,
    amount: &Amount,
    remarks: Option<String>,
) -> Result<OperationReceipt, LedgerError> {
    let user = uow
        .find_user_by_uid(&command.user_id)
        .await?
        .ok_or_else(|| LedgerError::NotFound(command.user_id.clone()))?;

    let mut account = accounts::require(uow, &user).await?;

    if !account.is_sufficient_for(amount) {
        return Err(LedgerError::insufficient_balance(
            account.id,
            amount.value(),
            account.current_balance,
        ));
    }

    let record = TransactionRecord::pending(
        transaction_id,
        TransactionCategory::Payment,
        account.id,
        amount,
    )
    .with_remarks(remarks.clone());

    accounts::apply_delta(uow, &mut account, amount.signed(false)).await?;

    uow.append_log(&LogEntry::succeeded(
        &account,
        TransactionType::Debit,
        TransactionCategory::Payment,
        transaction_id,
        amount,
        remarks.clone(),
    ))
    .await?;

    let record = record.succeed();
    uow.insert_transaction(&record).await?;

    Ok(OperationReceipt {
        transaction_id,
        category: TransactionCategory::Payment,
        amount: amount.value(),
        remarks,
        balance_before: account.last_balance,
        balance_after: account.current_balance,
        created_at: record.created_at,
    })
}
