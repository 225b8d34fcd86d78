//! Operation engine
//!
//! Runs top-up, payment and transfer as single units of work. The storage
//! handle is injected at construction; every operation goes through the
//! same executor, which owns begin / commit / rollback.

mod accounts;
mod commands;
mod payment;
mod top_up;
mod transfer;


use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::{
    Amount, LedgerError, LogEntry, LogView, OperationContext, TransactionCategory, User,
};
use crate::store::{LedgerStore, StoreError};

pub use commands::*;

/// Audit message on a rejected transfer
pub const INSUFFICIENT_BALANCE_MESSAGE: &str = "Balance is not enough";

/// Wallet ledger operation engine
#[derive(Clone)]
pub struct LedgerEngine {
    store: Arc<dyn LedgerStore>,
}

impl LedgerEngine {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub async fn top_up(
        &self,
        command: TopUpCommand,
        context: &OperationContext,
    ) -> Result<OperationReceipt, LedgerError> {
        self.execute(Operation::TopUp(command), context).await
    }

    pub async fn pay(
        &self,
        command: PaymentCommand,
        context: &OperationContext,
    ) -> Result<OperationReceipt, LedgerError> {
        self.execute(Operation::Payment(command), context).await
    }

    pub async fn transfer(
        &self,
        command: TransferCommand,
        context: &OperationContext,
    ) -> Result<OperationReceipt, LedgerError> {
        self.execute(Operation::Transfer(command), context).await
    }

    // =========================================================================
    // Executor
    // =========================================================================

    /// Validate, then run the operation inside one unit of work.
    pub async fn execute(
        &self,
        operation: Operation,
        context: &OperationContext,
    ) -> Result<OperationReceipt, LedgerError> {
        let amount = operation.validate()?;
        let remarks = operation.remarks();
        let transaction_id = Uuid::new_v4();

        let mut uow = self.store.begin().await.map_err(|e| self.persistence(e))?;

        let outcome = match &operation {
            Operation::TopUp(cmd) => top_up::apply(uow.as_mut(), transaction_id, cmd, &amount).await,
            Operation::Payment(cmd) => {
                payment::apply(uow.as_mut(), transaction_id, cmd, &amount, remarks.clone()).await
            }
            Operation::Transfer(cmd) => {
                transfer::apply(uow.as_mut(), transaction_id, cmd, &amount, remarks.clone()).await
            }
        };

        match outcome {
            Ok(receipt) => {
                uow.commit().await.map_err(|e| self.persistence(e))?;
                tracing::info!(
                    category = %receipt.category,
                    transaction_id = %receipt.transaction_id,
                    user_id = operation.user_id(),
                    amount = %receipt.amount,
                    balance_before = %receipt.balance_before,
                    balance_after = %receipt.balance_after,
                    correlation_id = ?context.correlation_id,
                    "Operation committed"
                );
                Ok(receipt)
            }
            Err(err) => {
                if let Err(rollback_err) = uow.rollback().await {
                    tracing::warn!("Rollback of {} failed: {}", transaction_id, rollback_err);
                }

                if let (Operation::Transfer(_), LedgerError::InsufficientBalance { account_id, available, .. }) =
                    (&operation, &err)
                {
                    self.record_rejected_transfer(
                        *account_id,
                        *available,
                        transaction_id,
                        &amount,
                        remarks,
                    )
                    .await;
                }

                if err.is_client_error() {
                    tracing::warn!(
                        category = %operation.category(),
                        transaction_id = %transaction_id,
                        user_id = operation.user_id(),
                        correlation_id = ?context.correlation_id,
                        "Operation rejected: {}",
                        err
                    );
                } else {
                    tracing::error!(
                        category = %operation.category(),
                        transaction_id = %transaction_id,
                        correlation_id = ?context.correlation_id,
                        "Unit of work aborted: {:?}",
                        err
                    );
                }
                Err(err)
            }
        }
    }

    /// FAILED audit entry for a transfer rejected on balance. Written in its
    /// own unit of work after the operation's unit of work rolled back.
    async fn record_rejected_transfer(
        &self,
        account_id: Uuid,
        balance: rust_decimal::Decimal,
        transaction_id: Uuid,
        amount: &Amount,
        remarks: Option<String>,
    ) {
        let entry = LogEntry::failed(
            account_id,
            balance,
            TransactionCategory::Transfer,
            transaction_id,
            amount,
            remarks,
            INSUFFICIENT_BALANCE_MESSAGE,
        );

        let result: Result<(), StoreError> = async {
            let mut uow = self.store.begin().await?;
            uow.append_log(&entry).await?;
            uow.commit().await
        }
        .await;

        if let Err(e) = result {
            tracing::error!(
                transaction_id = %transaction_id,
                "Failed to record rejected transfer: {}",
                e
            );
        }
    }

    /// Logs the raw storage error; callers only ever see a generic failure.
    fn persistence(&self, err: StoreError) -> LedgerError {
        tracing::error!("Unit of work aborted: {:?}", err);
        LedgerError::Persistence(err)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Transaction log of a user, most recent first.
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<LogView>, LedgerError> {
        let user = self.resolve_user(user_id).await?;
        self.store
            .list_logs(&user)
            .await
            .map_err(|e| self.persistence(e))
    }

    /// Balance of a user; zero when no account was created yet.
    pub async fn balance(&self, user_id: &str) -> Result<BalanceView, LedgerError> {
        let user = self.resolve_user(user_id).await?;
        let account = self
            .store
            .find_account(user.id)
            .await
            .map_err(|e| self.persistence(e))?;

        Ok(match account {
            Some(account) => BalanceView {
                user_id: user.uid,
                current_balance: account.current_balance,
                last_balance: account.last_balance,
            },
            None => BalanceView {
                user_id: user.uid,
                current_balance: rust_decimal::Decimal::ZERO,
                last_balance: rust_decimal::Decimal::ZERO,
            },
        })
    }

    async fn resolve_user(&self, user_id: &str) -> Result<User, LedgerError> {
        self.store
            .find_user(user_id)
            .await
            .map_err(|e| self.persistence(e))?
            .ok_or_else(|| LedgerError::NotFound(user_id.to_string()))
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register a user. The account is created lazily by the first credit.
    pub async fn register(&self, command: RegisterUserCommand) -> Result<User, LedgerError> {
        command.validate()?;

        let user = User {
            id: Uuid::new_v4(),
            uid: Uuid::new_v4().to_string(),
            phone_number: command.phone_number.trim().to_string(),
            first_name: command.first_name.trim().to_string(),
            last_name: command.last_name.trim().to_string(),
            address: command.address.trim().to_string(),
            created_at: Utc::now(),
        };

        let mut uow = self.store.begin().await.map_err(|e| self.persistence(e))?;

        if uow
            .find_user_by_phone(&user.phone_number)
            .await
            .map_err(|e| self.persistence(e))?
            .is_some()
        {
            return Err(LedgerError::Conflict("Phone number already registered".to_string()));
        }

        match uow.insert_user(&user).await {
            Ok(()) => {}
            Err(StoreError::Duplicate(_)) => {
                return Err(LedgerError::Conflict("Phone number already registered".to_string()));
            }
            Err(e) => return Err(self.persistence(e)),
        }

        uow.commit().await.map_err(|e| self.persistence(e))?;

        tracing::info!(user_id = %user.uid, "User registered");
        Ok(user)
    }
}
