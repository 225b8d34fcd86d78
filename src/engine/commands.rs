//! Command definitions
//!
//! Commands represent intentions to change balances. They carry raw input;
//! validation happens in the engine before any unit of work starts.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Amount, LedgerError, TransactionCategory};

// =========================================================================
// TopUpCommand
// =========================================================================

/// Credit the caller's account from an external funding source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopUpCommand {
    pub user_id: String,
    pub amount: Decimal,
}

impl TopUpCommand {
    pub fn new(user_id: impl Into<String>, amount: Decimal) -> Self {
        Self {
            user_id: user_id.into(),
            amount,
        }
    }
}

// =========================================================================
// PaymentCommand
// =========================================================================

/// Debit the caller's account for a purchase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCommand {
    pub user_id: String,
    pub amount: Decimal,
    pub remarks: String,
}

impl PaymentCommand {
    pub fn new(user_id: impl Into<String>, amount: Decimal, remarks: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            amount,
            remarks: remarks.into(),
        }
    }
}

// =========================================================================
// TransferCommand
// =========================================================================

/// Move funds from the caller to another user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferCommand {
    pub source_user_id: String,
    /// Public id of the recipient
    pub target_user_id: String,
    pub amount: Decimal,
    pub remarks: String,
}

impl TransferCommand {
    pub fn new(
        source_user_id: impl Into<String>,
        target_user_id: impl Into<String>,
        amount: Decimal,
        remarks: impl Into<String>,
    ) -> Self {
        Self {
            source_user_id: source_user_id.into(),
            target_user_id: target_user_id.into(),
            amount,
            remarks: remarks.into(),
        }
    }
}

// =========================================================================
// Operation
// =========================================================================

/// A balance-mutating operation, dispatched by the engine executor
#[derive(Debug, Clone)]
pub enum Operation {
    TopUp(TopUpCommand),
    Payment(PaymentCommand),
    Transfer(TransferCommand),
}

impl Operation {
    pub fn category(&self) -> TransactionCategory {
        match self {
            Operation::TopUp(_) => TransactionCategory::Topup,
            Operation::Payment(_) => TransactionCategory::Payment,
            Operation::Transfer(_) => TransactionCategory::Transfer,
        }
    }

    /// Public id of the acting user
    pub fn user_id(&self) -> &str {
        match self {
            Operation::TopUp(cmd) => &cmd.user_id,
            Operation::Payment(cmd) => &cmd.user_id,
            Operation::Transfer(cmd) => &cmd.source_user_id,
        }
    }

    pub fn remarks(&self) -> Option<String> {
        let remarks = match self {
            Operation::TopUp(_) => return None,
            Operation::Payment(cmd) => &cmd.remarks,
            Operation::Transfer(cmd) => &cmd.remarks,
        };
        let trimmed = remarks.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    fn raw_amount(&self) -> Decimal {
        match self {
            Operation::TopUp(cmd) => cmd.amount,
            Operation::Payment(cmd) => cmd.amount,
            Operation::Transfer(cmd) => cmd.amount,
        }
    }

    /// Input checks that need no storage access.
    pub fn validate(&self) -> Result<Amount, LedgerError> {
        if self.user_id().trim().is_empty() {
            return Err(LedgerError::Validation("user id is required".to_string()));
        }

        if let Operation::Transfer(cmd) = self {
            if cmd.target_user_id.trim().is_empty() {
                return Err(LedgerError::Validation("target_user is required".to_string()));
            }
            if cmd.target_user_id == cmd.source_user_id {
                return Err(LedgerError::Validation(
                    "Cannot transfer to yourself".to_string(),
                ));
            }
        }

        Ok(Amount::new(self.raw_amount())?)
    }
}

// =========================================================================
// Results
// =========================================================================

/// Outcome of a committed operation, from the acting user's side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationReceipt {
    pub transaction_id: Uuid,
    pub category: TransactionCategory,
    pub amount: Decimal,
    pub remarks: Option<String>,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Current balance of a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceView {
    pub user_id: String,
    pub current_balance: Decimal,
    pub last_balance: Decimal,
}

/// Command to register a new user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUserCommand {
    pub phone_number: String,
    pub first_name: String,
    pub last_name: String,
    pub address: String,
}

impl RegisterUserCommand {
    pub fn validate(&self) -> Result<(), LedgerError> {
        let fields = [
            ("phone_number", &self.phone_number),
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("address", &self.address),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(LedgerError::Validation(format!("{} is required", name)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_positive_amount_is_validation_error() {
        let op = Operation::TopUp(TopUpCommand::new("user-a", Decimal::ZERO));
        assert!(matches!(op.validate(), Err(LedgerError::Validation(_))));

        let op = Operation::Payment(PaymentCommand::new("user-a", Decimal::new(-5, 0), "x"));
        assert!(matches!(op.validate(), Err(LedgerError::Validation(_))));
    }

    #[test]
    fn test_transfer_to_self_rejected() {
        let op = Operation::Transfer(TransferCommand::new(
            "user-a",
            "user-a",
            Decimal::new(10, 0),
            "",
        ));
        assert!(matches!(op.validate(), Err(LedgerError::Validation(_))));
    }

    #[test]
    fn test_transfer_requires_target() {
        let op = Operation::Transfer(TransferCommand::new("user-a", " ", Decimal::new(10, 0), ""));
        assert!(matches!(op.validate(), Err(LedgerError::Validation(_))));
    }

    #[test]
    fn test_validate_returns_amount() {
        let op = Operation::Payment(PaymentCommand::new("user-a", Decimal::new(4000, 0), "coffee"));
        assert_eq!(op.validate().unwrap().value(), Decimal::new(4000, 0));
        assert_eq!(op.category(), TransactionCategory::Payment);
        assert_eq!(op.remarks().as_deref(), Some("coffee"));
    }

    #[test]
    fn test_blank_remarks_dropped() {
        let op = Operation::Transfer(TransferCommand::new("a", "b", Decimal::ONE, "   "));
        assert!(op.remarks().is_none());
        let op = Operation::TopUp(TopUpCommand::new("a", Decimal::ONE));
        assert!(op.remarks().is_none());
    }

    #[test]
    fn test_register_command_validation() {
        let cmd = RegisterUserCommand {
            phone_number: "0811".to_string(),
            first_name: "Guntur".to_string(),
            last_name: "Saputro".to_string(),
            address: "".to_string(),
        };
        let err = cmd.validate().unwrap_err();
        assert!(err.to_string().contains("address"));
    }
}
