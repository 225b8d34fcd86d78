//! Domain Error Types
//!
//! Failure kinds surfaced by the operation engine. Each variant is distinct
//! so the HTTP boundary can map it to its own status code.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;

/// Errors produced by ledger operations
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Acting user (or their account) does not exist
    #[error("User not found: {0}")]
    NotFound(String),

    /// Transfer counterparty does not exist
    #[error("Target user not found: {0}")]
    TargetNotFound(String),

    /// Debit exceeds the current balance
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        account_id: Uuid,
        required: Decimal,
        available: Decimal,
    },

    /// Malformed or missing input, detected before any mutation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Uniqueness violation on registration
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Storage failed mid unit of work; everything was rolled back
    #[error("Persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

impl LedgerError {
    /// Create an insufficient balance error
    pub fn insufficient_balance(account_id: Uuid, required: Decimal, available: Decimal) -> Self {
        Self::InsufficientBalance {
            account_id,
            required,
            available,
        }
    }

    /// Check if this is a client error (caller's fault)
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Persistence(_))
    }
}

impl From<crate::domain::AmountError> for LedgerError {
    fn from(err: crate::domain::AmountError) -> Self {
        Self::Validation(err.to_string())
    }
}
