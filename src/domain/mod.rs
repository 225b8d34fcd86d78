//! Domain module
//!
//! Core domain types and business rules.

pub mod amount;
pub mod context;
pub mod error;
pub mod records;

pub use amount::{Amount, AmountError};
pub use context::OperationContext;
pub use error::LedgerError;
pub use records::{
    Account, LogEntry, LogView, TransactionCategory, TransactionRecord, TransactionStatus,
    TransactionType, User,
};
