//! wallet_ledger Library
//!
//! Re-exports modules for the server binary, the load test and integration
//! testing.

pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod store;
mod error;

pub use config::{Config, LogFormat, StorageBackend};
pub use domain::{Amount, AmountError, LedgerError, OperationContext};
pub use engine::LedgerEngine;
pub use error::{AppError, ErrorResponse};
pub use store::{LedgerStore, MemoryLedgerStore, PgLedgerStore, StoreError};
