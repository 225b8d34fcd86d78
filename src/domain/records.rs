//! Ledger records
//!
//! Accounts, transaction records and the append-only transaction log.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::Amount;

// =========================================================================
// Enumerations
// =========================================================================

/// Direction of a balance change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Debit,
    Credit,
}

/// Business category of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionCategory {
    Topup,
    Payment,
    Transfer,
}

/// Lifecycle status of a transaction record or log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Succeeded,
    Failed,
}

macro_rules! text_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($ty::$variant),)+
                    other => Err(format!("unknown {} '{}'", stringify!($ty), other)),
                }
            }
        }
    };
}

text_enum!(TransactionType { Debit => "DEBIT", Credit => "CREDIT" });
text_enum!(TransactionCategory { Topup => "TOPUP", Payment => "PAYMENT", Transfer => "TRANSFER" });
text_enum!(TransactionStatus { Pending => "PENDING", Succeeded => "SUCCEEDED", Failed => "FAILED" });

// =========================================================================
// User
// =========================================================================

/// A registered user. `uid` is the public identifier carried by requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub uid: String,
    pub phone_number: String,
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
}

// =========================================================================
// Account
// =========================================================================

/// Wallet account holding a running balance.
///
/// `last_balance` caches the balance immediately before the latest
/// mutation; the transaction log is the authoritative history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub user_id: Uuid,
    pub current_balance: Decimal,
    pub last_balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// New account with zero balances
    pub fn open(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            current_balance: Decimal::ZERO,
            last_balance: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_sufficient_for(&self, amount: &Amount) -> bool {
        self.current_balance >= amount.value()
    }

    /// Shift the current balance into `last_balance` and add `delta`.
    ///
    /// Callers validate sufficiency before passing a negative delta.
    pub fn apply_delta(&mut self, delta: Decimal) {
        self.last_balance = self.current_balance;
        self.current_balance += delta;
        self.updated_at = Utc::now();
    }
}

// =========================================================================
// TransactionRecord
// =========================================================================

/// One top-up, payment or transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub category: TransactionCategory,
    pub account_id: Uuid,
    /// Counterparty account, transfers only
    pub target_account_id: Option<Uuid>,
    pub amount: Decimal,
    pub remarks: Option<String>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    pub fn pending(
        id: Uuid,
        category: TransactionCategory,
        account_id: Uuid,
        amount: &Amount,
    ) -> Self {
        Self {
            id,
            category,
            account_id,
            target_account_id: None,
            amount: amount.value(),
            remarks: None,
            status: TransactionStatus::Pending,
            created_at: Utc::now(),
        }
    }

    pub fn with_target(mut self, target_account_id: Uuid) -> Self {
        self.target_account_id = Some(target_account_id);
        self
    }

    pub fn with_remarks(mut self, remarks: Option<String>) -> Self {
        self.remarks = remarks;
        self
    }

    /// PENDING -> SUCCEEDED. Any other starting status is left untouched.
    pub fn succeed(mut self) -> Self {
        if self.status == TransactionStatus::Pending {
            self.status = TransactionStatus::Succeeded;
        }
        self
    }
}

// =========================================================================
// LogEntry
// =========================================================================

/// Immutable audit record of one balance-affecting side of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Uuid,
    pub account_id: Uuid,
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub category: TransactionCategory,
    pub transaction_ref: Uuid,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub status: TransactionStatus,
    pub remarks: Option<String>,
    pub err_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LogEntry {
    /// Entry for a mutation that was just applied to `account`.
    pub fn succeeded(
        account: &Account,
        transaction_type: TransactionType,
        category: TransactionCategory,
        transaction_ref: Uuid,
        amount: &Amount,
        remarks: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id: account.id,
            amount: amount.value(),
            transaction_type,
            category,
            transaction_ref,
            balance_before: account.last_balance,
            balance_after: account.current_balance,
            status: TransactionStatus::Succeeded,
            remarks,
            err_message: None,
            created_at: Utc::now(),
        }
    }

    /// Entry for a rejected debit; the balance did not move.
    pub fn failed(
        account_id: Uuid,
        balance: Decimal,
        category: TransactionCategory,
        transaction_ref: Uuid,
        amount: &Amount,
        remarks: Option<String>,
        err_message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            amount: amount.value(),
            transaction_type: TransactionType::Debit,
            category,
            transaction_ref,
            balance_before: balance,
            balance_after: balance,
            status: TransactionStatus::Failed,
            remarks,
            err_message: Some(err_message.into()),
            created_at: Utc::now(),
        }
    }

    /// Signed amount: credits positive, debits negative, failures zero.
    pub fn signed_amount(&self) -> Decimal {
        signed_amount(self.status, self.transaction_type, self.amount)
    }

    /// A succeeded entry moves the balance by exactly `amount` in its direction.
    pub fn is_consistent(&self) -> bool {
        match self.status {
            TransactionStatus::Succeeded => {
                self.balance_after == self.balance_before + self.signed_amount()
            }
            _ => self.balance_after == self.balance_before,
        }
    }
}

/// Balance effect of a log entry. Only SUCCEEDED entries move a balance.
fn signed_amount(status: TransactionStatus, kind: TransactionType, amount: Decimal) -> Decimal {
    match (status, kind) {
        (TransactionStatus::Succeeded, TransactionType::Credit) => amount,
        (TransactionStatus::Succeeded, TransactionType::Debit) => -amount,
        _ => Decimal::ZERO,
    }
}

/// Log entry as returned by the listing query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogView {
    pub transaction_reff: Uuid,
    pub status: TransactionStatus,
    pub user_id: String,
    /// Other side of a transfer, when known
    pub counterpart_user_id: Option<String>,
    pub transaction_type: TransactionType,
    pub transaction_category: TransactionCategory,
    pub amount: Decimal,
    pub remarks: Option<String>,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub err_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LogView {
    /// Signed amount: credits positive, debits negative, failures zero.
    pub fn signed_amount(&self) -> Decimal {
        signed_amount(self.status, self.transaction_type, self.amount)
    }
}
