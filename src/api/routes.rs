//! API Routes
//!
//! HTTP endpoint definitions. Each handler decodes its payload, builds an
//! engine command and wraps the result in the response envelope.

use axum::{
    extract::{rejection::JsonRejection, Extension, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{LogView, OperationContext, User};
use crate::engine::{
    BalanceView, LedgerEngine, OperationReceipt, PaymentCommand, RegisterUserCommand,
    TopUpCommand, TransferCommand,
};
use crate::error::AppError;

use super::middleware::RequestUser;

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub phone_number: String,
    pub first_name: String,
    pub last_name: String,
    pub address: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisteredUser {
    pub user_id: String,
    pub phone_number: String,
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub created_date: DateTime<Utc>,
}

impl From<User> for RegisteredUser {
    fn from(user: User) -> Self {
        Self {
            user_id: user.uid,
            phone_number: user.phone_number,
            first_name: user.first_name,
            last_name: user.last_name,
            address: user.address,
            created_date: user.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TopUpRequest {
    pub amount: Decimal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TopUpResult {
    pub top_up_id: Uuid,
    pub amount_top_up: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub created_date: DateTime<Utc>,
}

impl From<OperationReceipt> for TopUpResult {
    fn from(receipt: OperationReceipt) -> Self {
        Self {
            top_up_id: receipt.transaction_id,
            amount_top_up: receipt.amount,
            balance_before: receipt.balance_before,
            balance_after: receipt.balance_after,
            created_date: receipt.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub amount: Decimal,
    #[serde(default)]
    pub remarks: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentResult {
    pub payment_id: Uuid,
    pub amount: Decimal,
    pub remarks: String,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub created_date: DateTime<Utc>,
}

impl From<OperationReceipt> for PaymentResult {
    fn from(receipt: OperationReceipt) -> Self {
        Self {
            payment_id: receipt.transaction_id,
            amount: receipt.amount,
            remarks: receipt.remarks.unwrap_or_default(),
            balance_before: receipt.balance_before,
            balance_after: receipt.balance_after,
            created_date: receipt.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransferRequest {
    pub target_user: String,
    pub amount: Decimal,
    #[serde(default)]
    pub remarks: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransferResult {
    pub transfer_id: Uuid,
    pub amount: Decimal,
    pub remarks: String,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub created_date: DateTime<Utc>,
}

impl From<OperationReceipt> for TransferResult {
    fn from(receipt: OperationReceipt) -> Self {
        Self {
            transfer_id: receipt.transaction_id,
            amount: receipt.amount,
            remarks: receipt.remarks.unwrap_or_default(),
            balance_before: receipt.balance_before,
            balance_after: receipt.balance_after,
            created_date: receipt.created_at,
        }
    }
}

/// Success envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse<T> {
    pub status: String,
    pub result: T,
}

impl<T> SuccessResponse<T> {
    pub fn ok(result: T) -> Json<Self> {
        Json(Self {
            status: "SUCCESS".to_string(),
            result,
        })
    }
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<LedgerEngine> {
    Router::new()
        .route("/health", get(health))
        .route("/register", post(register))
        .route("/topup", post(top_up))
        .route("/pay", post(pay))
        .route("/transfer", post(transfer))
        .route("/transactions", get(transactions))
        .route("/balance", get(balance))
}

/// Caller identity, required by every wallet route
fn caller(request_user: Option<Extension<RequestUser>>) -> Result<String, AppError> {
    request_user
        .map(|Extension(user)| user.user_id)
        .ok_or(AppError::MissingIdentity)
}

// =========================================================================
// GET /health
// =========================================================================

async fn health(State(engine): State<LedgerEngine>) -> Result<&'static str, StatusCode> {
    match engine.store().ping().await {
        Ok(()) => Ok("OK"),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

// =========================================================================
// POST /register
// =========================================================================

async fn register(
    State(engine): State<LedgerEngine>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SuccessResponse<RegisteredUser>>), AppError> {
    let Json(request) = payload?;

    let user = engine
        .register(RegisterUserCommand {
            phone_number: request.phone_number,
            first_name: request.first_name,
            last_name: request.last_name,
            address: request.address,
        })
        .await?;

    Ok((StatusCode::CREATED, SuccessResponse::ok(user.into())))
}

// =========================================================================
// POST /topup
// =========================================================================

async fn top_up(
    State(engine): State<LedgerEngine>,
    Extension(context): Extension<OperationContext>,
    request_user: Option<Extension<RequestUser>>,
    payload: Result<Json<TopUpRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse<TopUpResult>>, AppError> {
    let user_id = caller(request_user)?;
    let Json(request) = payload?;

    let receipt = engine
        .top_up(TopUpCommand::new(user_id, request.amount), &context)
        .await?;

    Ok(SuccessResponse::ok(receipt.into()))
}

// =========================================================================
// POST /pay
// =========================================================================

async fn pay(
    State(engine): State<LedgerEngine>,
    Extension(context): Extension<OperationContext>,
    request_user: Option<Extension<RequestUser>>,
    payload: Result<Json<PaymentRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse<PaymentResult>>, AppError> {
    let user_id = caller(request_user)?;
    let Json(request) = payload?;

    let receipt = engine
        .pay(
            PaymentCommand::new(user_id, request.amount, request.remarks),
            &context,
        )
        .await?;

    Ok(SuccessResponse::ok(receipt.into()))
}

// =========================================================================
// POST /transfer
// =========================================================================

async fn transfer(
    State(engine): State<LedgerEngine>,
    Extension(context): Extension<OperationContext>,
    request_user: Option<Extension<RequestUser>>,
    payload: Result<Json<TransferRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse<TransferResult>>, AppError> {
    let user_id = caller(request_user)?;
    let Json(request) = payload?;

    let receipt = engine
        .transfer(
            TransferCommand::new(user_id, request.target_user, request.amount, request.remarks),
            &context,
        )
        .await?;

    Ok(SuccessResponse::ok(receipt.into()))
}

// =========================================================================
// GET /transactions
// =========================================================================

async fn transactions(
    State(engine): State<LedgerEngine>,
    request_user: Option<Extension<RequestUser>>,
) -> Result<Json<SuccessResponse<Vec<LogView>>>, AppError> {
    let user_id = caller(request_user)?;
    let entries = engine.list_for_user(&user_id).await?;
    Ok(SuccessResponse::ok(entries))
}

// =========================================================================
// GET /balance
// =========================================================================

async fn balance(
    State(engine): State<LedgerEngine>,
    request_user: Option<Extension<RequestUser>>,
) -> Result<Json<SuccessResponse<BalanceView>>, AppError> {
    let user_id = caller(request_user)?;
    let view = engine.balance(&user_id).await?;
    Ok(SuccessResponse::ok(view))
}
