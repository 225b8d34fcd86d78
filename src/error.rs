//! Error handling module
//!
//! HTTP boundary errors and their response conversion.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::LedgerError;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Missing user identity")]
    MissingIdentity,

    // Ledger errors
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub message: String,
}

impl ErrorResponse {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: "FAILED",
            message: message.into(),
        }
    }
}

impl AppError {
    /// Status code and caller-facing message. Storage details never leave
    /// the process; they are logged where the failure happened.
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            // 400 Bad Request
            AppError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),

            // 401 Unauthorized
            AppError::MissingIdentity => {
                (StatusCode::UNAUTHORIZED, "Unauthenticated".to_string())
            }

            AppError::Ledger(err) => match err {
                LedgerError::NotFound(_) => (StatusCode::NOT_FOUND, "User not found".to_string()),
                LedgerError::TargetNotFound(_) => {
                    (StatusCode::NOT_FOUND, "Target user not found".to_string())
                }
                LedgerError::InsufficientBalance { .. } => (
                    StatusCode::BAD_REQUEST,
                    crate::engine::INSUFFICIENT_BALANCE_MESSAGE.to_string(),
                ),
                LedgerError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
                LedgerError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
                LedgerError::Persistence(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "Transaction failed".to_string())
                }
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        (status, Json(ErrorResponse::failed(message))).into_response()
    }
}
