//! API Middleware
//!
//! Caller identity extraction and request logging.

use axum::{
    body::Body,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::domain::OperationContext;

/// Header carrying the authenticated caller's public user id
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the request id set by the request-id layer
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request user from the X-User-Id header
#[derive(Debug, Clone)]
pub struct RequestUser {
    pub user_id: String,
}

// =========================================================================
// Identity middleware
// =========================================================================

/// Extract the caller identity and build the operation context.
///
/// Authentication happens upstream; this only reads the identity it left in
/// `X-User-Id`. A missing header is not rejected here because some routes
/// (registration) do not need one.
pub async fn identity_middleware(mut request: Request<Body>, next: Next) -> Response {
    let headers = request.headers();

    let request_user = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| RequestUser {
            user_id: s.to_string(),
        });

    let correlation_id = correlation_id_from(headers);

    let mut context = OperationContext::new().with_correlation_id(correlation_id);
    if let Some(ref user) = request_user {
        context = context.with_request_user(user.user_id.clone());
    }

    if let Some(user) = request_user {
        request.extensions_mut().insert(user);
    }
    request.extensions_mut().insert(context);

    next.run(request).await
}

/// Correlation id from the request id header, or a fresh one.
fn correlation_id_from(headers: &HeaderMap) -> Uuid {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4)
}

// =========================================================================
// mask_headers_for_logging
// =========================================================================

/// Headers that should be masked in logs
const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "set-cookie", "x-api-key"];

/// Mask sensitive headers for logging
pub fn mask_headers_for_logging(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let name_lower = name.as_str().to_lowercase();
            let masked_value = if SENSITIVE_HEADERS.contains(&name_lower.as_str()) {
                "[REDACTED]".to_string()
            } else {
                value.to_str().unwrap_or("[invalid utf8]").to_string()
            };
            (name.to_string(), masked_value)
        })
        .collect()
}

// =========================================================================
// Request logging middleware
// =========================================================================

/// Request logging middleware. Runs inside the identity middleware so the
/// correlation id is available.
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let headers = mask_headers_for_logging(request.headers());

    let correlation_id = request
        .extensions()
        .get::<OperationContext>()
        .and_then(|ctx| ctx.correlation_id);

    let start = std::time::Instant::now();

    tracing::debug!(
        method = %method,
        uri = %uri,
        correlation_id = ?correlation_id,
        headers = ?headers,
        "Incoming request"
    );

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = %start.elapsed().as_millis(),
        correlation_id = ?correlation_id,
        "Request completed"
    );

    response
}
