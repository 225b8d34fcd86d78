//! Common test utilities
#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use tower::util::ServiceExt;

use wallet_ledger::{api, LedgerEngine, MemoryLedgerStore};

/// Router over a fresh memory store. The store handle shares state with the
/// router so tests can inspect committed rows.
pub fn memory_app() -> (Router, MemoryLedgerStore) {
    let store = MemoryLedgerStore::new();
    let engine = LedgerEngine::new(Arc::new(store.clone()));
    (api::app(engine), store)
}

/// Send one request through the router and decode the JSON body
/// (`Value::Null` when the body is not JSON).
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    user_id: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user_id) = user_id {
        builder = builder.header("X-User-Id", user_id);
    }

    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    (status, value)
}

/// Register a user over HTTP and return its public id
pub async fn register(app: &Router, phone: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/register",
        None,
        Some(serde_json::json!({
            "phone_number": phone,
            "first_name": "Test",
            "last_name": "User",
            "address": "Jl. Sudirman 1"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "registration failed: {}", body);

    body["result"]["user_id"].as_str().unwrap().to_string()
}

/// Setup test database - truncate wallet tables
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set for postgres tests");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    sqlx::query(
        "TRUNCATE TABLE account_transaction_logs, wallet_transactions, accounts, users CASCADE",
    )
    .execute(&pool)
    .await
    .expect("Failed to clean up DB");

    pool
}
