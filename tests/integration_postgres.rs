//! PostgreSQL integration tests
//!
//! Need DATABASE_URL pointing at a database with migrations/ applied.
//! Run with: cargo test --test integration_postgres -- --ignored --test-threads=1

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sqlx::PgPool;

use wallet_ledger::domain::{LedgerError, TransactionStatus, TransactionType};
use wallet_ledger::engine::{
    PaymentCommand, RegisterUserCommand, TopUpCommand, TransferCommand,
};
use wallet_ledger::{LedgerEngine, OperationContext, PgLedgerStore};

mod common;

async fn engine() -> (LedgerEngine, PgPool) {
    let pool = common::setup_test_db().await;
    let engine = LedgerEngine::new(Arc::new(PgLedgerStore::new(pool.clone())));
    (engine, pool)
}

async fn register(engine: &LedgerEngine, phone: &str) -> String {
    engine
        .register(RegisterUserCommand {
            phone_number: phone.to_string(),
            first_name: "Pg".to_string(),
            last_name: "User".to_string(),
            address: "Jl. Thamrin".to_string(),
        })
        .await
        .unwrap()
        .uid
}

async fn log_count(pool: &PgPool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM account_transaction_logs")
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
#[ignore]
async fn test_concurrent_first_top_ups_create_one_account() {
    let (engine, pool) = engine().await;
    let alice = register(&engine, "0821").await;

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let engine = engine.clone();
            let alice = alice.clone();
            tokio::spawn(async move {
                engine
                    .top_up(TopUpCommand::new(alice, dec!(12.50)), &OperationContext::new())
                    .await
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let accounts: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM accounts a JOIN users u ON u.id = a.user_id WHERE u.uid = $1",
    )
    .bind(&alice)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(accounts, 1);

    let balance = engine.balance(&alice).await.unwrap();
    assert_eq!(balance.current_balance, dec!(125.00));
    assert_eq!(log_count(&pool).await, 10);
}

#[tokio::test]
#[ignore]
async fn test_transfer_and_round_trip() {
    let (engine, _pool) = engine().await;
    let ctx = OperationContext::new();
    let alice = register(&engine, "0821").await;
    let bob = register(&engine, "0822").await;

    engine.top_up(TopUpCommand::new(&alice, dec!(10000)), &ctx).await.unwrap();
    let result = engine.pay(PaymentCommand::new(&alice, dec!(15000), "tv"), &ctx).await;
    assert!(matches!(result, Err(LedgerError::InsufficientBalance { .. })));
    engine.pay(PaymentCommand::new(&alice, dec!(4000), "food"), &ctx).await.unwrap();

    let receipt = engine
        .transfer(TransferCommand::new(&alice, &bob, dec!(6000), "settle"), &ctx)
        .await
        .unwrap();
    assert_eq!(receipt.balance_after, dec!(0));

    let alice_log = engine.list_for_user(&alice).await.unwrap();
    assert_eq!(alice_log.len(), 3);
    assert_eq!(alice_log[0].transaction_type, TransactionType::Debit);
    assert_eq!(alice_log[0].transaction_reff, receipt.transaction_id);
    assert_eq!(alice_log[0].counterpart_user_id.as_deref(), Some(bob.as_str()));

    for uid in [&alice, &bob] {
        let balance = engine.balance(uid).await.unwrap();
        let sum: Decimal = engine
            .list_for_user(uid)
            .await
            .unwrap()
            .iter()
            .map(|l| l.signed_amount())
            .sum();
        assert_eq!(sum, balance.current_balance);
    }
}

#[tokio::test]
#[ignore]
async fn test_rejected_transfer_writes_one_failed_entry() {
    let (engine, pool) = engine().await;
    let ctx = OperationContext::new();
    let alice = register(&engine, "0821").await;
    let bob = register(&engine, "0822").await;
    engine.top_up(TopUpCommand::new(&alice, dec!(100)), &ctx).await.unwrap();

    let result = engine
        .transfer(TransferCommand::new(&alice, &bob, dec!(150), ""), &ctx)
        .await;
    assert!(matches!(result, Err(LedgerError::InsufficientBalance { .. })));
    assert_eq!(log_count(&pool).await, 2);

    let entries = engine.list_for_user(&alice).await.unwrap();
    assert_eq!(entries[0].status, TransactionStatus::Failed);
    assert_eq!(entries[0].balance_before, entries[0].balance_after);
    assert!(entries[0].counterpart_user_id.is_none());

    let bob_balance = engine.balance(&bob).await.unwrap();
    assert_eq!(bob_balance.current_balance, Decimal::ZERO);
}

#[tokio::test]
#[ignore]
async fn test_opposite_transfers_do_not_deadlock() {
    let (engine, _pool) = engine().await;
    let ctx = OperationContext::new();
    let alice = register(&engine, "0821").await;
    let bob = register(&engine, "0822").await;
    engine.top_up(TopUpCommand::new(&alice, dec!(1000)), &ctx).await.unwrap();
    engine.top_up(TopUpCommand::new(&bob, dec!(1000)), &ctx).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..20 {
        let engine = engine.clone();
        let (from, to) = if i % 2 == 0 {
            (alice.clone(), bob.clone())
        } else {
            (bob.clone(), alice.clone())
        };
        handles.push(tokio::spawn(async move {
            engine
                .transfer(TransferCommand::new(from, to, dec!(10), ""), &OperationContext::new())
                .await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let a = engine.balance(&alice).await.unwrap().current_balance;
    let b = engine.balance(&bob).await.unwrap().current_balance;
    assert_eq!(a + b, dec!(2000));
    assert_eq!(a, dec!(1000));
}
