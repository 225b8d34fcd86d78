//! Load Testing Tool
//!
//! Fires concurrent top-ups, payments and transfers, then checks that each
//! user's balance equals the sum of its signed SUCCEEDED log amounts.
//!
//! Run with: cargo run --bin load_test --release -- --users 20 --ops 200
//! Add `--postgres` to run against DATABASE_URL instead of memory.

use std::sync::Arc;
use std::time::Instant;

use rust_decimal::Decimal;
use tokio::task::JoinSet;

use wallet_ledger::engine::{
    PaymentCommand, RegisterUserCommand, TopUpCommand, TransferCommand,
};
use wallet_ledger::{db, LedgerEngine, LedgerError, LedgerStore, MemoryLedgerStore, OperationContext, PgLedgerStore};

fn arg_value(args: &[String], name: &str, default: usize) -> usize {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    let user_count = arg_value(&args, "--users", 20).max(2);
    let ops_per_user = arg_value(&args, "--ops", 200);

    let store: Arc<dyn LedgerStore> = if args.iter().any(|a| a == "--postgres") {
        let database_url = std::env::var("DATABASE_URL")?;
        println!("Connecting to database...");
        Arc::new(PgLedgerStore::new(db::connect(&database_url, 10).await?))
    } else {
        Arc::new(MemoryLedgerStore::new())
    };
    let engine = LedgerEngine::new(store);

    println!(
        "Load Test - {} users, {} operations each",
        user_count, ops_per_user
    );

    let run_tag = uuid::Uuid::new_v4().simple().to_string();
    let mut users = Vec::with_capacity(user_count);
    for i in 0..user_count {
        let user = engine
            .register(RegisterUserCommand {
                phone_number: format!("lt-{}-{}", &run_tag[..8], i),
                first_name: "Load".to_string(),
                last_name: format!("User{}", i),
                address: "Load test".to_string(),
            })
            .await?;
        users.push(user.uid);
    }

    let start = Instant::now();
    let mut tasks = JoinSet::new();

    for (i, user_id) in users.iter().enumerate() {
        let engine = engine.clone();
        let user_id = user_id.clone();
        let peer = users[(i + 1) % users.len()].clone();

        tasks.spawn(async move {
            let ctx = OperationContext::new();
            let mut succeeded = 0u64;
            let mut rejected = 0u64;

            for op in 0..ops_per_user {
                let result = match op % 4 {
                    0 => engine
                        .top_up(TopUpCommand::new(&user_id, Decimal::new(10_000, 2)), &ctx)
                        .await,
                    1 => engine
                        .pay(PaymentCommand::new(&user_id, Decimal::new(3_550, 2), "load"), &ctx)
                        .await,
                    2 => engine
                        .transfer(
                            TransferCommand::new(&user_id, &peer, Decimal::new(4_025, 2), "load"),
                            &ctx,
                        )
                        .await,
                    _ => engine
                        .pay(PaymentCommand::new(&user_id, Decimal::new(1_000_000, 2), "big"), &ctx)
                        .await,
                };

                match result {
                    Ok(_) => succeeded += 1,
                    Err(LedgerError::InsufficientBalance { .. } | LedgerError::NotFound(_)) => {
                        rejected += 1
                    }
                    Err(e) => return Err(e),
                }
            }

            Ok::<_, LedgerError>((succeeded, rejected))
        });
    }

    let mut succeeded = 0u64;
    let mut rejected = 0u64;
    while let Some(joined) = tasks.join_next().await {
        let (ok, rej) = joined??;
        succeeded += ok;
        rejected += rej;
    }

    let elapsed = start.elapsed();
    let total = succeeded + rejected;

    println!("\n=== Load Test Results ===");
    println!("Operations: {}", total);
    println!("Succeeded: {}", succeeded);
    println!("Rejected: {}", rejected);
    println!("Time: {:.2}s", elapsed.as_secs_f64());
    println!("Rate: {:.0} ops/sec", total as f64 / elapsed.as_secs_f64());

    let mut mismatches = 0;
    for user_id in &users {
        let balance = engine.balance(user_id).await?;
        let logs = engine.list_for_user(user_id).await?;
        let sum: Decimal = logs.iter().map(|l| l.signed_amount()).sum();

        if sum != balance.current_balance {
            mismatches += 1;
            println!(
                "MISMATCH user={} balance={} log_sum={}",
                user_id, balance.current_balance, sum
            );
        }
    }

    if mismatches > 0 {
        anyhow::bail!("{} users failed the balance round trip", mismatches);
    }

    println!("Balance round trip verified for {} users", users.len());
    Ok(())
}
