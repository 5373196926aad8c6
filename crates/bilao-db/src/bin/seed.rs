//! # Seed Data Generator
//!
//! Populates a database with sample stock and a few orders for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./data/bilao.db (default)
//! cargo run -p bilao-db --bin seed
//!
//! # Specify database path
//! cargo run -p bilao-db --bin seed -- --db ./bilao.db
//! ```
//!
//! ## Generated Data
//! - Two production runs per variety (yesterday and today) with thresholds
//! - Fixed-size shelf stock for Small and Solo Bibingka
//! - One regular cash order driven to Completed
//! - One scheduled GCash order left at StockReserved

use std::env;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::info;

use bilao_core::{
    Actor, BatchQty, DraftItem, NullNotifier, OrderDraft, OrderStatus, PaymentMethod, StockKind,
    VARIETIES,
};
use bilao_db::{Database, DbConfig, DbResult, NewBatch};

#[tokio::main]
async fn main() -> DbResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let db_path = parse_db_path().unwrap_or_else(|| "./data/bilao.db".to_string());
    if let Some(parent) = std::path::Path::new(&db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| bilao_db::DbError::ConnectionFailed(e.to_string()))?;
        }
    }

    info!(path = %db_path, "Seeding database");
    let db = Database::new(DbConfig::new(&db_path)).await?;
    let actor = Actor::staff("seed");
    let today = Utc::now().date_naive();

    // two production runs per variety, oldest first
    for variety in VARIETIES {
        for (days_ago, hundredths) in [(1i64, 300i64), (0, 500)] {
            let produced = today - Duration::days(days_ago);
            db.stock()
                .insert_batch(
                    &NewBatch {
                        kind: StockKind::Variety,
                        label: (*variety).to_string(),
                        initial: BatchQty::from_hundredths(hundredths),
                        minimum: BatchQty::from_hundredths(200),
                        critical: BatchQty::from_hundredths(100),
                        production_date: produced,
                        expiry_date: produced + Duration::days(7),
                    },
                    &actor,
                )
                .await?;
        }
    }

    // fixed-size shelf stock
    for size in ["Small", "Solo"] {
        db.stock()
            .insert_batch(
                &NewBatch {
                    kind: StockKind::FixedSize,
                    label: size.to_string(),
                    initial: BatchQty::from_units(12),
                    minimum: BatchQty::from_units(4),
                    critical: BatchQty::from_units(2),
                    production_date: today,
                    expiry_date: today + Duration::days(2),
                },
                &actor,
            )
            .await?;
    }

    let lifecycle = db.lifecycle(Arc::new(NullNotifier));

    // a walk-in tray order taken all the way through the regular flow
    let walk_in = lifecycle
        .checkout(
            &OrderDraft {
                customer_name: "Walk-in Customer".to_string(),
                items: vec![DraftItem {
                    size: "Tray".to_string(),
                    varieties: vec!["Bibingka".to_string(), "Kutsinta".to_string()],
                    quantity: 1,
                }],
                payment_method: PaymentMethod::Cash,
                gcash_reference: None,
                pickup_date: today,
                pickup_time: "09:00 AM".to_string(),
            },
            &actor,
        )
        .await?;
    for status in [
        OrderStatus::PreparingOrder,
        OrderStatus::ReadyForPickup,
        OrderStatus::Completed,
    ] {
        lifecycle.transition(&walk_in.id, status, &actor).await?;
    }
    info!(order_id = %walk_in.id, "Seeded completed walk-in order");

    // a scheduled order holding stock for the day after tomorrow
    let scheduled = lifecycle
        .checkout(
            &OrderDraft {
                customer_name: "Maria Santos".to_string(),
                items: vec![DraftItem {
                    size: "Big Bilao".to_string(),
                    varieties: vec!["Sapin-Sapin".to_string(), "Kalamay".to_string()],
                    quantity: 1,
                }],
                payment_method: PaymentMethod::Gcash,
                gcash_reference: Some("GC-20260806-001".to_string()),
                pickup_date: today + Duration::days(2),
                pickup_time: "02:00 PM".to_string(),
            },
            &actor,
        )
        .await?;
    lifecycle.approve_payment(&scheduled.id, &actor).await?;
    lifecycle
        .transition(&scheduled.id, OrderStatus::StockReserved, &actor)
        .await?;
    info!(order_id = %scheduled.id, "Seeded scheduled order with reservation");

    let low = db.stock().below_minimum().await?;
    info!(batches_below_minimum = low.len(), "Seed complete");

    db.close().await;
    Ok(())
}

/// Reads `--db <path>` from the command line.
fn parse_db_path() -> Option<String> {
    let args: Vec<String> = env::args().collect();
    args.iter()
        .position(|a| a == "--db")
        .and_then(|idx| args.get(idx + 1).cloned())
}
