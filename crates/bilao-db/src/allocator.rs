//! # Stock Allocator
//!
//! The only writer of order-driven stock changes. Every allocate/restore is
//! one atomic read-check-write transaction against the ledger.
//!
//! ## Two-Phase Allocation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  allocate("Kutsinta", 4.00)                       ONE TRANSACTION       │
//! │                                                                         │
//! │  Phase 1: read batches FIFO (production date ascending), sum on-hand   │
//! │           total < needed? → InsufficientStock, NO WRITES               │
//! │                                                                         │
//! │  Phase 2: walk oldest-first, deduct min(remaining, batch.on_hand)      │
//! │           per batch, one `out` movement per touched batch              │
//! │                                                                         │
//! │    batch A (day 1): 2.00 → 0.00   movement -2.00                       │
//! │    batch B (day 3): 5.00 → 3.00   movement -2.00                       │
//! │                                                                         │
//! │  COMMIT or nothing. A concurrent order never sees a stale snapshot:    │
//! │  losing the database lock surfaces Conflict and the WHOLE cycle        │
//! │  retries (bounded), never individual batch steps.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Restoration Policy
//! `restore` adds stock back to the MOST RECENTLY UPDATED batch of the key,
//! not the batch the deduction was drawn from. Only the aggregate per key is
//! conserved. This mirrors the shop's long-standing behavior; whether it
//! should be FIFO-symmetric instead is an open product question.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::batch::{
    apply_batch_quantity, fetch_batches_fifo, fetch_latest_updated, fetch_total_on_hand,
    insert_movement,
};
use crate::repository::reservation::sum_held;
use bilao_core::{
    validation::validate_demand, Actor, BatchQty, CoreError, MovementKind, StockKey, StockMovement,
};

/// Bounded retry count for conflicted transactions.
const MAX_TX_RETRIES: u32 = 3;

/// Result of an availability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Availability {
    /// Total on hand across non-deleted batches (minus holds, for the
    /// scheduled variant).
    pub on_hand: BatchQty,
    /// What the caller asked for.
    pub needed: BatchQty,
}

impl Availability {
    /// True when the pool covers the need.
    #[inline]
    pub fn is_available(&self) -> bool {
        self.on_hand >= self.needed
    }

    /// How much is missing (zero when available).
    #[inline]
    pub fn shortfall(&self) -> BatchQty {
        self.needed.saturating_sub(self.on_hand)
    }
}

/// Transactional stock allocator.
///
/// Cheap to clone; wraps the shared pool.
#[derive(Debug, Clone)]
pub struct Allocator {
    pool: SqlitePool,
}

impl Allocator {
    /// Creates a new Allocator on the shared pool.
    pub fn new(pool: SqlitePool) -> Self {
        Allocator { pool }
    }

    /// Sums availability for a key across all non-deleted batches.
    pub async fn check_availability(
        &self,
        key: &StockKey,
        needed: BatchQty,
    ) -> DbResult<Availability> {
        let on_hand = fetch_total_on_hand(&self.pool, key).await?;
        Ok(Availability { on_hand, needed })
    }

    /// Availability for a scheduled order: the pool minus advisory holds
    /// from OTHER orders targeting the same pickup date.
    ///
    /// Holds are advisory only; regular orders use
    /// [`check_availability`](Self::check_availability) and may still
    /// deplete the pool first.
    pub async fn check_availability_for_schedule(
        &self,
        key: &StockKey,
        needed: BatchQty,
        pickup_date: chrono::NaiveDate,
        exclude_order_id: Option<&str>,
    ) -> DbResult<Availability> {
        let on_hand = fetch_total_on_hand(&self.pool, key).await?;
        let held = sum_held(&self.pool, key, pickup_date, exclude_order_id).await?;
        Ok(Availability {
            on_hand: on_hand.saturating_sub(held),
            needed,
        })
    }

    /// Deducts `needed` from a key's batches, oldest production first.
    ///
    /// Returns one movement per touched batch. On `InsufficientStock`
    /// nothing is written. On a transaction conflict the whole
    /// read-check-write cycle retries up to [`MAX_TX_RETRIES`] times.
    pub async fn allocate(
        &self,
        key: &StockKey,
        needed: BatchQty,
        reason: &str,
        actor: &Actor,
    ) -> DbResult<Vec<StockMovement>> {
        validate_demand(key.kind(), key.label(), needed).map_err(CoreError::from)?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.allocate_once(key, needed, reason, actor).await {
                Err(err) if err.is_retryable() && attempt < MAX_TX_RETRIES => {
                    warn!(key = %key, attempt, "Allocation conflict, retrying");
                }
                other => return other,
            }
        }
    }

    /// One allocation attempt: both phases inside a single transaction.
    async fn allocate_once(
        &self,
        key: &StockKey,
        needed: BatchQty,
        reason: &str,
        actor: &Actor,
    ) -> DbResult<Vec<StockMovement>> {
        let mut tx = self.pool.begin().await?;

        // Phase 1: read and check. Early returns drop the transaction,
        // rolling back with no writes observable.
        let batches = fetch_batches_fifo(&mut *tx, key).await?;
        if batches.is_empty() {
            return Err(CoreError::BatchNotFound(key.label().to_string()).into());
        }

        let total: i64 = batches.iter().map(|b| b.on_hand_hundredths).sum();
        if BatchQty::from_hundredths(total) < needed {
            return Err(CoreError::InsufficientStock {
                label: key.label().to_string(),
                available: total,
                needed: needed.hundredths(),
            }
            .into());
        }

        // Phase 2: walk oldest-first and deduct.
        let now = Utc::now();
        let mut remaining = needed;
        let mut movements = Vec::new();

        for batch in &batches {
            if remaining.is_zero() {
                break;
            }
            let take = remaining.min(batch.on_hand());
            if !take.is_positive() {
                continue;
            }

            let movement = StockMovement::record(
                batch,
                MovementKind::Out,
                BatchQty::zero() - take,
                reason,
                actor,
                now,
            );

            apply_batch_quantity(&mut *tx, &batch.id, batch.on_hand() - take, now).await?;
            insert_movement(&mut *tx, &movement).await?;

            debug!(
                batch_id = %batch.id,
                label = %batch.label,
                took = %take,
                left = %(batch.on_hand() - take),
                "Batch deducted"
            );

            remaining -= take;
            movements.push(movement);
        }

        tx.commit().await?;

        info!(key = %key, needed = %needed, batches = movements.len(), "Stock allocated");
        Ok(movements)
    }

    /// Reverses a prior deduction by adding `qty` back to the key's most
    /// recently updated batch.
    ///
    /// `BatchNotFound` when the key has no batches at all (every batch
    /// soft-deleted counts as none).
    pub async fn restore(
        &self,
        key: &StockKey,
        qty: BatchQty,
        reason: &str,
        actor: &Actor,
    ) -> DbResult<StockMovement> {
        validate_demand(key.kind(), key.label(), qty).map_err(CoreError::from)?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.restore_once(key, qty, reason, actor).await {
                Err(err) if err.is_retryable() && attempt < MAX_TX_RETRIES => {
                    warn!(key = %key, attempt, "Restore conflict, retrying");
                }
                other => return other,
            }
        }
    }

    /// One restore attempt inside a single transaction.
    async fn restore_once(
        &self,
        key: &StockKey,
        qty: BatchQty,
        reason: &str,
        actor: &Actor,
    ) -> DbResult<StockMovement> {
        let mut tx = self.pool.begin().await?;

        let batch = fetch_latest_updated(&mut *tx, key)
            .await?
            .ok_or_else(|| DbError::from(CoreError::BatchNotFound(key.label().to_string())))?;

        let now = Utc::now();
        let movement = StockMovement::record(&batch, MovementKind::In, qty, reason, actor, now);

        apply_batch_quantity(&mut *tx, &batch.id, batch.on_hand() + qty, now).await?;
        insert_movement(&mut *tx, &movement).await?;

        tx.commit().await?;

        info!(key = %key, qty = %qty, batch_id = %movement.batch_id, "Stock restored");
        Ok(movement)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::batch::NewBatch;
    use bilao_core::StockKind;
    use chrono::NaiveDate;

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn add_batch(db: &Database, label: &str, day: u32, qty_hundredths: i64) -> String {
        let new = NewBatch {
            kind: StockKind::Variety,
            label: label.to_string(),
            initial: BatchQty::from_hundredths(qty_hundredths),
            minimum: BatchQty::zero(),
            critical: BatchQty::zero(),
            production_date: NaiveDate::from_ymd_opt(2026, 8, day).unwrap(),
            expiry_date: NaiveDate::from_ymd_opt(2026, 8, day + 7).unwrap(),
        };
        db.stock()
            .insert_batch(&new, &Actor::system())
            .await
            .unwrap()
            .id
    }

    async fn add_fixed_batch(db: &Database, size: &str, day: u32, units: i64) -> String {
        let new = NewBatch {
            kind: StockKind::FixedSize,
            label: size.to_string(),
            initial: BatchQty::from_units(units),
            minimum: BatchQty::zero(),
            critical: BatchQty::zero(),
            production_date: NaiveDate::from_ymd_opt(2026, 8, day).unwrap(),
            expiry_date: NaiveDate::from_ymd_opt(2026, 8, day + 2).unwrap(),
        };
        db.stock()
            .insert_batch(&new, &Actor::system())
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_fifo_walk_across_batches() {
        // batch A (day 1, qty 2) and batch B (day 3, qty 5); allocate 4:
        // A fully drained to 0, B reduced to 3, two movements emitted
        let db = db().await;
        let a = add_batch(&db, "Kutsinta", 1, 200).await;
        let b = add_batch(&db, "Kutsinta", 3, 500).await;

        let allocator = Allocator::new(db.pool().clone());
        let key = StockKey::variety("Kutsinta");
        let movements = allocator
            .allocate(&key, BatchQty::from_units(4), "Order pickup", &Actor::system())
            .await
            .unwrap();

        assert_eq!(movements.len(), 2);
        assert_eq!(movements[0].batch_id, a);
        assert_eq!(movements[0].delta_hundredths, -200);
        assert_eq!(movements[1].batch_id, b);
        assert_eq!(movements[1].delta_hundredths, -200);

        let batch_a = db.stock().get_by_id(&a).await.unwrap().unwrap();
        let batch_b = db.stock().get_by_id(&b).await.unwrap().unwrap();
        assert_eq!(batch_a.on_hand_hundredths, 0);
        assert_eq!(batch_b.on_hand_hundredths, 300);
    }

    #[tokio::test]
    async fn test_insufficient_stock_writes_nothing() {
        let db = db().await;
        let a = add_batch(&db, "Kalamay", 1, 150).await;

        let allocator = Allocator::new(db.pool().clone());
        let key = StockKey::variety("Kalamay");
        let err = allocator
            .allocate(&key, BatchQty::from_units(2), "Order pickup", &Actor::system())
            .await
            .unwrap_err();

        match err {
            DbError::Domain(CoreError::InsufficientStock {
                label,
                available,
                needed,
            }) => {
                assert_eq!(label, "Kalamay");
                assert_eq!(available, 150);
                assert_eq!(needed, 200);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        // nothing observable changed
        let batch = db.stock().get_by_id(&a).await.unwrap().unwrap();
        assert_eq!(batch.on_hand_hundredths, 150);
        assert!(db.stock().movements_for_batch(&a).await.unwrap().len() == 1);
    }

    #[tokio::test]
    async fn test_batch_not_found_is_distinct_from_zero_stock() {
        let db = db().await;
        let allocator = Allocator::new(db.pool().clone());

        // never stocked
        let err = allocator
            .allocate(
                &StockKey::variety("Cassava"),
                BatchQty::from_hundredths(25),
                "Order pickup",
                &Actor::system(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::BatchNotFound(_))));

        // stocked but empty
        add_batch(&db, "Sapin-Sapin", 1, 100).await;
        allocator
            .allocate(
                &StockKey::variety("Sapin-Sapin"),
                BatchQty::from_units(1),
                "Order pickup",
                &Actor::system(),
            )
            .await
            .unwrap();
        let err = allocator
            .allocate(
                &StockKey::variety("Sapin-Sapin"),
                BatchQty::from_hundredths(50),
                "Order pickup",
                &Actor::system(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { available: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_never_negative_after_allocation() {
        let db = db().await;
        add_batch(&db, "Kutsinta", 1, 137).await;
        add_batch(&db, "Kutsinta", 2, 63).await;

        let allocator = Allocator::new(db.pool().clone());
        let key = StockKey::variety("Kutsinta");
        allocator
            .allocate(&key, BatchQty::from_hundredths(200), "Order pickup", &Actor::system())
            .await
            .unwrap();

        for batch in db.stock().list_for_key(&key).await.unwrap() {
            assert!(batch.on_hand_hundredths >= 0);
        }
        assert_eq!(
            db.stock().total_on_hand(&key).await.unwrap(),
            BatchQty::zero()
        );
    }

    #[tokio::test]
    async fn test_restore_targets_latest_updated_batch() {
        let db = db().await;
        let a = add_batch(&db, "Kutsinta", 1, 200).await;

        let allocator = Allocator::new(db.pool().clone());
        let key = StockKey::variety("Kutsinta");
        allocator
            .allocate(&key, BatchQty::from_units(2), "Order pickup", &Actor::system())
            .await
            .unwrap();

        // a fresh batch arrives after the deduction; it is now the most
        // recently updated and receives the restoration
        let c = add_batch(&db, "Kutsinta", 5, 300).await;

        let movement = allocator
            .restore(&key, BatchQty::from_units(2), "Order cancelled", &Actor::system())
            .await
            .unwrap();
        assert_eq!(movement.batch_id, c);
        assert_eq!(movement.kind, MovementKind::In);

        // origin batch stays drained; only the aggregate is conserved
        assert_eq!(
            db.stock().get_by_id(&a).await.unwrap().unwrap().on_hand_hundredths,
            0
        );
        assert_eq!(
            db.stock().total_on_hand(&key).await.unwrap(),
            BatchQty::from_hundredths(500)
        );
    }

    #[tokio::test]
    async fn test_allocate_then_restore_conserves_aggregate() {
        let db = db().await;
        add_batch(&db, "Kalamay", 1, 340).await;
        add_batch(&db, "Kalamay", 2, 160).await;

        let allocator = Allocator::new(db.pool().clone());
        let key = StockKey::variety("Kalamay");
        let before = db.stock().total_on_hand(&key).await.unwrap();

        allocator
            .allocate(&key, BatchQty::from_hundredths(402), "Order pickup", &Actor::system())
            .await
            .unwrap();
        allocator
            .restore(&key, BatchQty::from_hundredths(402), "Order cancelled", &Actor::system())
            .await
            .unwrap();

        assert_eq!(db.stock().total_on_hand(&key).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_restore_without_any_batch_is_batch_not_found() {
        let db = db().await;
        let allocator = Allocator::new(db.pool().clone());
        let err = allocator
            .restore(
                &StockKey::variety("Cassava"),
                BatchQty::from_units(1),
                "Order cancelled",
                &Actor::system(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::BatchNotFound(_))));
    }

    #[tokio::test]
    async fn test_fixed_size_allocation_in_whole_units() {
        let db = db().await;
        add_fixed_batch(&db, "Small", 1, 3).await;
        add_fixed_batch(&db, "Small", 2, 2).await;

        let allocator = Allocator::new(db.pool().clone());
        let key = StockKey::fixed_size("Small");

        // fractional demand against fixed stock is rejected up front
        let err = allocator
            .allocate(&key, BatchQty::from_hundredths(150), "Order", &Actor::system())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));

        let movements = allocator
            .allocate(&key, BatchQty::from_units(4), "Order", &Actor::system())
            .await
            .unwrap();
        assert_eq!(movements.len(), 2);
        assert_eq!(
            db.stock().total_on_hand(&key).await.unwrap(),
            BatchQty::from_units(1)
        );
    }

    #[tokio::test]
    async fn test_concurrent_allocation_exactly_one_winner() {
        // stock covers exactly one of two identical concurrent orders
        let db = db().await;
        add_batch(&db, "Kutsinta", 1, 100).await;

        let allocator = Allocator::new(db.pool().clone());
        let key = StockKey::variety("Kutsinta");
        let a = allocator.clone();
        let b = allocator.clone();
        let key_a = key.clone();
        let key_b = key.clone();
        let actor_a = Actor::system();
        let actor_b = Actor::system();

        let (ra, rb) = tokio::join!(
            a.allocate(&key_a, BatchQty::from_units(1), "Order A", &actor_a),
            b.allocate(&key_b, BatchQty::from_units(1), "Order B", &actor_b),
        );

        let successes = [&ra, &rb].iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1, "exactly one order may win the last bilao");

        let loser = if ra.is_ok() { rb } else { ra };
        assert!(matches!(
            loser.unwrap_err(),
            DbError::Domain(CoreError::InsufficientStock { .. })
        ));
        assert_eq!(
            db.stock().total_on_hand(&key).await.unwrap(),
            BatchQty::zero()
        );
    }

    #[tokio::test]
    async fn test_scheduled_availability_subtracts_other_holds() {
        use crate::repository::reservation::insert_hold;
        use bilao_core::{OrderStatus, Reservation};
        use chrono::Utc;

        let db = db().await;
        add_batch(&db, "Kutsinta", 1, 300).await;

        let pickup = NaiveDate::from_ymd_opt(2026, 8, 10).unwrap();
        let hold = Reservation {
            id: "hold-1".to_string(),
            order_id: "other-order".to_string(),
            kind: StockKind::Variety,
            label: "Kutsinta".to_string(),
            qty_hundredths: 200,
            pickup_date: pickup,
            pickup_time: "10:00 AM".to_string(),
            status: OrderStatus::StockReserved,
            created_at: Utc::now(),
        };
        insert_hold(db.pool(), &hold).await.unwrap();

        let allocator = Allocator::new(db.pool().clone());
        let key = StockKey::variety("Kutsinta");

        // plain availability ignores holds
        let plain = allocator
            .check_availability(&key, BatchQty::from_units(2))
            .await
            .unwrap();
        assert!(plain.is_available());

        // scheduled availability on the same date sees only 1.00 free
        let scheduled = allocator
            .check_availability_for_schedule(&key, BatchQty::from_units(2), pickup, Some("my-order"))
            .await
            .unwrap();
        assert!(!scheduled.is_available());
        assert_eq!(scheduled.shortfall(), BatchQty::from_units(1));

        // the holding order itself is excluded
        let own = allocator
            .check_availability_for_schedule(&key, BatchQty::from_units(2), pickup, Some("other-order"))
            .await
            .unwrap();
        assert!(own.is_available());

        // a different pickup date is unaffected
        let other_day = allocator
            .check_availability_for_schedule(
                &key,
                BatchQty::from_units(2),
                NaiveDate::from_ymd_opt(2026, 8, 11).unwrap(),
                None,
            )
            .await
            .unwrap();
        assert!(other_day.is_available());
    }
}
