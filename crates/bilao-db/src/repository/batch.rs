//! # Stock Ledger Repository
//!
//! Database operations for stock batches and their movement history.
//!
//! ## Ledger Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  • on_hand never goes negative (enforced here and by a CHECK)           │
//! │  • every quantity change writes one movement row in the same            │
//! │    transaction                                                          │
//! │  • movements are append-only; a correction is a new movement            │
//! │  • batches referenced by history are soft-deleted, never removed        │
//! │  • order-driven deduction/restoration goes through the Allocator,       │
//! │    not through this repository's adjust()                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::sqlite::Sqlite;
use sqlx::{Executor, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use bilao_core::{
    validation::validate_new_batch, Actor, BatchQty, CoreError, MovementKind, StockBatch, StockKey,
    StockKind, StockMovement,
};

/// Fields for a new production run.
#[derive(Debug, Clone)]
pub struct NewBatch {
    pub kind: StockKind,
    pub label: String,
    pub initial: BatchQty,
    pub minimum: BatchQty,
    pub critical: BatchQty,
    pub production_date: chrono::NaiveDate,
    pub expiry_date: chrono::NaiveDate,
}

/// Repository for stock batch database operations.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

const BATCH_COLUMNS: &str = "id, kind, label, on_hand_hundredths, production_date, expiry_date, \
     minimum_hundredths, critical_hundredths, is_deleted, last_updated";

impl StockRepository {
    /// Creates a new StockRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    /// Inserts a new batch and its initial `in` movement in one transaction.
    pub async fn insert_batch(&self, new: &NewBatch, actor: &Actor) -> DbResult<StockBatch> {
        validate_new_batch(
            new.kind,
            &new.label,
            new.initial,
            new.minimum,
            new.critical,
            new.production_date,
            new.expiry_date,
        )
        .map_err(CoreError::from)?;

        let now = Utc::now();
        let batch = StockBatch {
            id: Uuid::new_v4().to_string(),
            kind: new.kind,
            label: new.label.clone(),
            on_hand_hundredths: new.initial.hundredths(),
            production_date: new.production_date,
            expiry_date: new.expiry_date,
            minimum_hundredths: new.minimum.hundredths(),
            critical_hundredths: new.critical.hundredths(),
            is_deleted: false,
            last_updated: now,
        };

        debug!(id = %batch.id, label = %batch.label, on_hand = %new.initial, "Inserting stock batch");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO stock_batches (
                id, kind, label, on_hand_hundredths,
                production_date, expiry_date,
                minimum_hundredths, critical_hundredths,
                is_deleted, last_updated
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&batch.id)
        .bind(batch.kind)
        .bind(&batch.label)
        .bind(batch.on_hand_hundredths)
        .bind(batch.production_date)
        .bind(batch.expiry_date)
        .bind(batch.minimum_hundredths)
        .bind(batch.critical_hundredths)
        .bind(batch.is_deleted)
        .bind(batch.last_updated)
        .execute(&mut *tx)
        .await?;

        if new.initial.is_positive() {
            // record the receipt against a zero-quantity view of the batch
            let mut empty = batch.clone();
            empty.on_hand_hundredths = 0;
            let movement = StockMovement::record(
                &empty,
                MovementKind::In,
                new.initial,
                format!("New batch - Added {} {}", new.initial, batch.label),
                actor,
                now,
            );
            insert_movement(&mut *tx, &movement).await?;
        }

        tx.commit().await?;

        Ok(batch)
    }

    /// Gets a batch by its ID, deleted or not.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<StockBatch>> {
        let batch = sqlx::query_as::<_, StockBatch>(&format!(
            "SELECT {BATCH_COLUMNS} FROM stock_batches WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(batch)
    }

    /// Non-deleted batches for a key, oldest production first (FIFO).
    pub async fn list_for_key(&self, key: &StockKey) -> DbResult<Vec<StockBatch>> {
        fetch_batches_fifo(&self.pool, key).await
    }

    /// Total on hand across all non-deleted batches of a key.
    pub async fn total_on_hand(&self, key: &StockKey) -> DbResult<BatchQty> {
        fetch_total_on_hand(&self.pool, key).await
    }

    /// All non-deleted batches, for the inventory screen.
    pub async fn list_active(&self) -> DbResult<Vec<StockBatch>> {
        let batches = sqlx::query_as::<_, StockBatch>(&format!(
            "SELECT {BATCH_COLUMNS} FROM stock_batches WHERE is_deleted = 0 \
             ORDER BY kind, label, production_date, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(batches)
    }

    /// Manual staff correction: applies a signed delta and records an
    /// `adjustment` movement in the same transaction.
    ///
    /// Order-driven changes must go through the Allocator instead.
    pub async fn adjust(
        &self,
        batch_id: &str,
        delta: BatchQty,
        reason: &str,
        actor: &Actor,
    ) -> DbResult<StockMovement> {
        let mut tx = self.pool.begin().await?;

        let batch = fetch_batch_for_update(&mut *tx, batch_id)
            .await?
            .ok_or_else(|| DbError::not_found("StockBatch", batch_id))?;

        let new_qty = batch.on_hand() + delta;
        if new_qty.is_negative() {
            return Err(CoreError::InsufficientStock {
                label: batch.label.clone(),
                available: batch.on_hand_hundredths,
                needed: delta.abs().hundredths(),
            }
            .into());
        }
        if batch.kind == StockKind::FixedSize && !new_qty.is_whole_units() {
            return Err(CoreError::Validation(
                bilao_core::ValidationError::FractionalFixedStock {
                    label: batch.label.clone(),
                    got: new_qty.hundredths(),
                },
            )
            .into());
        }

        let now = Utc::now();
        let movement = StockMovement::record(&batch, MovementKind::Adjustment, delta, reason, actor, now);

        apply_batch_quantity(&mut *tx, batch_id, new_qty, now).await?;
        insert_movement(&mut *tx, &movement).await?;

        tx.commit().await?;

        debug!(batch_id = %batch_id, delta = %delta, "Stock adjusted");
        Ok(movement)
    }

    /// Soft-deletes a batch: flags it, zeroes its quantity, and records a
    /// `deleted` movement writing off whatever was on hand.
    pub async fn soft_delete(&self, batch_id: &str, actor: &Actor) -> DbResult<StockMovement> {
        let mut tx = self.pool.begin().await?;

        let batch = fetch_batch_for_update(&mut *tx, batch_id)
            .await?
            .ok_or_else(|| DbError::not_found("StockBatch", batch_id))?;

        let now = Utc::now();
        let write_off = BatchQty::zero() - batch.on_hand();
        let movement = StockMovement::record(
            &batch,
            MovementKind::Deleted,
            write_off,
            format!("Batch deleted - Wrote off {} {}", batch.on_hand(), batch.label),
            actor,
            now,
        );

        sqlx::query(
            "UPDATE stock_batches SET is_deleted = 1, on_hand_hundredths = 0, last_updated = ?2 \
             WHERE id = ?1",
        )
        .bind(batch_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        insert_movement(&mut *tx, &movement).await?;

        tx.commit().await?;

        debug!(batch_id = %batch_id, "Stock batch soft-deleted");
        Ok(movement)
    }

    /// Movement history for one batch, oldest first.
    pub async fn movements_for_batch(&self, batch_id: &str) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            "SELECT id, batch_id, label, kind, delta_hundredths, previous_hundredths, \
                    new_hundredths, reason, actor, created_at \
             FROM stock_movements WHERE batch_id = ?1 ORDER BY created_at, id",
        )
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Most recent movements across all batches, newest first.
    pub async fn recent_movements(&self, limit: u32) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            "SELECT id, batch_id, label, kind, delta_hundredths, previous_hundredths, \
                    new_hundredths, reason, actor, created_at \
             FROM stock_movements ORDER BY created_at DESC, id DESC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Non-deleted batches at or below their minimum threshold.
    pub async fn below_minimum(&self) -> DbResult<Vec<StockBatch>> {
        let batches = sqlx::query_as::<_, StockBatch>(&format!(
            "SELECT {BATCH_COLUMNS} FROM stock_batches \
             WHERE is_deleted = 0 AND on_hand_hundredths <= minimum_hundredths \
             ORDER BY kind, label, production_date"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(batches)
    }

    /// Non-deleted batches at or below their critical threshold.
    pub async fn below_critical(&self) -> DbResult<Vec<StockBatch>> {
        let batches = sqlx::query_as::<_, StockBatch>(&format!(
            "SELECT {BATCH_COLUMNS} FROM stock_batches \
             WHERE is_deleted = 0 AND on_hand_hundredths <= critical_hundredths \
             ORDER BY kind, label, production_date"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(batches)
    }
}

// =============================================================================
// Transaction-Scoped Helpers
// =============================================================================
// The Allocator runs its two-phase walk inside one transaction and reuses
// these with `&mut *tx`; repository methods use them with the pool.

/// Non-deleted batches for a key, production date ascending, id as tiebreak.
///
/// Oldest-first ordering enforces first-expiry-first-out.
pub(crate) async fn fetch_batches_fifo<'e, E>(executor: E, key: &StockKey) -> DbResult<Vec<StockBatch>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let batches = sqlx::query_as::<_, StockBatch>(&format!(
        "SELECT {BATCH_COLUMNS} FROM stock_batches \
         WHERE kind = ?1 AND label = ?2 AND is_deleted = 0 \
         ORDER BY production_date ASC, id ASC"
    ))
    .bind(key.kind())
    .bind(key.label())
    .fetch_all(executor)
    .await?;

    Ok(batches)
}

/// Sum of on-hand quantity across a key's non-deleted batches.
pub(crate) async fn fetch_total_on_hand<'e, E>(executor: E, key: &StockKey) -> DbResult<BatchQty>
where
    E: Executor<'e, Database = Sqlite>,
{
    let total: Option<i64> = sqlx::query_scalar(
        "SELECT SUM(on_hand_hundredths) FROM stock_batches \
         WHERE kind = ?1 AND label = ?2 AND is_deleted = 0",
    )
    .bind(key.kind())
    .bind(key.label())
    .fetch_one(executor)
    .await?;

    Ok(BatchQty::from_hundredths(total.unwrap_or(0)))
}

/// Most recently updated non-deleted batch for a key.
///
/// Restoration policy: stock returns to the latest-touched batch, not to
/// the batch it was originally drawn from.
pub(crate) async fn fetch_latest_updated<'e, E>(
    executor: E,
    key: &StockKey,
) -> DbResult<Option<StockBatch>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let batch = sqlx::query_as::<_, StockBatch>(&format!(
        "SELECT {BATCH_COLUMNS} FROM stock_batches \
         WHERE kind = ?1 AND label = ?2 AND is_deleted = 0 \
         ORDER BY last_updated DESC, id DESC LIMIT 1"
    ))
    .bind(key.kind())
    .bind(key.label())
    .fetch_optional(executor)
    .await?;

    Ok(batch)
}

/// Reads one batch by id inside a transaction.
pub(crate) async fn fetch_batch_for_update<'e, E>(
    executor: E,
    batch_id: &str,
) -> DbResult<Option<StockBatch>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let batch = sqlx::query_as::<_, StockBatch>(&format!(
        "SELECT {BATCH_COLUMNS} FROM stock_batches WHERE id = ?1"
    ))
    .bind(batch_id)
    .fetch_optional(executor)
    .await?;

    Ok(batch)
}

/// Writes a batch's new quantity and bumps `last_updated`.
pub(crate) async fn apply_batch_quantity<'e, E>(
    executor: E,
    batch_id: &str,
    new_qty: BatchQty,
    at: chrono::DateTime<Utc>,
) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE stock_batches SET on_hand_hundredths = ?2, last_updated = ?3 WHERE id = ?1",
    )
    .bind(batch_id)
    .bind(new_qty.hundredths())
    .bind(at)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("StockBatch", batch_id));
    }

    Ok(())
}

/// Appends one movement row.
pub(crate) async fn insert_movement<'e, E>(executor: E, movement: &StockMovement) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO stock_movements (
            id, batch_id, label, kind,
            delta_hundredths, previous_hundredths, new_hundredths,
            reason, actor, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&movement.id)
    .bind(&movement.batch_id)
    .bind(&movement.label)
    .bind(movement.kind)
    .bind(movement.delta_hundredths)
    .bind(movement.previous_hundredths)
    .bind(movement.new_hundredths)
    .bind(&movement.reason)
    .bind(&movement.actor)
    .bind(movement.created_at)
    .execute(executor)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
