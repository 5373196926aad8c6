//! # Reservation Repository
//!
//! Advisory stock holds for scheduled orders.
//!
//! ## Semantics
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  A hold never mutates on-hand stock. It is consulted when ANOTHER       │
//! │  scheduled order targeting the same pickup date checks availability,    │
//! │  so two future orders don't both promise the last bilao of a variety.   │
//! │                                                                         │
//! │  Walk-in/regular orders ignore holds entirely and may still deplete     │
//! │  the pool first. This is a documented trade-off, not a lock.            │
//! │                                                                         │
//! │  Release is idempotent: releasing a missing reservation is a no-op.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Holds are created and released only by the order lifecycle.

use chrono::NaiveDate;
use sqlx::sqlite::Sqlite;
use sqlx::{Executor, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use bilao_core::{BatchQty, OrderStatus, Reservation, StockKey};

/// Repository for reservation reads.
#[derive(Debug, Clone)]
pub struct ReservationRepository {
    pool: SqlitePool,
}

const RESERVATION_COLUMNS: &str =
    "id, order_id, kind, label, qty_hundredths, pickup_date, pickup_time, status, created_at";

impl ReservationRepository {
    /// Creates a new ReservationRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReservationRepository { pool }
    }

    /// All live holds for an order.
    pub async fn list_for_order(&self, order_id: &str) -> DbResult<Vec<Reservation>> {
        let holds = sqlx::query_as::<_, Reservation>(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE order_id = ?1 ORDER BY label"
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(holds)
    }

    /// All holds targeting one pickup date, for the planning screen.
    pub async fn list_for_date(&self, pickup_date: NaiveDate) -> DbResult<Vec<Reservation>> {
        let holds = sqlx::query_as::<_, Reservation>(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE pickup_date = ?1 \
             ORDER BY pickup_time, label"
        ))
        .bind(pickup_date)
        .fetch_all(&self.pool)
        .await?;

        Ok(holds)
    }

    /// Total held quantity for a key on a pickup date.
    pub async fn held_for_key_on_date(
        &self,
        key: &StockKey,
        pickup_date: NaiveDate,
    ) -> DbResult<BatchQty> {
        sum_held(&self.pool, key, pickup_date, None).await
    }
}

// =============================================================================
// Crate-Private Writers (lifecycle only)
// =============================================================================

/// Appends one hold row.
pub(crate) async fn insert_hold<'e, E>(executor: E, hold: &Reservation) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO reservations (
            id, order_id, kind, label, qty_hundredths,
            pickup_date, pickup_time, status, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&hold.id)
    .bind(&hold.order_id)
    .bind(hold.kind)
    .bind(&hold.label)
    .bind(hold.qty_hundredths)
    .bind(hold.pickup_date)
    .bind(&hold.pickup_time)
    .bind(hold.status)
    .bind(hold.created_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// Deletes every hold for an order. Idempotent: zero rows is fine.
///
/// `terminal_status` is only logged; holds are removed, not flagged.
pub(crate) async fn release_holds<'e, E>(
    executor: E,
    order_id: &str,
    terminal_status: OrderStatus,
) -> DbResult<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM reservations WHERE order_id = ?1")
        .bind(order_id)
        .execute(executor)
        .await?;

    let released = result.rows_affected();
    if released == 0 {
        debug!(order_id = %order_id, "Release on missing reservation, no-op");
    } else {
        debug!(order_id = %order_id, released, status = %terminal_status, "Reservation released");
    }

    Ok(released)
}

/// Keeps hold rows in step with the owning order's status.
pub(crate) async fn update_holds_status<'e, E>(
    executor: E,
    order_id: &str,
    status: OrderStatus,
) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("UPDATE reservations SET status = ?2 WHERE order_id = ?1")
        .bind(order_id)
        .bind(status)
        .execute(executor)
        .await?;

    Ok(())
}

/// Sum of held quantity for a key on one pickup date, optionally excluding
/// an order's own holds (an order never competes with itself).
pub(crate) async fn sum_held<'e, E>(
    executor: E,
    key: &StockKey,
    pickup_date: NaiveDate,
    exclude_order_id: Option<&str>,
) -> DbResult<BatchQty>
where
    E: Executor<'e, Database = Sqlite>,
{
    let total: Option<i64> = sqlx::query_scalar(
        "SELECT SUM(qty_hundredths) FROM reservations \
         WHERE kind = ?1 AND label = ?2 AND pickup_date = ?3 \
           AND (?4 IS NULL OR order_id <> ?4)",
    )
    .bind(key.kind())
    .bind(key.label())
    .bind(pickup_date)
    .bind(exclude_order_id)
    .fetch_one(executor)
    .await?;

    Ok(BatchQty::from_hundredths(total.unwrap_or(0)))
}
