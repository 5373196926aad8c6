//! # Sales Ledger Repository
//!
//! Append-only sales records, written when an order completes.
//!
//! Daily and monthly totals are derived aggregates (SUM over the ledger),
//! never incrementing counters: concurrent completions each append their own
//! row and the totals stay consistent without read-modify-write.

use chrono::NaiveDate;
use sqlx::sqlite::Sqlite;
use sqlx::{Executor, SqlitePool};

use crate::error::DbResult;
use bilao_core::SalesEntry;

/// Repository for sales ledger reads.
#[derive(Debug, Clone)]
pub struct SalesRepository {
    pool: SqlitePool,
}

const SALES_COLUMNS: &str =
    "id, order_id, amount_cents, sold_on, sold_month, line_items, created_at";

impl SalesRepository {
    /// Creates a new SalesRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SalesRepository { pool }
    }

    /// The ledger entry for an order, if it has completed.
    pub async fn get_by_order(&self, order_id: &str) -> DbResult<Option<SalesEntry>> {
        let entry = sqlx::query_as::<_, SalesEntry>(&format!(
            "SELECT {SALES_COLUMNS} FROM sales_ledger WHERE order_id = ?1"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    /// All entries for one day, oldest first.
    pub async fn list_for_day(&self, day: NaiveDate) -> DbResult<Vec<SalesEntry>> {
        let entries = sqlx::query_as::<_, SalesEntry>(&format!(
            "SELECT {SALES_COLUMNS} FROM sales_ledger WHERE sold_on = ?1 ORDER BY created_at, id"
        ))
        .bind(day)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Total centavos sold on one day.
    pub async fn daily_total_cents(&self, day: NaiveDate) -> DbResult<i64> {
        let total: Option<i64> =
            sqlx::query_scalar("SELECT SUM(amount_cents) FROM sales_ledger WHERE sold_on = ?1")
                .bind(day)
                .fetch_one(&self.pool)
                .await?;

        Ok(total.unwrap_or(0))
    }

    /// Total centavos sold in one `YYYY-MM` month.
    pub async fn monthly_total_cents(&self, month: &str) -> DbResult<i64> {
        let total: Option<i64> =
            sqlx::query_scalar("SELECT SUM(amount_cents) FROM sales_ledger WHERE sold_month = ?1")
                .bind(month)
                .fetch_one(&self.pool)
                .await?;

        Ok(total.unwrap_or(0))
    }

    /// Most recent entries, newest first.
    pub async fn recent(&self, limit: u32) -> DbResult<Vec<SalesEntry>> {
        let entries = sqlx::query_as::<_, SalesEntry>(&format!(
            "SELECT {SALES_COLUMNS} FROM sales_ledger ORDER BY created_at DESC, id DESC LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}

// =============================================================================
// Crate-Private Writer (lifecycle only)
// =============================================================================

/// Appends one ledger entry in the caller's transaction.
///
/// The UNIQUE constraint on `order_id` makes double-completion impossible
/// even if a retried transition replays this insert.
pub(crate) async fn insert_entry<'e, E>(executor: E, entry: &SalesEntry) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO sales_ledger (
            id, order_id, amount_cents, sold_on, sold_month, line_items, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.order_id)
    .bind(entry.amount_cents)
    .bind(entry.sold_on)
    .bind(&entry.sold_month)
    .bind(&entry.line_items)
    .bind(entry.created_at)
    .execute(executor)
    .await?;

    Ok(())
}
