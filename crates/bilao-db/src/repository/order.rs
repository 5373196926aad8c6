//! # Order Repository
//!
//! Database operations for orders and their line items.
//!
//! ## Ownership
//! Orders are created by the lifecycle's checkout and mutated only through
//! lifecycle transitions: the status/payment/reservation writers below are
//! crate-private so no caller outside this crate can move an order without
//! going through the state machine.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::Sqlite;
use sqlx::{Executor, FromRow, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use bilao_core::{Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus};

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

const ORDER_COLUMNS: &str = "id, customer_name, status, payment_method, payment_status, \
     gcash_reference, is_scheduled, pickup_date, pickup_time, total_cents, stock_deducted, \
     reservation_ids, created_at, updated_at";

/// Raw order row; `reservation_ids` is a JSON array column.
#[derive(Debug, FromRow)]
struct OrderRow {
    id: String,
    customer_name: String,
    status: OrderStatus,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    gcash_reference: Option<String>,
    is_scheduled: bool,
    pickup_date: NaiveDate,
    pickup_time: String,
    total_cents: i64,
    stock_deducted: bool,
    reservation_ids: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self) -> DbResult<Order> {
        let reservation_ids: Vec<String> = serde_json::from_str(&self.reservation_ids)?;
        Ok(Order {
            id: self.id,
            customer_name: self.customer_name,
            status: self.status,
            payment_method: self.payment_method,
            payment_status: self.payment_status,
            gcash_reference: self.gcash_reference,
            is_scheduled: self.is_scheduled,
            pickup_date: self.pickup_date,
            pickup_time: self.pickup_time,
            total_cents: self.total_cents,
            stock_deducted: self.stock_deducted,
            reservation_ids,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Raw item row; `varieties` is a JSON array column.
#[derive(Debug, FromRow)]
struct OrderItemRow {
    id: String,
    order_id: String,
    size: String,
    varieties: String,
    quantity: i64,
    unit_price_cents: i64,
    created_at: DateTime<Utc>,
}

impl OrderItemRow {
    fn into_item(self) -> DbResult<OrderItem> {
        let varieties: Vec<String> = serde_json::from_str(&self.varieties)?;
        Ok(OrderItem {
            id: self.id,
            order_id: self.order_id,
            size: self.size,
            varieties,
            quantity: self.quantity,
            unit_price_cents: self.unit_price_cents,
            created_at: self.created_at,
        })
    }
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Gets an order by ID (without items).
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        fetch_order(&self.pool, id).await
    }

    /// Gets all items for an order.
    pub async fn get_items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        fetch_order_items(&self.pool, order_id).await
    }

    /// Lists orders in a given status, newest first.
    pub async fn list_by_status(&self, status: OrderStatus) -> DbResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE status = ?1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(OrderRow::into_order).collect()
    }

    /// Lists orders awaiting payment verification, oldest first.
    pub async fn list_pending_verification(&self) -> DbResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE payment_status = ?1 \
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(PaymentStatus::Pending)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(OrderRow::into_order).collect()
    }
}

// =============================================================================
// Crate-Private Writers (lifecycle only)
// =============================================================================

/// Inserts an order and its items in the caller's transaction.
pub(crate) async fn insert_order<'e, E>(executor: E, order: &Order) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    debug!(id = %order.id, customer = %order.customer_name, "Inserting order");

    sqlx::query(
        r#"
        INSERT INTO orders (
            id, customer_name, status, payment_method, payment_status,
            gcash_reference, is_scheduled, pickup_date, pickup_time,
            total_cents, stock_deducted, reservation_ids, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        "#,
    )
    .bind(&order.id)
    .bind(&order.customer_name)
    .bind(order.status)
    .bind(order.payment_method)
    .bind(order.payment_status)
    .bind(&order.gcash_reference)
    .bind(order.is_scheduled)
    .bind(order.pickup_date)
    .bind(&order.pickup_time)
    .bind(order.total_cents)
    .bind(order.stock_deducted)
    .bind(serde_json::to_string(&order.reservation_ids)?)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// Inserts one order item.
pub(crate) async fn insert_order_item<'e, E>(executor: E, item: &OrderItem) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO order_items (
            id, order_id, size, varieties, quantity, unit_price_cents, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&item.id)
    .bind(&item.order_id)
    .bind(&item.size)
    .bind(serde_json::to_string(&item.varieties)?)
    .bind(item.quantity)
    .bind(item.unit_price_cents)
    .bind(item.created_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// Reads one order.
pub(crate) async fn fetch_order<'e, E>(executor: E, id: &str) -> DbResult<Option<Order>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?;

    row.map(OrderRow::into_order).transpose()
}

/// Reads an order's items, oldest first.
pub(crate) async fn fetch_order_items<'e, E>(executor: E, order_id: &str) -> DbResult<Vec<OrderItem>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, OrderItemRow>(
        "SELECT id, order_id, size, varieties, quantity, unit_price_cents, created_at \
         FROM order_items WHERE order_id = ?1 ORDER BY created_at, id",
    )
    .bind(order_id)
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(OrderItemRow::into_item).collect()
}

/// Writes a status change. Only the lifecycle calls this, after validating
/// the transition.
pub(crate) async fn update_status<'e, E>(
    executor: E,
    order_id: &str,
    status: OrderStatus,
    at: DateTime<Utc>,
) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE orders SET status = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(order_id)
        .bind(status)
        .bind(at)
        .execute(executor)
        .await?;

    if result.rows_affected() == 0 {
        return Err(crate::error::DbError::not_found("Order", order_id));
    }

    Ok(())
}

/// Writes a payment-status change. Only the lifecycle calls this.
pub(crate) async fn update_payment_status<'e, E>(
    executor: E,
    order_id: &str,
    status: PaymentStatus,
    at: DateTime<Utc>,
) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result =
        sqlx::query("UPDATE orders SET payment_status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(order_id)
            .bind(status)
            .bind(at)
            .execute(executor)
            .await?;

    if result.rows_affected() == 0 {
        return Err(crate::error::DbError::not_found("Order", order_id));
    }

    Ok(())
}

/// Marks whether this order's stock has been deducted.
pub(crate) async fn update_stock_deducted<'e, E>(
    executor: E,
    order_id: &str,
    deducted: bool,
    at: DateTime<Utc>,
) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("UPDATE orders SET stock_deducted = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(order_id)
        .bind(deducted)
        .bind(at)
        .execute(executor)
        .await?;

    Ok(())
}

/// Replaces the order's reservation hold ids.
pub(crate) async fn update_reservation_ids<'e, E>(
    executor: E,
    order_id: &str,
    reservation_ids: &[String],
    at: DateTime<Utc>,
) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("UPDATE orders SET reservation_ids = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(order_id)
        .bind(serde_json::to_string(reservation_ids)?)
        .bind(at)
        .execute(executor)
        .await?;

    Ok(())
}
