//! # Domain Types
//!
//! Core domain types for the inventory allocation and order-fulfillment
//! engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   StockBatch    │   │  StockMovement  │   │     Order       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  kind + label   │   │  batch_id (FK)  │   │  status         │       │
//! │  │  on_hand        │   │  delta          │   │  payment_status │       │
//! │  │  prod/expiry    │   │  prev/new       │   │  pickup window  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   Reservation   │   │   SalesEntry    │   │   OrderItem     │       │
//! │  │  advisory hold  │   │  append-only    │   │  size+varieties │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Ownership: the stock ledger exclusively owns `StockBatch.on_hand`; all
//! mutation passes through the allocator. Orders own their own fields but
//! the lifecycle is the only writer of `status`/`payment_status`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::quantity::BatchQty;
use crate::status::{OrderStatus, PaymentMethod, PaymentStatus};

// =============================================================================
// Stock Key
// =============================================================================

/// Discriminator for the two stock pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum StockKind {
    /// Fractional bilao stock for one kakanin variety.
    Variety,
    /// Whole-unit stock for one fixed-size format (Small/Solo Bibingka).
    FixedSize,
}

/// Identifies one stock pool: a variety's bilao stock or a fixed size's
/// whole-unit stock.
///
/// `Ord` so demand maps iterate deterministically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StockKey {
    /// Bilao stock for a variety, e.g. `Variety("Kutsinta")`.
    Variety(String),
    /// Whole-unit stock for a size, e.g. `FixedSize("Small")`.
    FixedSize(String),
}

impl StockKey {
    /// Creates a variety key.
    pub fn variety(name: impl Into<String>) -> Self {
        StockKey::Variety(name.into())
    }

    /// Creates a fixed-size key.
    pub fn fixed_size(name: impl Into<String>) -> Self {
        StockKey::FixedSize(name.into())
    }

    /// The pool discriminator.
    #[inline]
    pub const fn kind(&self) -> StockKind {
        match self {
            StockKey::Variety(_) => StockKind::Variety,
            StockKey::FixedSize(_) => StockKind::FixedSize,
        }
    }

    /// The variety or size name.
    #[inline]
    pub fn label(&self) -> &str {
        match self {
            StockKey::Variety(label) | StockKey::FixedSize(label) => label,
        }
    }
}

impl fmt::Display for StockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StockKey::Variety(label) => write!(f, "{label}"),
            StockKey::FixedSize(label) => write!(f, "{label} (fixed size)"),
        }
    }
}

// =============================================================================
// Stock Batch
// =============================================================================

/// One production run of stock for a variety or fixed-size format.
///
/// Invariant: `on_hand_hundredths >= 0` at all times. A batch is never
/// hard-deleted while movement history references it; deletion is the
/// `is_deleted` flag plus a `deleted` movement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockBatch {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Which pool this batch belongs to.
    pub kind: StockKind,

    /// Variety name (`kind = Variety`) or size name (`kind = FixedSize`).
    pub label: String,

    /// Quantity on hand in hundredths of a bilao.
    /// Fixed-size batches hold whole multiples of 100.
    pub on_hand_hundredths: i64,

    /// When this batch was produced. Drives FIFO ordering.
    pub production_date: NaiveDate,

    /// When this batch expires.
    pub expiry_date: NaiveDate,

    /// Reorder threshold in hundredths.
    pub minimum_hundredths: i64,

    /// Critical threshold in hundredths.
    pub critical_hundredths: i64,

    /// Soft-delete flag.
    pub is_deleted: bool,

    /// Last mutation time. Restoration targets the most recent.
    pub last_updated: DateTime<Utc>,
}

impl StockBatch {
    /// Quantity on hand as a typed quantity.
    #[inline]
    pub fn on_hand(&self) -> BatchQty {
        BatchQty::from_hundredths(self.on_hand_hundredths)
    }

    /// The batch's stock key.
    pub fn key(&self) -> StockKey {
        match self.kind {
            StockKind::Variety => StockKey::Variety(self.label.clone()),
            StockKind::FixedSize => StockKey::FixedSize(self.label.clone()),
        }
    }

    /// At or below the reorder threshold.
    #[inline]
    pub fn is_below_minimum(&self) -> bool {
        self.on_hand_hundredths <= self.minimum_hundredths
    }

    /// At or below the critical threshold.
    #[inline]
    pub fn is_below_critical(&self) -> bool {
        self.on_hand_hundredths <= self.critical_hundredths
    }

    /// Shelf-life status relative to `today`.
    pub fn expiry_status(&self, today: NaiveDate) -> ExpiryStatus {
        if self.expiry_date < today {
            ExpiryStatus::Expired
        } else if (self.expiry_date - today).num_days() <= 3 {
            ExpiryStatus::ExpiringSoon
        } else {
            ExpiryStatus::Fresh
        }
    }
}

/// Shelf-life status for dashboard alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryStatus {
    Fresh,
    /// Expires within three days.
    ExpiringSoon,
    Expired,
}

// =============================================================================
// Stock Movement
// =============================================================================

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    /// Stock added (production run, restoration).
    In,
    /// Stock deducted (order fulfillment).
    Out,
    /// Manual correction by staff.
    Adjustment,
    /// Batch soft-deleted; records the quantity written off.
    Deleted,
}

/// Append-only audit record of one batch mutation.
///
/// Immutable once written; a correction is a new movement, never an edit.
/// Invariant: `new = previous + delta` (`out` rows carry a negative delta).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockMovement {
    pub id: String,
    pub batch_id: String,
    /// Variety or size name, denormalized for history views.
    pub label: String,
    pub kind: MovementKind,
    /// Signed change in hundredths.
    pub delta_hundredths: i64,
    pub previous_hundredths: i64,
    pub new_hundredths: i64,
    /// Why the movement happened, e.g. `Order pickup - Order ID: ...`.
    pub reason: String,
    /// Who triggered it; recorded, never evaluated.
    pub actor: String,
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    /// Builds a movement against a batch's current quantity.
    ///
    /// The previous/new pair is derived here so the arithmetic invariant
    /// holds by construction.
    pub fn record(
        batch: &StockBatch,
        kind: MovementKind,
        delta: BatchQty,
        reason: impl Into<String>,
        actor: &Actor,
        at: DateTime<Utc>,
    ) -> Self {
        StockMovement {
            id: uuid::Uuid::new_v4().to_string(),
            batch_id: batch.id.clone(),
            label: batch.label.clone(),
            kind,
            delta_hundredths: delta.hundredths(),
            previous_hundredths: batch.on_hand_hundredths,
            new_hundredths: batch.on_hand_hundredths + delta.hundredths(),
            reason: reason.into(),
            actor: actor.id.clone(),
            created_at: at,
        }
    }

    /// The signed delta as a typed quantity.
    #[inline]
    pub fn delta(&self) -> BatchQty {
        BatchQty::from_hundredths(self.delta_hundredths)
    }
}

// =============================================================================
// Order
// =============================================================================

/// A customer order. Created at checkout; mutated only through the
/// lifecycle; never deleted (cancellation is a terminal status).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub customer_name: String,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    /// GCash transfer reference, when paid by GCash.
    pub gcash_reference: Option<String>,
    /// Pickup date strictly after the creation date.
    pub is_scheduled: bool,
    pub pickup_date: NaiveDate,
    /// Free-form window label, e.g. "10:00 AM".
    pub pickup_time: String,
    pub total_cents: i64,
    /// Set once the allocator has deducted this order's stock; guards both
    /// double deduction and restore-on-cancel.
    pub stock_deducted: bool,
    /// Hold ids while a scheduled order's reservation is live.
    pub reservation_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line item in an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    /// Size name, resolved against the catalog.
    pub size: String,
    /// Selected variety names.
    pub varieties: Vec<String>,
    pub quantity: i64,
    /// Price at checkout time, in centavos.
    pub unit_price_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    /// Line total before any discount.
    #[inline]
    pub fn line_total_cents(&self) -> i64 {
        self.unit_price_cents * self.quantity
    }
}

/// Checkout request: what the storefront or walk-in counter submits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDraft {
    pub customer_name: String,
    pub items: Vec<DraftItem>,
    pub payment_method: PaymentMethod,
    pub gcash_reference: Option<String>,
    pub pickup_date: NaiveDate,
    pub pickup_time: String,
}

/// One requested line before validation and pricing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftItem {
    pub size: String,
    pub varieties: Vec<String>,
    pub quantity: i64,
}

/// Whether a pickup date makes an order scheduled (day granularity).
#[inline]
pub fn is_scheduled_pickup(created_on: NaiveDate, pickup_date: NaiveDate) -> bool {
    pickup_date > created_on
}

// =============================================================================
// Reservation
// =============================================================================

/// An advisory hold linking a scheduled order to future stock.
///
/// Holds never mutate `on_hand`; they are consulted by availability checks
/// for other scheduled orders targeting the same pickup date, and do not
/// block walk-in orders from depleting the same pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Reservation {
    pub id: String,
    pub order_id: String,
    pub kind: StockKind,
    pub label: String,
    pub qty_hundredths: i64,
    pub pickup_date: NaiveDate,
    pub pickup_time: String,
    /// Tracks the owning order's status for the dashboard.
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    /// Held quantity as a typed quantity.
    #[inline]
    pub fn qty(&self) -> BatchQty {
        BatchQty::from_hundredths(self.qty_hundredths)
    }
}

// =============================================================================
// Sales Ledger
// =============================================================================

/// Append-only sales ledger entry, written when an order completes.
///
/// Daily and monthly totals are derived by summing entries per bucket,
/// never by incrementing a shared counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SalesEntry {
    pub id: String,
    pub order_id: String,
    pub amount_cents: i64,
    /// Day bucket.
    pub sold_on: NaiveDate,
    /// Month bucket, `YYYY-MM`.
    pub sold_month: String,
    /// JSON snapshot of the order's line items.
    pub line_items: String,
    pub created_at: DateTime<Utc>,
}

impl SalesEntry {
    /// The `YYYY-MM` bucket for a day.
    pub fn month_bucket(date: NaiveDate) -> String {
        date.format("%Y-%m").to_string()
    }
}

/// One line of a sales entry's JSON snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesLineItem {
    pub size: String,
    pub varieties: Vec<String>,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

impl From<&OrderItem> for SalesLineItem {
    fn from(item: &OrderItem) -> Self {
        SalesLineItem {
            size: item.size.clone(),
            varieties: item.varieties.clone(),
            quantity: item.quantity,
            unit_price_cents: item.unit_price_cents,
        }
    }
}

// =============================================================================
// Actor
// =============================================================================

/// Who performed an operation. Supplied by the auth gate; the engine only
/// records it on movements, never evaluates permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: String,
}

impl Actor {
    /// The automated order-system actor.
    pub fn system() -> Self {
        Actor {
            id: "Order System".to_string(),
            role: "system".to_string(),
        }
    }

    /// A named staff actor.
    pub fn staff(id: impl Into<String>) -> Self {
        Actor {
            id: id.into(),
            role: "staff".to_string(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
