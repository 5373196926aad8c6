//! # Order Lifecycle
//!
//! The order state machine's orchestrator: validates requested transitions
//! against the flow tables in bilao-core, then runs the side effects each
//! transition demands.
//!
//! ## Transition Side Effects
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  checkout            validate items, price, derive scheduled flag;     │
//! │                      fixed-size regular orders deduct immediately      │
//! │  → StockReserved     (scheduled) availability check minus other        │
//! │                      same-date holds, then create advisory holds       │
//! │  → ReadyForPickup    availability pre-check for EVERY demand, then     │
//! │                      allocate per key; mid-order race rolls back       │
//! │                      already-committed keys with compensating restores │
//! │  → Completed         append sales-ledger entry, release reservation    │
//! │  → Cancelled         restore deducted stock, release reservation       │
//! │                      unconditionally, notify                           │
//! │                                                                         │
//! │  Payment gating: not past OrderConfirmed until payment is approved;    │
//! │  rejection forces Cancelled through the same release path.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A blocked transition leaves the order and the ledger exactly as they
//! were: pre-checks run before any write, and every write block is one
//! transaction.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::allocator::Allocator;
use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::batch::StockRepository;
use crate::repository::{order as order_repo, reservation as reservation_repo, sales as sales_repo};
use bilao_core::{
    catalog::size_by_name,
    deduction::{aggregate_demands, item_demands},
    validation::validate_draft_items,
    Actor, BatchQty, CoreError, Notifier, NotifyKind, Order, OrderDraft, OrderItem, OrderStatus,
    PaymentStatus, Reservation, SalesEntry, SalesLineItem, SizeClass, StockKey,
};

/// Drives orders through their status flow and owns every status write.
#[derive(Clone)]
pub struct OrderLifecycle {
    pool: SqlitePool,
    allocator: Allocator,
    notifier: Arc<dyn Notifier>,
}

impl Database {
    /// Builds the lifecycle service on this database.
    pub fn lifecycle(&self, notifier: Arc<dyn Notifier>) -> OrderLifecycle {
        OrderLifecycle::new(self.pool().clone(), notifier)
    }
}

impl OrderLifecycle {
    /// Creates a new lifecycle service.
    pub fn new(pool: SqlitePool, notifier: Arc<dyn Notifier>) -> Self {
        let allocator = Allocator::new(pool.clone());
        OrderLifecycle {
            pool,
            allocator,
            notifier,
        }
    }

    /// The allocator this lifecycle drives.
    pub fn allocator(&self) -> &Allocator {
        &self.allocator
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Accepts a draft order: validates every item against the catalog,
    /// prices it, derives the scheduled flag, and persists it as
    /// `OrderConfirmed`.
    ///
    /// Regular orders made up entirely of fixed-size items (non-perishable
    /// formats) with settled payment consume their stock here, at
    /// confirmation time, instead of waiting for `ReadyForPickup`.
    pub async fn checkout(&self, draft: &OrderDraft, actor: &Actor) -> DbResult<Order> {
        validate_draft_items(&draft.items)?;

        let now = Utc::now();
        let order_id = Uuid::new_v4().to_string();

        let mut items = Vec::with_capacity(draft.items.len());
        let mut total_cents = 0i64;
        let mut all_fixed_size = true;
        for requested in &draft.items {
            let size = size_by_name(&requested.size)?;
            if size.class != SizeClass::FixedUnit {
                all_fixed_size = false;
            }
            let item = OrderItem {
                id: Uuid::new_v4().to_string(),
                order_id: order_id.clone(),
                size: size.name.to_string(),
                varieties: requested.varieties.clone(),
                quantity: requested.quantity,
                unit_price_cents: size.unit_price_cents,
                created_at: now,
            };
            total_cents += item.line_total_cents();
            items.push(item);
        }

        let is_scheduled =
            bilao_core::is_scheduled_pickup(now.date_naive(), draft.pickup_date);
        let payment_status = draft.payment_method.initial_payment_status();

        let order = Order {
            id: order_id.clone(),
            customer_name: draft.customer_name.trim().to_string(),
            status: OrderStatus::OrderConfirmed,
            payment_method: draft.payment_method,
            payment_status,
            gcash_reference: draft.gcash_reference.clone(),
            is_scheduled,
            pickup_date: draft.pickup_date,
            pickup_time: draft.pickup_time.clone(),
            total_cents,
            stock_deducted: false,
            reservation_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        let deduct_now = !is_scheduled
            && all_fixed_size
            && payment_status == PaymentStatus::Approved;

        let demands = if deduct_now {
            // fail checkout before any write when the shelves can't cover it
            let demands = order_demands(&items)?;
            self.precheck_availability(&order_id, &demands).await?;
            Some(demands)
        } else {
            None
        };

        let mut tx = self.pool.begin().await?;
        order_repo::insert_order(&mut *tx, &order).await?;
        for item in &items {
            order_repo::insert_order_item(&mut *tx, item).await?;
        }
        tx.commit().await?;

        info!(
            order_id = %order.id,
            total_cents = order.total_cents,
            scheduled = order.is_scheduled,
            "Order checked out"
        );

        if let Some(demands) = &demands {
            if let Err(err) = self.allocate_order_stock(&order, demands, actor).await {
                // lost a race after the pre-check: the order cannot be
                // fulfilled, leave it cancelled rather than half-confirmed
                warn!(order_id = %order.id, %err, "Confirmation-time deduction failed, cancelling");
                self.force_cancel(&order.id, actor).await?;
                return Err(err);
            }
            let now = Utc::now();
            order_repo::update_stock_deducted(&self.pool, &order.id, true, now).await?;
        }

        self.require_order(&order_id).await.map(|(order, _)| order)
    }

    // =========================================================================
    // Payment Verification
    // =========================================================================

    /// Marks a pending payment approved. No-op when already verified.
    pub async fn approve_payment(&self, order_id: &str, actor: &Actor) -> DbResult<Order> {
        let (order, _) = self.require_order(order_id).await?;

        if order.payment_status != PaymentStatus::Pending {
            debug!(order_id, status = ?order.payment_status, "Payment already verified, no-op");
            return Ok(order);
        }

        order_repo::update_payment_status(&self.pool, order_id, PaymentStatus::Approved, Utc::now())
            .await?;
        info!(order_id, by = %actor.id, "Payment approved");

        self.require_order(order_id).await.map(|(order, _)| order)
    }

    /// Marks a pending payment rejected and forces the order to
    /// `Cancelled`, releasing any reservation on the way.
    pub async fn reject_payment(&self, order_id: &str, actor: &Actor) -> DbResult<Order> {
        let (order, _) = self.require_order(order_id).await?;

        if order.payment_status != PaymentStatus::Pending {
            debug!(order_id, status = ?order.payment_status, "Payment already verified, no-op");
            return Ok(order);
        }

        order_repo::update_payment_status(&self.pool, order_id, PaymentStatus::Rejected, Utc::now())
            .await?;
        warn!(order_id, by = %actor.id, "Payment rejected, cancelling order");

        if order.status.is_terminal() {
            return self.require_order(order_id).await.map(|(order, _)| order);
        }
        self.transition(order_id, OrderStatus::Cancelled, actor).await
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Moves an order to `to`, running the transition's side effects.
    ///
    /// Validates against the regular/scheduled flow table first; an illegal
    /// move surfaces `InvalidTransition` with nothing written.
    pub async fn transition(
        &self,
        order_id: &str,
        to: OrderStatus,
        actor: &Actor,
    ) -> DbResult<Order> {
        let (order, items) = self.require_order(order_id).await?;

        order.status.validate_transition(to, order.is_scheduled)?;

        // payment gating: only cancellation may bypass verification
        if to != OrderStatus::Cancelled && order.payment_status != PaymentStatus::Approved {
            return Err(CoreError::PaymentNotApproved {
                order_id: order.id.clone(),
            }
            .into());
        }

        debug!(order_id, from = %order.status, to = %to, "Order transition");

        match to {
            OrderStatus::StockReserved => self.enter_stock_reserved(&order, &items).await?,
            OrderStatus::ReadyForPickup => {
                self.enter_ready_for_pickup(&order, &items, actor).await?
            }
            OrderStatus::Completed => self.enter_completed(&order, &items).await?,
            OrderStatus::Cancelled => self.enter_cancelled(&order, &items, actor).await?,
            OrderStatus::OrderConfirmed | OrderStatus::PreparingOrder => {
                self.write_status(&order, to).await?
            }
        }

        self.require_order(order_id).await.map(|(order, _)| order)
    }

    /// Scheduled orders only: record advisory holds after checking the pool
    /// minus other orders' same-date holds.
    async fn enter_stock_reserved(&self, order: &Order, items: &[OrderItem]) -> DbResult<()> {
        let demands = order_demands(items)?;

        let mut shortfalls = Vec::new();
        for (key, qty) in &demands {
            let availability = self
                .allocator
                .check_availability_for_schedule(key, *qty, order.pickup_date, Some(&order.id))
                .await?;
            if !availability.is_available() {
                shortfalls.push((key.clone(), availability));
            }
        }
        if let Some((key, availability)) = self.report_shortfalls(&order.id, &shortfalls) {
            return Err(CoreError::InsufficientStock {
                label: key.label().to_string(),
                available: availability.on_hand.hundredths(),
                needed: availability.needed.hundredths(),
            }
            .into());
        }

        let now = Utc::now();
        let mut hold_ids = Vec::with_capacity(demands.len());
        let mut tx = self.pool.begin().await?;
        for (key, qty) in &demands {
            let hold = Reservation {
                id: Uuid::new_v4().to_string(),
                order_id: order.id.clone(),
                kind: key.kind(),
                label: key.label().to_string(),
                qty_hundredths: qty.hundredths(),
                pickup_date: order.pickup_date,
                pickup_time: order.pickup_time.clone(),
                status: OrderStatus::StockReserved,
                created_at: now,
            };
            reservation_repo::insert_hold(&mut *tx, &hold).await?;
            hold_ids.push(hold.id);
        }
        order_repo::update_reservation_ids(&mut *tx, &order.id, &hold_ids, now).await?;
        order_repo::update_status(&mut *tx, &order.id, OrderStatus::StockReserved, now).await?;
        tx.commit().await?;

        info!(order_id = %order.id, holds = hold_ids.len(), "Stock reserved");
        Ok(())
    }

    /// All-or-nothing across the whole order: pre-check every aggregated
    /// demand, then allocate per key, compensating on a mid-order race.
    /// Skipped when stock was already deducted at confirmation time.
    async fn enter_ready_for_pickup(
        &self,
        order: &Order,
        items: &[OrderItem],
        actor: &Actor,
    ) -> DbResult<()> {
        if order.stock_deducted {
            debug!(order_id = %order.id, "Stock already deducted at confirmation");
            return self.write_status(order, OrderStatus::ReadyForPickup).await;
        }

        let demands = order_demands(items)?;
        self.precheck_availability(&order.id, &demands).await?;
        self.allocate_order_stock(order, &demands, actor).await?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        order_repo::update_status(&mut *tx, &order.id, OrderStatus::ReadyForPickup, now).await?;
        order_repo::update_stock_deducted(&mut *tx, &order.id, true, now).await?;
        if order.is_scheduled {
            reservation_repo::update_holds_status(&mut *tx, &order.id, OrderStatus::ReadyForPickup)
                .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    /// Append the sales-ledger entry and release any reservation, in one
    /// transaction with the status write.
    async fn enter_completed(&self, order: &Order, items: &[OrderItem]) -> DbResult<()> {
        let now = Utc::now();
        let sold_on = now.date_naive();
        let line_items: Vec<SalesLineItem> = items.iter().map(SalesLineItem::from).collect();
        let entry = SalesEntry {
            id: Uuid::new_v4().to_string(),
            order_id: order.id.clone(),
            amount_cents: order.total_cents,
            sold_on,
            sold_month: SalesEntry::month_bucket(sold_on),
            line_items: serde_json::to_string(&line_items)?,
            created_at: now,
        };

        let mut tx = self.pool.begin().await?;
        order_repo::update_status(&mut *tx, &order.id, OrderStatus::Completed, now).await?;
        sales_repo::insert_entry(&mut *tx, &entry).await?;
        if order.is_scheduled {
            reservation_repo::release_holds(&mut *tx, &order.id, OrderStatus::Completed).await?;
            order_repo::update_reservation_ids(&mut *tx, &order.id, &[], now).await?;
        }
        tx.commit().await?;

        info!(
            order_id = %order.id,
            amount_cents = order.total_cents,
            sold_on = %sold_on,
            "Order completed, sale recorded"
        );
        Ok(())
    }

    /// Restore deducted stock, release any reservation unconditionally,
    /// and notify.
    async fn enter_cancelled(
        &self,
        order: &Order,
        items: &[OrderItem],
        actor: &Actor,
    ) -> DbResult<()> {
        if order.stock_deducted {
            let demands = order_demands(items)?;
            let reason = format!("Order cancelled - Order ID: {}", order.id);
            for (key, qty) in &demands {
                self.allocator.restore(key, *qty, &reason, actor).await?;
            }
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        order_repo::update_status(&mut *tx, &order.id, OrderStatus::Cancelled, now).await?;
        order_repo::update_stock_deducted(&mut *tx, &order.id, false, now).await?;
        reservation_repo::release_holds(&mut *tx, &order.id, OrderStatus::Cancelled).await?;
        order_repo::update_reservation_ids(&mut *tx, &order.id, &[], now).await?;
        tx.commit().await?;

        self.notifier.notify(
            NotifyKind::OrderCancelled,
            &format!("Order #{} cancelled", short_id(&order.id)),
        );
        info!(order_id = %order.id, restored = order.stock_deducted, "Order cancelled");
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Loads an order and its items or fails with `OrderNotFound`.
    async fn require_order(&self, order_id: &str) -> DbResult<(Order, Vec<OrderItem>)> {
        let order = order_repo::fetch_order(&self.pool, order_id)
            .await?
            .ok_or_else(|| DbError::from(CoreError::OrderNotFound(order_id.to_string())))?;
        let items = order_repo::fetch_order_items(&self.pool, order_id).await?;
        Ok((order, items))
    }

    /// Plain status write plus hold-status bookkeeping for scheduled orders.
    async fn write_status(&self, order: &Order, to: OrderStatus) -> DbResult<()> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        order_repo::update_status(&mut *tx, &order.id, to, now).await?;
        if order.is_scheduled {
            reservation_repo::update_holds_status(&mut *tx, &order.id, to).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Availability pre-check for every demand; notifies and fails with the
    /// first shortfall. Nothing is written.
    async fn precheck_availability(
        &self,
        order_id: &str,
        demands: &BTreeMap<StockKey, BatchQty>,
    ) -> DbResult<()> {
        let mut shortfalls = Vec::new();
        for (key, qty) in demands {
            let availability = self.allocator.check_availability(key, *qty).await?;
            if !availability.is_available() {
                shortfalls.push((key.clone(), availability));
            }
        }
        if let Some((key, availability)) = self.report_shortfalls(order_id, &shortfalls) {
            return Err(CoreError::InsufficientStock {
                label: key.label().to_string(),
                available: availability.on_hand.hundredths(),
                needed: availability.needed.hundredths(),
            }
            .into());
        }
        Ok(())
    }

    /// Sends one shortfall notification per missing key and returns the
    /// first, if any.
    fn report_shortfalls<'a>(
        &self,
        order_id: &str,
        shortfalls: &'a [(StockKey, crate::allocator::Availability)],
    ) -> Option<&'a (StockKey, crate::allocator::Availability)> {
        for (key, availability) in shortfalls {
            self.notifier.notify(
                NotifyKind::StockShortfall,
                &format!(
                    "Insufficient stock for {key} (order #{}). Available: {}, Required: {}",
                    short_id(order_id),
                    availability.on_hand,
                    availability.needed
                ),
            );
        }
        shortfalls.first()
    }

    /// Allocates every demand of one order, restoring everything already
    /// committed when a later key loses a post-pre-check race.
    async fn allocate_order_stock(
        &self,
        order: &Order,
        demands: &BTreeMap<StockKey, BatchQty>,
        actor: &Actor,
    ) -> DbResult<()> {
        let reason = format!("Order pickup - Order ID: {}", order.id);
        let mut committed: Vec<(StockKey, BatchQty)> = Vec::new();

        for (key, qty) in demands {
            match self.allocator.allocate(key, *qty, &reason, actor).await {
                Ok(_) => committed.push((key.clone(), *qty)),
                Err(err) => {
                    warn!(
                        order_id = %order.id,
                        key = %key,
                        %err,
                        rollback = committed.len(),
                        "Allocation failed mid-order, compensating"
                    );
                    let rollback_reason =
                        format!("Allocation rollback - Order ID: {}", order.id);
                    for (done_key, done_qty) in &committed {
                        if let Err(restore_err) = self
                            .allocator
                            .restore(done_key, *done_qty, &rollback_reason, actor)
                            .await
                        {
                            // the ledger is now short a compensating entry;
                            // surface loudly, movement history still tells
                            // the full story
                            error!(
                                order_id = %order.id,
                                key = %done_key,
                                %restore_err,
                                "Compensating restore failed"
                            );
                        }
                    }
                    if let DbError::Domain(CoreError::InsufficientStock { label, .. }) = &err {
                        self.notifier.notify(
                            NotifyKind::StockShortfall,
                            &format!(
                                "Insufficient stock for {label} while fulfilling order #{}",
                                short_id(&order.id)
                            ),
                        );
                    }
                    return Err(err);
                }
            }
        }

        self.alert_low_stock(demands).await;
        Ok(())
    }

    /// Fires a low-stock alert for every touched pool that dropped to its
    /// minimum threshold. Best-effort: a failed read never fails the order.
    async fn alert_low_stock(&self, demands: &BTreeMap<StockKey, BatchQty>) {
        let stock = StockRepository::new(self.pool.clone());
        let Ok(low) = stock.below_minimum().await else {
            return;
        };
        for batch in low {
            let touched = demands
                .keys()
                .any(|key| key.kind() == batch.kind && key.label() == batch.label);
            if touched {
                self.notifier.notify(
                    NotifyKind::LowStock,
                    &format!(
                        "{} is running low: {} left (minimum {})",
                        batch.label,
                        batch.on_hand(),
                        BatchQty::from_hundredths(batch.minimum_hundredths)
                    ),
                );
            }
        }
    }

    /// Cancels an order outside the normal transition path (checkout
    /// deduction failure). The order has no reservation yet.
    async fn force_cancel(&self, order_id: &str, actor: &Actor) -> DbResult<()> {
        let (order, items) = self.require_order(order_id).await?;
        self.enter_cancelled(&order, &items, actor).await
    }
}

/// Expands an order's items into aggregated per-key stock demands.
///
/// Items sharing a variety check and deduct their combined requirement.
fn order_demands(items: &[OrderItem]) -> Result<BTreeMap<StockKey, BatchQty>, CoreError> {
    let mut all = Vec::new();
    for item in items {
        let size = size_by_name(&item.size)?;
        all.extend(item_demands(size, item));
    }
    Ok(aggregate_demands(all))
}

/// First six characters of an order id, as shown on staff screens.
fn short_id(order_id: &str) -> &str {
    &order_id[..order_id.len().min(6)]
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::batch::NewBatch;
    use bilao_core::{DraftItem, PaymentMethod, StockKind};
    use chrono::{Duration, NaiveDate, Utc};
    use std::sync::Mutex;

    /// Records notifications for assertions.
    #[derive(Default)]
    struct RecordingNotifier {
        messages: Mutex<Vec<(NotifyKind, String)>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, kind: NotifyKind, message: &str) {
            self.messages
                .lock()
                .unwrap()
                .push((kind, message.to_string()));
        }
    }

    struct Harness {
        db: Database,
        lifecycle: OrderLifecycle,
        notifier: Arc<RecordingNotifier>,
    }

    async fn harness() -> Harness {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let notifier = Arc::new(RecordingNotifier::default());
        let lifecycle = db.lifecycle(notifier.clone());
        Harness {
            db,
            lifecycle,
            notifier,
        }
    }

    async fn seed_variety(db: &Database, label: &str, qty_hundredths: i64) {
        let today = Utc::now().date_naive();
        let new = NewBatch {
            kind: StockKind::Variety,
            label: label.to_string(),
            initial: BatchQty::from_hundredths(qty_hundredths),
            minimum: BatchQty::zero(),
            critical: BatchQty::zero(),
            production_date: today,
            expiry_date: today + Duration::days(7),
        };
        db.stock().insert_batch(&new, &Actor::system()).await.unwrap();
    }

    async fn seed_fixed(db: &Database, size: &str, units: i64) {
        let today = Utc::now().date_naive();
        let new = NewBatch {
            kind: StockKind::FixedSize,
            label: size.to_string(),
            initial: BatchQty::from_units(units),
            minimum: BatchQty::zero(),
            critical: BatchQty::zero(),
            production_date: today,
            expiry_date: today + Duration::days(2),
        };
        db.stock().insert_batch(&new, &Actor::system()).await.unwrap();
    }

    fn draft(items: Vec<DraftItem>, method: PaymentMethod, pickup_date: NaiveDate) -> OrderDraft {
        OrderDraft {
            customer_name: "Aling Nena".to_string(),
            items,
            payment_method: method,
            gcash_reference: match method {
                PaymentMethod::Gcash => Some("REF-12345".to_string()),
                PaymentMethod::Cash => None,
            },
            pickup_date,
            pickup_time: "10:00 AM".to_string(),
        }
    }

    fn tray_item(varieties: &[&str], quantity: i64) -> DraftItem {
        DraftItem {
            size: "Tray".to_string(),
            varieties: varieties.iter().map(|v| v.to_string()).collect(),
            quantity,
        }
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    #[tokio::test]
    async fn test_checkout_validates_against_catalog() {
        let h = harness().await;
        let bad = draft(
            vec![DraftItem {
                size: "Big Bilao".to_string(),
                varieties: vec!["Cassava".to_string()],
                quantity: 1,
            }],
            PaymentMethod::Cash,
            today(),
        );
        let err = h.lifecycle.checkout(&bad, &Actor::system()).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_checkout_prices_and_derives_schedule() {
        let h = harness().await;

        let regular = h
            .lifecycle
            .checkout(
                &draft(
                    vec![tray_item(&["Bibingka", "Kutsinta"], 2)],
                    PaymentMethod::Cash,
                    today(),
                ),
                &Actor::system(),
            )
            .await
            .unwrap();
        assert!(!regular.is_scheduled);
        assert_eq!(regular.total_cents, 2 * 42_000);
        assert_eq!(regular.status, OrderStatus::OrderConfirmed);
        assert_eq!(regular.payment_status, PaymentStatus::Approved);

        let scheduled = h
            .lifecycle
            .checkout(
                &draft(
                    vec![tray_item(&["Bibingka"], 1)],
                    PaymentMethod::Gcash,
                    today() + Duration::days(2),
                ),
                &Actor::system(),
            )
            .await
            .unwrap();
        assert!(scheduled.is_scheduled);
        assert_eq!(scheduled.payment_status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_regular_flow_deducts_on_ready_and_records_sale() {
        let h = harness().await;
        seed_variety(&h.db, "Bibingka", 300).await;
        seed_variety(&h.db, "Kutsinta", 300).await;

        let order = h
            .lifecycle
            .checkout(
                &draft(
                    vec![tray_item(&["Bibingka", "Kutsinta"], 3)],
                    PaymentMethod::Cash,
                    today(),
                ),
                &Actor::system(),
            )
            .await
            .unwrap();

        let staff = Actor::staff("cashier-1");
        h.lifecycle
            .transition(&order.id, OrderStatus::PreparingOrder, &staff)
            .await
            .unwrap();
        let ready = h
            .lifecycle
            .transition(&order.id, OrderStatus::ReadyForPickup, &staff)
            .await
            .unwrap();
        assert!(ready.stock_deducted);

        // 0.5 bilao x 3 from each variety
        for label in ["Bibingka", "Kutsinta"] {
            let left = h
                .db
                .stock()
                .total_on_hand(&StockKey::variety(label))
                .await
                .unwrap();
            assert_eq!(left, BatchQty::from_hundredths(150));
        }

        let done = h
            .lifecycle
            .transition(&order.id, OrderStatus::Completed, &staff)
            .await
            .unwrap();
        assert_eq!(done.status, OrderStatus::Completed);

        let entry = h.db.sales().get_by_order(&order.id).await.unwrap().unwrap();
        assert_eq!(entry.amount_cents, order.total_cents);
        assert_eq!(
            h.db.sales().daily_total_cents(entry.sold_on).await.unwrap(),
            order.total_cents
        );
        assert_eq!(
            h.db.sales()
                .monthly_total_cents(&entry.sold_month)
                .await
                .unwrap(),
            order.total_cents
        );
    }

    #[tokio::test]
    async fn test_cannot_skip_to_completed() {
        let h = harness().await;
        let order = h
            .lifecycle
            .checkout(
                &draft(vec![tray_item(&["Bibingka"], 1)], PaymentMethod::Cash, today()),
                &Actor::system(),
            )
            .await
            .unwrap();

        let err = h
            .lifecycle
            .transition(&order.id, OrderStatus::Completed, &Actor::system())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InvalidTransition { .. })
        ));

        // nothing moved
        let fresh = h.db.orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(fresh.status, OrderStatus::OrderConfirmed);
        assert!(h.db.sales().get_by_order(&order.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_payment_gating_blocks_progress() {
        let h = harness().await;
        seed_variety(&h.db, "Bibingka", 300).await;

        let order = h
            .lifecycle
            .checkout(
                &draft(vec![tray_item(&["Bibingka"], 1)], PaymentMethod::Gcash, today()),
                &Actor::system(),
            )
            .await
            .unwrap();

        let err = h
            .lifecycle
            .transition(&order.id, OrderStatus::PreparingOrder, &Actor::system())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::PaymentNotApproved { .. })
        ));

        h.lifecycle
            .approve_payment(&order.id, &Actor::staff("verifier"))
            .await
            .unwrap();
        h.lifecycle
            .transition(&order.id, OrderStatus::PreparingOrder, &Actor::system())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_payment_rejection_forces_cancel() {
        let h = harness().await;
        let order = h
            .lifecycle
            .checkout(
                &draft(vec![tray_item(&["Bibingka"], 1)], PaymentMethod::Gcash, today()),
                &Actor::system(),
            )
            .await
            .unwrap();

        let rejected = h
            .lifecycle
            .reject_payment(&order.id, &Actor::staff("verifier"))
            .await
            .unwrap();
        assert_eq!(rejected.status, OrderStatus::Cancelled);
        assert_eq!(rejected.payment_status, PaymentStatus::Rejected);

        // cancelled is terminal
        let err = h
            .lifecycle
            .transition(&order.id, OrderStatus::PreparingOrder, &Actor::system())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InvalidTransition { .. })
        ));

        let cancelled_alerts = h
            .notifier
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(kind, _)| *kind == NotifyKind::OrderCancelled)
            .count();
        assert_eq!(cancelled_alerts, 1);
    }

    #[tokio::test]
    async fn test_shortfall_blocks_whole_order() {
        let h = harness().await;
        // Bibingka is plentiful, Kutsinta is short
        seed_variety(&h.db, "Bibingka", 500).await;
        seed_variety(&h.db, "Kutsinta", 40).await;

        let order = h
            .lifecycle
            .checkout(
                &draft(
                    vec![tray_item(&["Bibingka"], 1), tray_item(&["Kutsinta"], 1)],
                    PaymentMethod::Cash,
                    today(),
                ),
                &Actor::system(),
            )
            .await
            .unwrap();

        h.lifecycle
            .transition(&order.id, OrderStatus::PreparingOrder, &Actor::system())
            .await
            .unwrap();
        let err = h
            .lifecycle
            .transition(&order.id, OrderStatus::ReadyForPickup, &Actor::system())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { .. })
        ));

        // all-or-nothing: the plentiful variety was not touched either
        assert_eq!(
            h.db.stock()
                .total_on_hand(&StockKey::variety("Bibingka"))
                .await
                .unwrap(),
            BatchQty::from_hundredths(500)
        );
        let fresh = h.db.orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(fresh.status, OrderStatus::PreparingOrder);
        assert!(!fresh.stock_deducted);

        let shortfall_alerts = h
            .notifier
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(kind, _)| *kind == NotifyKind::StockShortfall)
            .count();
        assert_eq!(shortfall_alerts, 1);
    }

    #[tokio::test]
    async fn test_cancel_after_deduction_restores_aggregate() {
        let h = harness().await;
        seed_variety(&h.db, "Bibingka", 400).await;
        seed_variety(&h.db, "Kalamay", 400).await;

        let order = h
            .lifecycle
            .checkout(
                &draft(
                    vec![tray_item(&["Bibingka", "Kalamay"], 2)],
                    PaymentMethod::Cash,
                    today(),
                ),
                &Actor::system(),
            )
            .await
            .unwrap();

        let staff = Actor::staff("cashier-1");
        h.lifecycle
            .transition(&order.id, OrderStatus::PreparingOrder, &staff)
            .await
            .unwrap();
        h.lifecycle
            .transition(&order.id, OrderStatus::ReadyForPickup, &staff)
            .await
            .unwrap();

        for label in ["Bibingka", "Kalamay"] {
            assert_eq!(
                h.db.stock()
                    .total_on_hand(&StockKey::variety(label))
                    .await
                    .unwrap(),
                BatchQty::from_hundredths(300)
            );
        }

        let cancelled = h
            .lifecycle
            .transition(&order.id, OrderStatus::Cancelled, &staff)
            .await
            .unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert!(!cancelled.stock_deducted);

        // aggregate stock is back to its pre-deduction level
        for label in ["Bibingka", "Kalamay"] {
            assert_eq!(
                h.db.stock()
                    .total_on_hand(&StockKey::variety(label))
                    .await
                    .unwrap(),
                BatchQty::from_hundredths(400)
            );
        }
    }

    #[tokio::test]
    async fn test_scheduled_flow_reserves_then_fulfills() {
        let h = harness().await;
        seed_variety(&h.db, "Kutsinta", 400).await;

        let order = h
            .lifecycle
            .checkout(
                &draft(
                    vec![tray_item(&["Kutsinta"], 2)],
                    PaymentMethod::Cash,
                    today() + Duration::days(3),
                ),
                &Actor::system(),
            )
            .await
            .unwrap();
        assert!(order.is_scheduled);

        let staff = Actor::staff("scheduler");
        let reserved = h
            .lifecycle
            .transition(&order.id, OrderStatus::StockReserved, &staff)
            .await
            .unwrap();
        assert_eq!(reserved.reservation_ids.len(), 1);

        // the hold is advisory: on-hand stock is untouched
        let key = StockKey::variety("Kutsinta");
        assert_eq!(
            h.db.stock().total_on_hand(&key).await.unwrap(),
            BatchQty::from_hundredths(400)
        );
        assert_eq!(
            h.db.reservations()
                .held_for_key_on_date(&key, order.pickup_date)
                .await
                .unwrap(),
            BatchQty::from_units(2)
        );

        // scheduled orders cannot bypass the reservation step
        h.lifecycle
            .transition(&order.id, OrderStatus::PreparingOrder, &staff)
            .await
            .unwrap();
        h.lifecycle
            .transition(&order.id, OrderStatus::ReadyForPickup, &staff)
            .await
            .unwrap();
        assert_eq!(
            h.db.stock().total_on_hand(&key).await.unwrap(),
            BatchQty::from_hundredths(200)
        );

        let done = h
            .lifecycle
            .transition(&order.id, OrderStatus::Completed, &staff)
            .await
            .unwrap();
        assert!(done.reservation_ids.is_empty());
        assert!(h
            .db
            .reservations()
            .list_for_order(&order.id)
            .await
            .unwrap()
            .is_empty());
        assert!(h.db.sales().get_by_order(&order.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_overlapping_scheduled_orders_respect_holds() {
        let h = harness().await;
        seed_variety(&h.db, "Kutsinta", 300).await;
        let pickup = today() + Duration::days(2);

        let first = h
            .lifecycle
            .checkout(
                &draft(vec![tray_item(&["Kutsinta"], 2)], PaymentMethod::Cash, pickup),
                &Actor::system(),
            )
            .await
            .unwrap();
        h.lifecycle
            .transition(&first.id, OrderStatus::StockReserved, &Actor::system())
            .await
            .unwrap();

        // second scheduled order wants 2.00 but only 1.00 is unheld
        let second = h
            .lifecycle
            .checkout(
                &draft(vec![tray_item(&["Kutsinta"], 2)], PaymentMethod::Cash, pickup),
                &Actor::system(),
            )
            .await
            .unwrap();
        let err = h
            .lifecycle
            .transition(&second.id, OrderStatus::StockReserved, &Actor::system())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { .. })
        ));

        // a smaller overlapping order still fits
        let third = h
            .lifecycle
            .checkout(
                &draft(vec![tray_item(&["Kutsinta"], 1)], PaymentMethod::Cash, pickup),
                &Actor::system(),
            )
            .await
            .unwrap();
        h.lifecycle
            .transition(&third.id, OrderStatus::StockReserved, &Actor::system())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_fixed_size_order_deducts_at_confirmation() {
        let h = harness().await;
        seed_fixed(&h.db, "Solo", 5).await;

        let order = h
            .lifecycle
            .checkout(
                &draft(
                    vec![DraftItem {
                        size: "Solo".to_string(),
                        varieties: vec!["Bibingka".to_string()],
                        quantity: 2,
                    }],
                    PaymentMethod::Cash,
                    today(),
                ),
                &Actor::system(),
            )
            .await
            .unwrap();
        assert!(order.stock_deducted);

        let key = StockKey::fixed_size("Solo");
        assert_eq!(
            h.db.stock().total_on_hand(&key).await.unwrap(),
            BatchQty::from_units(3)
        );

        // ReadyForPickup must not deduct a second time
        let staff = Actor::staff("cashier-1");
        h.lifecycle
            .transition(&order.id, OrderStatus::PreparingOrder, &staff)
            .await
            .unwrap();
        h.lifecycle
            .transition(&order.id, OrderStatus::ReadyForPickup, &staff)
            .await
            .unwrap();
        assert_eq!(
            h.db.stock().total_on_hand(&key).await.unwrap(),
            BatchQty::from_units(3)
        );

        // cancelling restores the confirmation-time deduction
        h.lifecycle
            .transition(&order.id, OrderStatus::Cancelled, &staff)
            .await
            .unwrap();
        assert_eq!(
            h.db.stock().total_on_hand(&key).await.unwrap(),
            BatchQty::from_units(5)
        );
    }

    #[tokio::test]
    async fn test_fixed_size_checkout_fails_on_empty_shelf() {
        let h = harness().await;
        seed_fixed(&h.db, "Small", 1).await;

        let err = h
            .lifecycle
            .checkout(
                &draft(
                    vec![DraftItem {
                        size: "Small".to_string(),
                        varieties: vec!["Bibingka".to_string()],
                        quantity: 3,
                    }],
                    PaymentMethod::Cash,
                    today(),
                ),
                &Actor::system(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { .. })
        ));
        // shelf untouched
        assert_eq!(
            h.db.stock()
                .total_on_hand(&StockKey::fixed_size("Small"))
                .await
                .unwrap(),
            BatchQty::from_units(1)
        );
    }

    #[tokio::test]
    async fn test_low_stock_alert_after_allocation() {
        let h = harness().await;
        let today = Utc::now().date_naive();
        // minimum 2.00; the order's 1.00 deduction drops the batch to 1.40
        h.db.stock()
            .insert_batch(
                &NewBatch {
                    kind: StockKind::Variety,
                    label: "Kutsinta".to_string(),
                    initial: BatchQty::from_hundredths(240),
                    minimum: BatchQty::from_hundredths(200),
                    critical: BatchQty::from_hundredths(100),
                    production_date: today,
                    expiry_date: today + Duration::days(7),
                },
                &Actor::system(),
            )
            .await
            .unwrap();

        let order = h
            .lifecycle
            .checkout(
                &draft(vec![tray_item(&["Kutsinta"], 1)], PaymentMethod::Cash, today),
                &Actor::system(),
            )
            .await
            .unwrap();
        let staff = Actor::staff("cashier-1");
        h.lifecycle
            .transition(&order.id, OrderStatus::PreparingOrder, &staff)
            .await
            .unwrap();
        h.lifecycle
            .transition(&order.id, OrderStatus::ReadyForPickup, &staff)
            .await
            .unwrap();

        let low_alerts = h
            .notifier
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(kind, _)| *kind == NotifyKind::LowStock)
            .count();
        assert_eq!(low_alerts, 1);
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let h = harness().await;
        let released =
            reservation_repo::release_holds(h.db.pool(), "no-such-order", OrderStatus::Cancelled)
                .await
                .unwrap();
        assert_eq!(released, 0);
    }
}
