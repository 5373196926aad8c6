//! # Order Status & Transition Tables
//!
//! Closed enums for order/payment state plus the legal-transition tables.
//!
//! ## State Diagram
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Regular flow                                                           │
//! │    OrderConfirmed → PreparingOrder → ReadyForPickup → Completed         │
//! │                                                                         │
//! │  Scheduled flow (pickup date after creation date)                       │
//! │    OrderConfirmed → StockReserved → PreparingOrder →                    │
//! │                                     ReadyForPickup → Completed          │
//! │                                                                         │
//! │  Cancelled is reachable from every non-terminal state.                  │
//! │  Completed and Cancelled are terminal: no outbound transitions.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Statuses are closed enums, never free strings, so every `match` over a
//! status is compiler-checked exhaustive.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Order Status
// =============================================================================

/// The lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order accepted at checkout; payment may still be pending.
    OrderConfirmed,
    /// Scheduled orders only: advisory stock hold created.
    StockReserved,
    /// Kitchen is working on the order.
    PreparingOrder,
    /// Stock deducted; order waiting for the customer.
    ReadyForPickup,
    /// Picked up and recorded in the sales ledger. **Terminal.**
    Completed,
    /// Cancelled by staff or forced by payment rejection. **Terminal.**
    Cancelled,
}

impl OrderStatus {
    /// Returns `true` if no further transitions are possible.
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// The statuses this order may move to next.
    ///
    /// Strictly linear: only the next step of the flow plus `Cancelled`.
    /// An order cannot reach `Completed` without passing through
    /// `ReadyForPickup`.
    pub fn next_statuses(&self, is_scheduled: bool) -> &'static [OrderStatus] {
        use OrderStatus::*;
        if is_scheduled {
            match self {
                OrderConfirmed => &[StockReserved, Cancelled],
                StockReserved => &[PreparingOrder, Cancelled],
                PreparingOrder => &[ReadyForPickup, Cancelled],
                ReadyForPickup => &[Completed, Cancelled],
                Completed | Cancelled => &[],
            }
        } else {
            match self {
                OrderConfirmed => &[PreparingOrder, Cancelled],
                // StockReserved does not occur in the regular flow; if data
                // ever carries it, only cancellation is legal
                StockReserved => &[Cancelled],
                PreparingOrder => &[ReadyForPickup, Cancelled],
                ReadyForPickup => &[Completed, Cancelled],
                Completed | Cancelled => &[],
            }
        }
    }

    /// Validates a requested transition against the flow table.
    pub fn validate_transition(&self, to: OrderStatus, is_scheduled: bool) -> CoreResult<()> {
        if self.next_statuses(is_scheduled).contains(&to) {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition { from: *self, to })
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::OrderConfirmed
    }
}

impl fmt::Display for OrderStatus {
    /// Human-facing label, matching what staff see on the board.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OrderStatus::OrderConfirmed => "Order Confirmed",
            OrderStatus::StockReserved => "Stock Reserved",
            OrderStatus::PreparingOrder => "Preparing Order",
            OrderStatus::ReadyForPickup => "Ready for Pickup",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
        };
        f.write_str(label)
    }
}

// =============================================================================
// Payment Status
// =============================================================================

/// Verification state of an order's payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Awaiting verification (GCash reference not yet checked).
    Pending,
    /// Verified; the order may progress past confirmation.
    Approved,
    /// Verification failed; the order is forced to `Cancelled`.
    Rejected,
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Pending
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Cash over the counter; approved at checkout.
    Cash,
    /// GCash transfer; requires a reference number and manual verification.
    Gcash,
}

impl PaymentMethod {
    /// Payment status an order starts with for this method.
    #[inline]
    pub const fn initial_payment_status(&self) -> PaymentStatus {
        match self {
            PaymentMethod::Cash => PaymentStatus::Approved,
            PaymentMethod::Gcash => PaymentStatus::Pending,
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentMethod::Cash => f.write_str("Cash"),
            PaymentMethod::Gcash => f.write_str("GCash"),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
