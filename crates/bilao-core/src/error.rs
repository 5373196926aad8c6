//! # Error Types
//!
//! Domain-specific error types for bilao-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  bilao-core errors (this file)                                          │
//! │  ├── CoreError        - Business rule violations                        │
//! │  └── ValidationError  - Input validation failures                       │
//! │                                                                         │
//! │  bilao-db errors (separate crate)                                       │
//! │  └── DbError          - Store failures; wraps CoreError transparently   │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → caller/UI                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `InsufficientStock` and `InvalidTransition` are surfaced to the caller
//! verbatim; a blocked transition leaves order and ledger untouched.

use thiserror::Error;

use crate::status::OrderStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Not enough stock across all batches of a variety or fixed size.
    ///
    /// ## When This Occurs
    /// - Availability pre-check finds the aggregate on-hand short
    /// - An allocation loses a race after the pre-check passed
    ///
    /// Quantities are hundredths of a bilao (whole units × 100 for
    /// fixed-size stock).
    #[error("Insufficient stock for {label}: available {available}, needed {needed}")]
    InsufficientStock {
        label: String,
        /// Total on hand, in hundredths.
        available: i64,
        /// Requested amount, in hundredths.
        needed: i64,
    },

    /// No stock batch exists for the requested variety or fixed size.
    ///
    /// Distinct from zero stock: the key has never been stocked (or every
    /// batch was soft-deleted).
    #[error("No stock batch found for {0}")]
    BatchNotFound(String),

    /// An illegal status change was attempted.
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The order's payment has not been approved yet.
    ///
    /// Orders may not progress past `OrderConfirmed` until payment is
    /// approved; rejection forces `Cancelled`.
    #[error("Payment for order {order_id} is not approved")]
    PaymentNotApproved { order_id: String },

    /// Order cannot be found.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// The requested size name is not in the catalog.
    #[error("Unknown size: {0}")]
    UnknownSize(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur when an order or batch doesn't meet catalog rules.
/// Used for early validation before any store operation runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Variety count violates the size's min/max bounds.
    #[error("{size} takes between {min} and {max} varieties, got {got}")]
    VarietyCount {
        size: String,
        min: usize,
        max: usize,
        got: usize,
    },

    /// A variety is not allowed for the chosen size.
    #[error("{variety} is not available for {size}")]
    VarietyNotAllowed { size: String, variety: String },

    /// The same variety was selected twice for one item.
    #[error("Duplicate variety {variety} in item")]
    DuplicateVariety { variety: String },

    /// Variety name is not in the known list.
    #[error("Unknown variety: {0}")]
    UnknownVariety(String),

    /// Expiry date is not after the production date.
    #[error("Expiry date {expiry} must be after production date {production}")]
    ExpiryBeforeProduction { production: String, expiry: String },

    /// Fixed-size stock must be whole units.
    #[error("Fixed-size stock for {label} must be whole units, got {got} hundredths")]
    FractionalFixedStock { label: String, got: i64 },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
