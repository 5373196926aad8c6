//! # bilao-core: Pure Business Logic for the Bilao Back-Office
//!
//! This crate is the heart of the back-office engine. It contains the
//! bakery's business rules as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   Bilao Back-Office Architecture                        │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Storefront / Walk-in / Dashboard callers           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ bilao-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │  catalog  │  │ deduction │  │  status   │  │ validation│  │   │
//! │  │   │ SizeConfig│  │ fractions │  │ OrderFlow │  │   rules   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                bilao-db (Database Layer)                        │   │
//! │  │       SQLite ledger, allocator, order lifecycle, sales          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (StockBatch, StockMovement, Order, ...)
//! - [`quantity`] - Integer bilao-hundredths quantity type (no floats!)
//! - [`catalog`] - The static size catalog and variety list
//! - [`deduction`] - The per-variety deduction calculator
//! - [`status`] - Order/payment status enums and transition tables
//! - [`validation`] - Catalog and batch rule validation
//! - [`notify`] - Fire-and-forget notification sink interface
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: deterministic - same input, same output
//! 2. **No I/O**: database, network, file system access is FORBIDDEN here
//! 3. **Integer Quantities**: hundredths of a bilao (i64), centavo prices
//! 4. **Explicit Errors**: all errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use bilao_core::catalog::size_by_name;
//! use bilao_core::deduction::deduction_per_variety;
//!
//! // a Big Bilao split across two varieties costs each 0.50 bilao
//! let size = size_by_name("Big Bilao").unwrap();
//! let fraction = deduction_per_variety(size, 2);
//! assert_eq!(fraction.hundredths(), 50);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod catalog;
pub mod deduction;
pub mod error;
pub mod notify;
pub mod quantity;
pub mod status;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use bilao_core::BatchQty` instead of
// `use bilao_core::quantity::BatchQty`

pub use catalog::{SizeClass, SizeConfig, VARIETIES};
pub use error::{CoreError, CoreResult, ValidationError};
pub use notify::{Notifier, NotifyKind, NullNotifier};
pub use quantity::BatchQty;
pub use status::{OrderStatus, PaymentMethod, PaymentStatus};
pub use types::*;
