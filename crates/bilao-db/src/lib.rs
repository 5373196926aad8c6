//! # bilao-db: Database Layer for the Bilao Back-Office
//!
//! SQLite persistence plus the two stateful services of the engine: the
//! stock [`Allocator`] and the order [`OrderLifecycle`].
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Bilao Back-Office Data Flow                         │
//! │                                                                         │
//! │  Caller (storefront checkout, tracking board, inventory screen)        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     bilao-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌────────────┐   ┌────────────┐   ┌─────────────────────┐   │   │
//! │  │   │  Database  │   │ Allocator  │   │   OrderLifecycle    │   │   │
//! │  │   │  (pool.rs) │   │ two-phase  │   │  transitions + side │   │   │
//! │  │   │            │   │ FIFO walk  │   │  effects            │   │   │
//! │  │   └────────────┘   └────────────┘   └─────────────────────┘   │   │
//! │  │                                                                 │   │
//! │  │   Repositories: stock batches, orders, reservations, sales     │   │
//! │  │   Migrations: embedded from migrations/sqlite                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database (WAL mode, foreign keys on)                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use bilao_core::{Actor, NullNotifier, OrderStatus};
//! use bilao_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./bilao.db")).await?;
//! let lifecycle = db.lifecycle(Arc::new(NullNotifier));
//!
//! let order = lifecycle.checkout(&draft, &Actor::staff("cashier-1")).await?;
//! lifecycle.transition(&order.id, OrderStatus::PreparingOrder, &actor).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod allocator;
pub mod error;
pub mod lifecycle;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use allocator::{Allocator, Availability};
pub use error::{DbError, DbResult};
pub use lifecycle::OrderLifecycle;
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::batch::{NewBatch, StockRepository};
pub use repository::order::OrderRepository;
pub use repository::reservation::ReservationRepository;
pub use repository::sales::SalesRepository;
