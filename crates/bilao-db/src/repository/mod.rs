//! # Repository Module
//!
//! Database repository implementations for the Bilao Back-Office.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Caller                                                                 │
//! │    │  db.stock().list_for_key(&key)                                     │
//! │    ▼                                                                    │
//! │  StockRepository ── SQL ──► SQLite                                      │
//! │                                                                         │
//! │  Mutations that belong to the engine (stock deduction, status moves,    │
//! │  reservation holds, sales entries) are crate-private free functions     │
//! │  taking any sqlx Executor, so the Allocator and the Lifecycle can run   │
//! │  them inside their own transactions.                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`batch::StockRepository`] - Stock batches, movements, thresholds
//! - [`order::OrderRepository`] - Orders and line items
//! - [`reservation::ReservationRepository`] - Advisory holds
//! - [`sales::SalesRepository`] - Append-only sales ledger

pub mod batch;
pub mod order;
pub mod reservation;
pub mod sales;
