//! FinWatch Persistence Layer
//!
//! This crate provides storage for the billing engine. It includes:
//!
//! - Connection pool management with sqlx
//! - PostgreSQL repository implementations for subscriptions, sealed
//!   credentials, and invoices (see `schema.sql`)
//! - An in-memory store implementing the same traits, used by the test
//!   suites and available for local runs
//!
//! Per-record write serialization is the store's contract: PostgreSQL gives
//! it via row-level locking, the in-memory store via a single lock per map.

pub mod memory;
pub mod pool;
pub mod repositories;

pub use memory::MemoryStore;
pub use pool::create_pool;
pub use repositories::*;

// Re-export commonly used types
pub use finwatch_core::{AppError, AppResult};
pub use sqlx::PgPool;
