//! Persistence for the tieout reconciliation engine.
//!
//! This crate provides:
//! - The [`Store`] trait the orchestrator and escalator read/write
//!   through
//! - [`PgStore`], the PostgreSQL backend (sqlx)
//! - [`MemStore`], an in-memory backend for tests and dry runs
//!
//! Statements, config values, and covenant thresholds are read-only
//! to the engine; it writes only runs, results, and alerts.

pub mod error;
pub mod mem;
pub mod pg;
pub mod store;

pub use error::StoreError;
pub use mem::MemStore;
pub use pg::PgStore;
pub use store::Store;
