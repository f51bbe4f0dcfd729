//! Transfer Ledger - idempotent money transfers over a relational ledger
//!
//! # Modules
//!
//! - [`models`] - Account, journal entry and processed operation types
//! - [`store`] - Ledger store trait with PostgreSQL and in-memory backends
//! - [`db`] - PostgreSQL pool and schema bootstrap
//! - [`transfer`] - Validation and the transfer engine
//! - [`state_reader`] - Read-only ledger snapshot
//! - [`metrics`] - Prometheus counters and gauges
//! - [`gateway`] - axum HTTP adapter
//! - [`config`] / [`logging`] - YAML configuration and tracing setup

pub mod config;
pub mod db;
pub mod gateway;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod state_reader;
pub mod store;
pub mod transfer;

// Convenient re-exports at crate root
pub use metrics::TransferMetrics;
pub use models::{Account, EntryType, LedgerEntry, ProcessedOperation};
pub use state_reader::{StateReader, StateSnapshot};
pub use store::{LedgerStore, MemoryLedgerStore, PgLedgerStore, StoreError, UnitOfWork};
pub use transfer::{TransferEngine, TransferError, TransferOutcome, TransferRequest};
