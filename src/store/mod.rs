//! Ledger Store
//!
//! The relational store behind the transfer engine. A store hands out
//! [`UnitOfWork`] values: one atomic, all-or-nothing group of reads and writes
//! holding row locks on the accounts it touched until `commit` or `rollback`.
//!
//! # Backends
//!
//! - [`postgres::PgLedgerStore`] - `accounts`, `ledger`, `processed_ops` tables, `SELECT ... FOR UPDATE`
//! - [`memory::MemoryLedgerStore`] - per-account async locks, staged writes, fault injection for tests
//!
//! # Unit of work contract
//!
//! 1. Every value returned by [`LedgerStore::begin`] MUST end in `commit` or `rollback`.
//!    Dropping it without either rolls back (cancellation path).
//! 2. `lock_account` blocks until no other unit of work holds the account.
//! 3. Nothing written through a unit of work is visible to readers before `commit` returns `Ok`.
//! 4. Recording an operation id that another committed unit of work already recorded fails
//!    with [`StoreError::DuplicateOperation`], at the latest during `commit`.

pub mod error;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::models::{Account, LedgerEntry, NewLedgerEntry, ProcessedOperation};

pub use error::StoreError;
pub use memory::{FailPoint, MemoryLedgerStore};
pub use postgres::PgLedgerStore;

/// Accounts created on first boot when absent.
pub fn default_seed() -> Vec<Account> {
    vec![
        Account::new("A", Decimal::new(100_000, 2)),
        Account::new("B", Decimal::new(50_000, 2)),
    ]
}

/// One open transaction against the store.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Whether `operation_id` has already been recorded by a committed transfer
    async fn is_processed(&mut self, operation_id: &str) -> Result<bool, StoreError>;

    /// Lock the account row for the rest of this unit of work and read its balance.
    ///
    /// Returns `Ok(None)` when the account does not exist.
    async fn lock_account(&mut self, account_id: &str) -> Result<Option<Decimal>, StoreError>;

    /// Overwrite the balance of an account previously locked by this unit of work
    async fn update_balance(&mut self, account_id: &str, balance: Decimal)
    -> Result<(), StoreError>;

    /// Append one journal row
    async fn append_entry(&mut self, entry: &NewLedgerEntry) -> Result<(), StoreError>;

    /// Record the idempotency key guarding this unit of work
    async fn record_operation(
        &mut self,
        operation_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Make every write visible atomically and release the locks
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// Discard every write and release the locks
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Store handle shared by the engine, the state reader and the gateway.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Open a new unit of work
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;

    /// Insert accounts that do not exist yet; existing balances are left untouched
    async fn seed_accounts(&self, accounts: &[Account]) -> Result<(), StoreError>;

    /// All accounts ordered by id
    async fn accounts(&self) -> Result<Vec<Account>, StoreError>;

    /// Most recent journal rows, newest first
    async fn recent_entries(&self, limit: usize) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Most recently recorded operation ids, newest first
    async fn recent_operations(&self, limit: usize)
    -> Result<Vec<ProcessedOperation>, StoreError>;

    /// Cheap liveness probe
    async fn health_check(&self) -> Result<(), StoreError>;
}
