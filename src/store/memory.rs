//! In-memory ledger store
//!
//! Same contract as the PostgreSQL store, kept in process:
//! - each account has an async mutex standing in for its row lock; a unit of
//!   work holds the owned guard until commit, rollback or drop
//! - writes are staged in the unit of work and applied under one state lock
//!   at commit, so readers only ever see committed state
//! - the processed-operation key is unique; a second commit of the same key
//!   fails with [`StoreError::DuplicateOperation`] and applies nothing
//!
//! Used for local runs without a database and by the test suite, which also
//! drives the fault and latency hooks ([`MemoryLedgerStore::inject_fault`],
//! [`MemoryLedgerStore::set_lock_hold_delay`]).

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::OwnedMutexGuard;

use super::{LedgerStore, StoreError, UnitOfWork};
use crate::models::{Account, LedgerEntry, NewLedgerEntry, ProcessedOperation};

/// Places where a failure can be injected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    Begin,
    IsProcessed,
    LockAccount,
    UpdateBalance,
    AppendEntry,
    RecordOperation,
    Commit,
    Read,
}

impl FailPoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailPoint::Begin => "begin",
            FailPoint::IsProcessed => "is_processed",
            FailPoint::LockAccount => "lock_account",
            FailPoint::UpdateBalance => "update_balance",
            FailPoint::AppendEntry => "append_entry",
            FailPoint::RecordOperation => "record_operation",
            FailPoint::Commit => "commit",
            FailPoint::Read => "read",
        }
    }
}

#[derive(Debug)]
struct Fault {
    point: FailPoint,
    retryable: bool,
    remaining: usize,
}

#[derive(Default)]
struct Committed {
    balances: BTreeMap<String, Decimal>,
    ledger: Vec<LedgerEntry>,
    processed: HashMap<String, DateTime<Utc>>,
    next_entry_id: i64,
}

#[derive(Default)]
struct Shared {
    committed: Mutex<Committed>,
    row_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    faults: Mutex<Vec<Fault>>,
    hold_delay: Mutex<Duration>,
    lock_timeout: Option<Duration>,
    open_units: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

/// Lock a std mutex, recovering the data if a panicking holder poisoned it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Shared {
    fn check_fault(&self, point: FailPoint) -> Result<(), StoreError> {
        let mut faults = lock(&self.faults);
        if let Some(pos) = faults.iter().position(|f| f.point == point) {
            let fault = &mut faults[pos];
            let retryable = fault.retryable;
            fault.remaining -= 1;
            if fault.remaining == 0 {
                faults.remove(pos);
            }
            return Err(StoreError::Injected {
                point: point.as_str(),
                retryable,
            });
        }
        Ok(())
    }

    fn row_lock(&self, account_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        lock(&self.row_locks)
            .entry(account_id.to_string())
            .or_default()
            .clone()
    }

    fn committed_balance(&self, account_id: &str) -> Option<Decimal> {
        lock(&self.committed).balances.get(account_id).copied()
    }
}

/// In-process [`LedgerStore`]
#[derive(Clone, Default)]
pub struct MemoryLedgerStore {
    shared: Arc<Shared>,
}

impl MemoryLedgerStore {
    /// Store whose lock waits never time out
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose `lock_account` fails with [`StoreError::LockTimeout`] after `timeout`
    pub fn with_lock_timeout(timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                lock_timeout: Some(timeout),
                ..Shared::default()
            }),
        }
    }

    /// Store pre-populated with `accounts`
    pub fn with_accounts(accounts: &[Account]) -> Self {
        let store = Self::new();
        store.insert_absent(accounts);
        store
    }

    fn insert_absent(&self, accounts: &[Account]) {
        let mut committed = lock(&self.shared.committed);
        for account in accounts {
            committed
                .balances
                .entry(account.id.clone())
                .or_insert(account.balance);
        }
    }

    /// Fail the next `times` calls reaching `point`
    pub fn inject_fault(&self, point: FailPoint, retryable: bool, times: usize) {
        if times == 0 {
            return;
        }
        lock(&self.shared.faults).push(Fault {
            point,
            retryable,
            remaining: times,
        });
    }

    /// Sleep for `delay` right after every row lock is granted, widening race windows
    pub fn set_lock_hold_delay(&self, delay: Duration) {
        *lock(&self.shared.hold_delay) = delay;
    }

    /// Units of work begun and not yet committed, rolled back or dropped
    pub fn open_units(&self) -> usize {
        self.shared.open_units.load(Ordering::SeqCst)
    }

    pub fn commit_count(&self) -> usize {
        self.shared.commits.load(Ordering::SeqCst)
    }

    pub fn rollback_count(&self) -> usize {
        self.shared.rollbacks.load(Ordering::SeqCst)
    }

    /// Committed balance of one account
    pub fn balance(&self, account_id: &str) -> Option<Decimal> {
        self.shared.committed_balance(account_id)
    }

    /// Sum of all committed balances
    pub fn total_balance(&self) -> Decimal {
        lock(&self.shared.committed).balances.values().sum()
    }

    /// Number of committed journal rows
    pub fn entry_count(&self) -> usize {
        lock(&self.shared.committed).ledger.len()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        self.shared.check_fault(FailPoint::Begin)?;
        self.shared.open_units.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryUnitOfWork {
            shared: self.shared.clone(),
            held: BTreeMap::new(),
            staged_balances: BTreeMap::new(),
            staged_entries: Vec::new(),
            staged_operations: Vec::new(),
        }))
    }

    async fn seed_accounts(&self, accounts: &[Account]) -> Result<(), StoreError> {
        self.insert_absent(accounts);
        Ok(())
    }

    async fn accounts(&self) -> Result<Vec<Account>, StoreError> {
        self.shared.check_fault(FailPoint::Read)?;
        let committed = lock(&self.shared.committed);
        Ok(committed
            .balances
            .iter()
            .map(|(id, balance)| Account::new(id.clone(), *balance))
            .collect())
    }

    async fn recent_entries(&self, limit: usize) -> Result<Vec<LedgerEntry>, StoreError> {
        self.shared.check_fault(FailPoint::Read)?;
        let committed = lock(&self.shared.committed);
        Ok(committed.ledger.iter().rev().take(limit).cloned().collect())
    }

    async fn recent_operations(
        &self,
        limit: usize,
    ) -> Result<Vec<ProcessedOperation>, StoreError> {
        self.shared.check_fault(FailPoint::Read)?;
        let committed = lock(&self.shared.committed);
        let mut operations: Vec<ProcessedOperation> = committed
            .processed
            .iter()
            .map(|(id, created_at)| ProcessedOperation {
                operation_id: id.clone(),
                created_at: *created_at,
            })
            .collect();
        operations.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.operation_id.cmp(&b.operation_id))
        });
        operations.truncate(limit);
        Ok(operations)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.shared.check_fault(FailPoint::Read)
    }
}

struct MemoryUnitOfWork {
    shared: Arc<Shared>,
    /// Row locks owned by this unit of work
    held: BTreeMap<String, OwnedMutexGuard<()>>,
    staged_balances: BTreeMap<String, Decimal>,
    staged_entries: Vec<NewLedgerEntry>,
    staged_operations: Vec<(String, DateTime<Utc>)>,
}

impl MemoryUnitOfWork {
    fn current_balance(&self, account_id: &str) -> Option<Decimal> {
        self.staged_balances
            .get(account_id)
            .copied()
            .or_else(|| self.shared.committed_balance(account_id))
    }

    /// Apply staged writes; nothing is applied when an operation id is taken.
    fn apply(&mut self) -> Result<(), StoreError> {
        let mut committed = lock(&self.shared.committed);

        if let Some((taken, _)) = self
            .staged_operations
            .iter()
            .find(|(id, _)| committed.processed.contains_key(id))
        {
            return Err(StoreError::DuplicateOperation(taken.clone()));
        }

        for (account_id, balance) in &self.staged_balances {
            committed.balances.insert(account_id.clone(), *balance);
        }
        for entry in &self.staged_entries {
            committed.next_entry_id += 1;
            let id = committed.next_entry_id;
            committed.ledger.push(LedgerEntry {
                id,
                entry_type: entry.entry_type,
                account_id: entry.account_id.clone(),
                amount: entry.amount,
                at: entry.at,
            });
        }
        for (operation_id, at) in &self.staged_operations {
            committed.processed.insert(operation_id.clone(), *at);
        }
        Ok(())
    }
}

impl Drop for MemoryUnitOfWork {
    fn drop(&mut self) {
        self.shared.open_units.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn is_processed(&mut self, operation_id: &str) -> Result<bool, StoreError> {
        self.shared.check_fault(FailPoint::IsProcessed)?;
        Ok(lock(&self.shared.committed)
            .processed
            .contains_key(operation_id))
    }

    async fn lock_account(&mut self, account_id: &str) -> Result<Option<Decimal>, StoreError> {
        self.shared.check_fault(FailPoint::LockAccount)?;
        if self.held.contains_key(account_id) {
            return Ok(self.current_balance(account_id));
        }
        if self.shared.committed_balance(account_id).is_none() {
            return Ok(None);
        }

        let row_lock = self.shared.row_lock(account_id);
        let guard = match self.shared.lock_timeout {
            Some(timeout) => tokio::time::timeout(timeout, row_lock.lock_owned())
                .await
                .map_err(|_| StoreError::LockTimeout(account_id.to_string()))?,
            None => row_lock.lock_owned().await,
        };
        self.held.insert(account_id.to_string(), guard);

        let delay = *lock(&self.shared.hold_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        Ok(self.current_balance(account_id))
    }

    async fn update_balance(
        &mut self,
        account_id: &str,
        balance: Decimal,
    ) -> Result<(), StoreError> {
        self.shared.check_fault(FailPoint::UpdateBalance)?;
        if !self.held.contains_key(account_id) {
            return Err(StoreError::NotLocked(account_id.to_string()));
        }
        self.staged_balances.insert(account_id.to_string(), balance);
        Ok(())
    }

    async fn append_entry(&mut self, entry: &NewLedgerEntry) -> Result<(), StoreError> {
        self.shared.check_fault(FailPoint::AppendEntry)?;
        self.staged_entries.push(entry.clone());
        Ok(())
    }

    async fn record_operation(
        &mut self,
        operation_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.shared.check_fault(FailPoint::RecordOperation)?;
        if self
            .staged_operations
            .iter()
            .any(|(id, _)| id == operation_id)
        {
            return Err(StoreError::DuplicateOperation(operation_id.to_string()));
        }
        self.staged_operations.push((operation_id.to_string(), at));
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        self.shared.check_fault(FailPoint::Commit)?;
        self.apply()?;
        self.shared.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.shared.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
