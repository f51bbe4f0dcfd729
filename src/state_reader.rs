//! Read-only projection of the ledger for diagnostics.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::models::{Account, LedgerEntry};
use crate::store::{LedgerStore, StoreError};

/// Committed state as seen by one read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSnapshot {
    pub accounts: BTreeMap<String, Account>,
    /// Newest first
    pub ledger: Vec<LedgerEntry>,
    /// Newest first
    pub processed_ops: Vec<String>,
}

pub struct StateReader {
    store: Arc<dyn LedgerStore>,
    limit: usize,
}

impl StateReader {
    pub fn new(store: Arc<dyn LedgerStore>, limit: usize) -> Self {
        Self { store, limit }
    }

    /// Read accounts, recent journal rows and recent operation ids.
    ///
    /// The three queries run concurrently and take no locks. Any failing
    /// query fails the whole read.
    pub async fn snapshot(&self) -> Result<StateSnapshot, StoreError> {
        let (accounts, ledger, operations) = futures::try_join!(
            self.store.accounts(),
            self.store.recent_entries(self.limit),
            self.store.recent_operations(self.limit),
        )?;

        Ok(StateSnapshot {
            accounts: accounts
                .into_iter()
                .map(|account| (account.id.clone(), account))
                .collect(),
            ledger,
            processed_ops: operations.into_iter().map(|op| op.operation_id).collect(),
        })
    }
}
