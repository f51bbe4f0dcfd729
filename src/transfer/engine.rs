//! Transfer Engine
//!
//! Runs one transfer as one unit of work:
//!
//! ```text
//! validate -> begin -> processed? -> lock (sorted ids) -> processed? ->
//! funds? -> update balances -> DEBIT + CREDIT -> record operation -> commit
//! ```
//!
//! Every path after `begin` ends in `commit` or `rollback`. A duplicate
//! operation id surfacing at insert or commit time is reported the same way
//! as one found by the up-front check.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use super::error::TransferError;
use super::types::{TransferCommand, TransferOutcome, TransferRequest};
use super::validation::validate;
use crate::config::TransferConfig;
use crate::metrics::TransferMetrics;
use crate::models::NewLedgerEntry;
use crate::store::{LedgerStore, StoreError, UnitOfWork};

/// What the steps inside the unit of work decided
enum Applied {
    Moved(BTreeMap<String, Decimal>),
    AlreadyProcessed,
}

pub struct TransferEngine {
    store: Arc<dyn LedgerStore>,
    metrics: Arc<TransferMetrics>,
    max_attempts: u32,
    retry_backoff: Duration,
}

impl TransferEngine {
    pub fn new(store: Arc<dyn LedgerStore>, metrics: Arc<TransferMetrics>) -> Self {
        Self::with_config(store, metrics, &TransferConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn LedgerStore>,
        metrics: Arc<TransferMetrics>,
        config: &TransferConfig,
    ) -> Self {
        Self {
            store,
            metrics,
            max_attempts: config.max_attempts.max(1),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    /// Execute a transfer request.
    ///
    /// `transfer_requests_total` is incremented exactly once per call.
    pub async fn transfer(&self, request: TransferRequest) -> Result<TransferOutcome, TransferError> {
        let result = self.execute(request).await;
        let label = match &result {
            Ok(outcome) => outcome.metric_label(),
            Err(e) => e.metric_label(),
        };
        self.metrics.record_transfer(label);
        result
    }

    async fn execute(&self, request: TransferRequest) -> Result<TransferOutcome, TransferError> {
        let command = validate(request).inspect_err(|e| {
            info!(reason = %e, "Transfer rejected by validation");
        })?;

        let mut attempt = 1;
        loop {
            match self.attempt(&command).await {
                Err(TransferError::Store(e)) if e.is_retryable() && attempt < self.max_attempts => {
                    warn!(
                        from = %command.from_account_id,
                        to = %command.to_account_id,
                        operation_id = ?command.operation_id,
                        attempt,
                        kind = e.kind(),
                        "Retrying transfer after transient store failure: {}",
                        e
                    );
                    tokio::time::sleep(self.backoff(attempt)).await;
                    attempt += 1;
                }
                Err(TransferError::Store(e)) => {
                    error!(
                        from = %command.from_account_id,
                        to = %command.to_account_id,
                        operation_id = ?command.operation_id,
                        attempt,
                        kind = e.kind(),
                        "Transfer failed: {}",
                        e
                    );
                    return Err(TransferError::Store(e));
                }
                Err(e) => {
                    info!(
                        from = %command.from_account_id,
                        to = %command.to_account_id,
                        amount = %command.amount,
                        operation_id = ?command.operation_id,
                        code = e.code(),
                        "Transfer rejected: {}",
                        e
                    );
                    return Err(e);
                }
                Ok(outcome) => return Ok(outcome),
            }
        }
    }

    /// Linear backoff, saturating at `Duration::MAX`
    fn backoff(&self, attempt: u32) -> Duration {
        self.retry_backoff.saturating_mul(attempt)
    }

    /// One unit of work; always committed or rolled back before returning.
    async fn attempt(&self, command: &TransferCommand) -> Result<TransferOutcome, TransferError> {
        let mut uow = self.store.begin().await?;

        match self.apply(&mut *uow, command).await {
            Ok(Applied::Moved(balances)) => match uow.commit().await {
                Ok(()) => {
                    for (account_id, balance) in &balances {
                        self.metrics.set_balance(account_id, *balance);
                    }
                    info!(
                        from = %command.from_account_id,
                        to = %command.to_account_id,
                        amount = %command.amount,
                        operation_id = ?command.operation_id,
                        "Transfer committed"
                    );
                    Ok(TransferOutcome::Completed { balances })
                }
                Err(StoreError::DuplicateOperation(op)) => {
                    debug!(operation_id = %op, "Operation recorded concurrently, commit refused");
                    Ok(TransferOutcome::AlreadyProcessed)
                }
                Err(e) => Err(e.into()),
            },
            Ok(Applied::AlreadyProcessed) => {
                rollback(uow, command).await;
                debug!(operation_id = ?command.operation_id, "Operation already processed");
                Ok(TransferOutcome::AlreadyProcessed)
            }
            Err(TransferError::Store(StoreError::DuplicateOperation(op))) => {
                rollback(uow, command).await;
                debug!(operation_id = %op, "Operation recorded concurrently");
                Ok(TransferOutcome::AlreadyProcessed)
            }
            Err(e) => {
                rollback(uow, command).await;
                Err(e)
            }
        }
    }

    async fn apply(
        &self,
        uow: &mut dyn UnitOfWork,
        command: &TransferCommand,
    ) -> Result<Applied, TransferError> {
        if already_processed(uow, command).await? {
            return Ok(Applied::AlreadyProcessed);
        }

        let [first, second] = command.lock_order();
        let first_balance = lock_existing(uow, first).await?;
        let second_balance = lock_existing(uow, second).await?;

        // A concurrent holder of the same key commits before releasing its locks
        if already_processed(uow, command).await? {
            return Ok(Applied::AlreadyProcessed);
        }
        let (from_balance, to_balance) = if first == command.from_account_id {
            (first_balance, second_balance)
        } else {
            (second_balance, first_balance)
        };

        if from_balance < command.amount {
            return Err(TransferError::InsufficientFunds {
                account: command.from_account_id.clone(),
                balance: from_balance,
                amount: command.amount,
            });
        }

        let new_from = from_balance - command.amount;
        let new_to = to_balance + command.amount;
        uow.update_balance(&command.from_account_id, new_from).await?;
        uow.update_balance(&command.to_account_id, new_to).await?;

        let at = Utc::now();
        for entry in NewLedgerEntry::pair(
            &command.from_account_id,
            &command.to_account_id,
            command.amount,
            at,
        ) {
            uow.append_entry(&entry).await?;
        }

        if let Some(operation_id) = &command.operation_id {
            uow.record_operation(operation_id, at).await?;
        }

        Ok(Applied::Moved(BTreeMap::from([
            (command.from_account_id.clone(), new_from),
            (command.to_account_id.clone(), new_to),
        ])))
    }
}

async fn already_processed(
    uow: &mut dyn UnitOfWork,
    command: &TransferCommand,
) -> Result<bool, TransferError> {
    match &command.operation_id {
        Some(operation_id) => Ok(uow.is_processed(operation_id).await?),
        None => Ok(false),
    }
}

async fn lock_existing(uow: &mut dyn UnitOfWork, account_id: &str) -> Result<Decimal, TransferError> {
    uow.lock_account(account_id)
        .await?
        .ok_or_else(|| TransferError::AccountNotFound(account_id.to_string()))
}

async fn rollback(uow: Box<dyn UnitOfWork>, command: &TransferCommand) {
    if let Err(e) = uow.rollback().await {
        error!(
            from = %command.from_account_id,
            to = %command.to_account_id,
            operation_id = ?command.operation_id,
            "Rollback failed: {}",
            e
        );
    }
}
