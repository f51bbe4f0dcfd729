//! PostgreSQL ledger store
//!
//! One unit of work = one `sqlx::Transaction` on a pooled connection.
//! Row ownership is taken with `SELECT ... FOR UPDATE`; the transaction is
//! `READ COMMITTED`, so statements issued after a lock is granted observe
//! everything committed by the previous holder.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Row, Transaction};

use super::{LedgerStore, StoreError, UnitOfWork};
use crate::db::Database;
use crate::models::{Account, EntryType, LedgerEntry, NewLedgerEntry, ProcessedOperation};

/// PostgreSQL-backed [`LedgerStore`]
pub struct PgLedgerStore {
    db: Arc<Database>,
    /// Applied with `set_config('lock_timeout', ..., true)` at the start of each unit of work
    lock_timeout_ms: u64,
}

impl PgLedgerStore {
    pub fn new(db: Arc<Database>, lock_timeout_ms: u64) -> Self {
        Self {
            db,
            lock_timeout_ms,
        }
    }

    fn pool(&self) -> &PgPool {
        self.db.pool()
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let mut tx = self.pool().begin().await?;
        if self.lock_timeout_ms > 0 {
            sqlx::query("SELECT set_config('lock_timeout', $1, true)")
                .bind(format!("{}ms", self.lock_timeout_ms))
                .execute(&mut *tx)
                .await?;
        }
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn seed_accounts(&self, accounts: &[Account]) -> Result<(), StoreError> {
        let mut tx = self.pool().begin().await?;
        for account in accounts {
            let inserted = sqlx::query(
                "INSERT INTO accounts (id, balance) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING",
            )
            .bind(&account.id)
            .bind(account.balance)
            .execute(&mut *tx)
            .await?;
            if inserted.rows_affected() > 0 {
                tracing::info!(account = %account.id, balance = %account.balance, "Seeded account");
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn accounts(&self) -> Result<Vec<Account>, StoreError> {
        let rows = sqlx::query("SELECT id, balance FROM accounts ORDER BY id")
            .fetch_all(self.pool())
            .await?;

        rows.iter()
            .map(|row| -> Result<Account, StoreError> {
                Ok(Account {
                    id: row.try_get("id")?,
                    balance: row.try_get("balance")?,
                })
            })
            .collect()
    }

    async fn recent_entries(&self, limit: usize) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, type, account_id, amount, at FROM ledger ORDER BY id DESC LIMIT $1",
        )
        .bind(clamp_limit(limit))
        .fetch_all(self.pool())
        .await?;

        rows.iter()
            .map(|row| -> Result<LedgerEntry, StoreError> {
                let raw_type: String = row.try_get("type")?;
                let entry_type = raw_type
                    .parse::<EntryType>()
                    .map_err(StoreError::CorruptRow)?;
                Ok(LedgerEntry {
                    id: row.try_get("id")?,
                    entry_type,
                    account_id: row.try_get("account_id")?,
                    amount: row.try_get("amount")?,
                    at: row.try_get("at")?,
                })
            })
            .collect()
    }

    async fn recent_operations(
        &self,
        limit: usize,
    ) -> Result<Vec<ProcessedOperation>, StoreError> {
        let rows = sqlx::query(
            "SELECT operation_id, created_at FROM processed_ops ORDER BY created_at DESC LIMIT $1",
        )
        .bind(clamp_limit(limit))
        .fetch_all(self.pool())
        .await?;

        rows.iter()
            .map(|row| -> Result<ProcessedOperation, StoreError> {
                Ok(ProcessedOperation {
                    operation_id: row.try_get("operation_id")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.db.health_check().await?;
        Ok(())
    }
}

fn clamp_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn is_processed(&mut self, operation_id: &str) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM processed_ops WHERE operation_id = $1)",
        )
        .bind(operation_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn lock_account(&mut self, account_id: &str) -> Result<Option<Decimal>, StoreError> {
        let balance: Option<Decimal> =
            sqlx::query_scalar("SELECT balance FROM accounts WHERE id = $1 FOR UPDATE")
                .bind(account_id)
                .fetch_optional(&mut *self.tx)
                .await?;
        Ok(balance)
    }

    async fn update_balance(
        &mut self,
        account_id: &str,
        balance: Decimal,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE accounts SET balance = $1 WHERE id = $2")
            .bind(balance)
            .bind(account_id)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotLocked(account_id.to_string()));
        }
        Ok(())
    }

    async fn append_entry(&mut self, entry: &NewLedgerEntry) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO ledger (type, account_id, amount, at) VALUES ($1, $2, $3, $4)")
            .bind(entry.entry_type.as_str())
            .bind(&entry.account_id)
            .bind(entry.amount)
            .bind(entry.at)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn record_operation(
        &mut self,
        operation_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        // Blocks behind a concurrent uncommitted insert of the same key, then
        // either succeeds (other side rolled back) or hits the primary key.
        sqlx::query("INSERT INTO processed_ops (operation_id, created_at) VALUES ($1, $2)")
            .bind(operation_id)
            .bind(at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| StoreError::from_operation_insert(e, operation_id))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
