//! PostgreSQL pool and ledger schema

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::config::PostgresConfig;

const CREATE_ACCOUNTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id      TEXT PRIMARY KEY,
    balance NUMERIC(18, 2) NOT NULL CHECK (balance >= 0)
)"#;

const CREATE_LEDGER_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS ledger (
    id         BIGSERIAL PRIMARY KEY,
    type       TEXT NOT NULL CHECK (type IN ('DEBIT', 'CREDIT')),
    account_id TEXT NOT NULL REFERENCES accounts (id),
    amount     NUMERIC(18, 2) NOT NULL CHECK (amount > 0),
    at         TIMESTAMPTZ NOT NULL
)"#;

const CREATE_PROCESSED_OPS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS processed_ops (
    operation_id TEXT PRIMARY KEY,
    created_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
)"#;

/// Pooled PostgreSQL connections; one connection per unit of work
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Open the pool sized by `max_connections`
    pub async fn connect(config: &PostgresConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_millis(config.acquire_timeout_ms))
            .connect(&config.connection_url())
            .await?;

        tracing::info!(
            max_connections = config.max_connections,
            "PostgreSQL connection pool established"
        );
        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Create `accounts`, `ledger` and `processed_ops` if missing
    pub async fn init_schema(&self) -> Result<(), sqlx::Error> {
        for (table, ddl) in [
            ("accounts", CREATE_ACCOUNTS_TABLE),
            ("ledger", CREATE_LEDGER_TABLE),
            ("processed_ops", CREATE_PROCESSED_OPS_TABLE),
        ] {
            sqlx::query(ddl).execute(&self.pool).await.inspect_err(|e| {
                tracing::error!("Failed to create {} table: {}", table, e);
            })?;
        }
        tracing::info!("Ledger schema ready");
        Ok(())
    }
}
