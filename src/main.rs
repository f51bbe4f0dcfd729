//! Transfer Ledger service
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────┐    ┌──────────┐
//! │  Config  │───▶│  Store   │───▶│  Engine  │───▶│ Gateway  │
//! │  (YAML)  │    │(PG / mem)│    │(transfer)│    │  (axum)  │
//! └──────────┘    └──────────┘    └──────────┘    └──────────┘
//! ```
//!
//! Usage: `transfer_ledger [--env <name>] [--port <port>]`

use std::sync::Arc;

use anyhow::Context;

use transfer_ledger::config::{AppConfig, StoreBackend};
use transfer_ledger::db::Database;
use transfer_ledger::gateway::{self, state::AppState};
use transfer_ledger::store::{self, LedgerStore, MemoryLedgerStore, PgLedgerStore};
use transfer_ledger::{TransferMetrics, logging};

/// Value following `flag` or its short form
fn arg_value(args: &[String], long: &str, short: Option<&str>) -> Option<String> {
    args.iter()
        .position(|a| a == long || Some(a.as_str()) == short)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn get_env(args: &[String]) -> String {
    arg_value(args, "--env", Some("-e")).unwrap_or_else(|| "dev".to_string())
}

/// Get port override from command line (--port argument)
fn get_port_override(args: &[String]) -> anyhow::Result<Option<u16>> {
    arg_value(args, "--port", None)
        .map(|p| p.parse().with_context(|| format!("--port is not a port number: {}", p)))
        .transpose()
}

async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn LedgerStore>> {
    match config.store.backend {
        StoreBackend::Postgres => {
            let db = Database::connect(&config.postgres)
                .await
                .context("Failed to connect to PostgreSQL")?;
            db.init_schema()
                .await
                .context("Failed to initialize ledger schema")?;
            Ok(Arc::new(PgLedgerStore::new(
                Arc::new(db),
                config.postgres.lock_timeout_ms,
            )))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; state is lost on exit");
            Ok(Arc::new(MemoryLedgerStore::new()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let env = get_env(&args);
    let port_override = get_port_override(&args)?;

    let app_config = AppConfig::load(&env)?;
    let _log_guard = logging::init_logging(&app_config)?;

    tracing::info!(
        env = %env,
        version = env!("GIT_HASH"),
        backend = ?app_config.store.backend,
        "Starting transfer ledger"
    );

    let store = open_store(&app_config).await?;
    if app_config.store.seed {
        store
            .seed_accounts(&store::default_seed())
            .await
            .context("Failed to seed accounts")?;
    }

    let metrics = Arc::new(TransferMetrics::new().context("Failed to register metrics")?);
    metrics.refresh_balances(&store.accounts().await.context("Failed to read accounts")?);

    let state = Arc::new(AppState::new(
        store,
        metrics,
        &app_config.transfer,
        app_config.debug_state_limit,
    ));

    let port = port_override.unwrap_or(app_config.gateway.port);
    gateway::run_server(&app_config.gateway.host, port, state).await
}
