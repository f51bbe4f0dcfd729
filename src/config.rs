use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub postgres: PostgresConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
    /// Rows returned per list by GET /debug/state
    #[serde(default = "default_debug_state_limit")]
    pub debug_state_limit: usize,
}

fn default_debug_state_limit() -> usize {
    100
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Insert the default accounts on boot when absent
    pub seed: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Postgres,
            seed: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    /// Upper bound on concurrent units of work
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
    /// Per-transaction `lock_timeout`; 0 waits forever
    pub lock_timeout_ms: u64,
    /// Full connection URL; takes precedence over the discrete fields
    pub url: Option<String>,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "postgres".to_string(),
            port: 5432,
            user: "fintech".to_string(),
            password: "fintech".to_string(),
            database: "fintech".to_string(),
            max_connections: 10,
            acquire_timeout_ms: 5000,
            lock_timeout_ms: 5000,
            url: None,
        }
    }
}

impl PostgresConfig {
    pub fn connection_url(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => format!(
                "postgres://{}:{}@{}:{}/{}",
                self.user, self.password, self.host, self.port, self.database
            ),
        }
    }

    /// Apply `DATABASE_URL` and `DB_HOST`/`DB_PORT`/`DB_USER`/`DB_PASSWORD`/`DB_NAME`.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(url) = lookup("DATABASE_URL") {
            self.url = Some(url);
        }
        if let Some(host) = lookup("DB_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("DB_PORT") {
            self.port = port
                .parse()
                .with_context(|| format!("DB_PORT is not a port number: {}", port))?;
        }
        if let Some(user) = lookup("DB_USER") {
            self.user = user;
        }
        if let Some(password) = lookup("DB_PASSWORD") {
            self.password = password;
        }
        if let Some(name) = lookup("DB_NAME") {
            self.database = name;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct TransferConfig {
    /// Attempts per transfer when the store reports a transient failure
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_backoff_ms: 20,
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> anyhow::Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        let mut config = Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path))?;
        config.postgres.apply_env(|key| {
            std::env::var(key).ok().filter(|v| !v.is_empty())
        })?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        anyhow::ensure!(
            config.transfer.max_attempts >= 1,
            "transfer.max_attempts must be at least 1"
        );
        Ok(config)
    }
}
