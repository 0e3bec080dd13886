//! Service settings: built-in defaults, then an optional TOML file, then
//! environment variables.

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;

use napbridge_core::BridgeError;
use napbridge_storage::PostgresOptions;
use napbridge_ws::ListenerConfig;

/// Flat settings, keyed by the lower-cased environment variable names
/// (`POSTGRES_HOST` → `postgres_host`).
#[derive(Clone, Deserialize)]
pub struct Settings {
    pub postgres_db: String,
    pub postgres_user: String,
    pub postgres_password: String,
    pub postgres_host: String,
    pub postgres_port: u16,
    pub postgres_pool_min: u32,
    pub postgres_pool_max: u32,

    pub ws_url: String,
    pub ws_auth_token: String,
    /// Seconds.
    pub reconnect_delay: u64,
    /// Seconds.
    pub ws_ping_interval: u64,
    /// Seconds.
    pub ws_ping_timeout: u64,

    /// Health endpoint bind settings. The `FLASK_*` names are what existing
    /// deployments already export.
    pub flask_host: String,
    pub flask_port: u16,
    pub flask_debug: bool,
}

impl Settings {
    /// Load from `file` (if it exists) and the process environment.
    pub fn load(file: &Path) -> Result<Self, ConfigError> {
        Self::from_sources(file, Environment::default())
    }

    fn from_sources(file: &Path, env: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("postgres_db", "postgres")?
            .set_default("postgres_user", "postgres")?
            .set_default("postgres_password", "PASSWORD")?
            .set_default("postgres_host", "172.17.0.1")?
            .set_default("postgres_port", 5432)?
            .set_default("postgres_pool_min", 1)?
            .set_default("postgres_pool_max", 5)?
            .set_default("ws_url", "ws://172.17.0.1:3001")?
            .set_default("ws_auth_token", "napcat")?
            .set_default("reconnect_delay", 5)?
            .set_default("ws_ping_interval", 30)?
            .set_default("ws_ping_timeout", 60)?
            .set_default("flask_host", "0.0.0.0")?
            .set_default("flask_port", 5000)?
            .set_default("flask_debug", false)?
            .add_source(File::from(file.to_path_buf()).required(false))
            .add_source(env)
            .build()?
            .try_deserialize()
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<(), BridgeError> {
        if !(self.ws_url.starts_with("ws://") || self.ws_url.starts_with("wss://")) {
            return Err(BridgeError::Config(format!(
                "WS_URL must start with ws:// or wss://, got {:?}",
                self.ws_url
            )));
        }
        if self.postgres_pool_max == 0 {
            return Err(BridgeError::Config("POSTGRES_POOL_MAX must be at least 1".into()));
        }
        if self.postgres_pool_min > self.postgres_pool_max {
            return Err(BridgeError::Config(format!(
                "POSTGRES_POOL_MIN ({}) exceeds POSTGRES_POOL_MAX ({})",
                self.postgres_pool_min, self.postgres_pool_max
            )));
        }
        if self.ws_ping_interval == 0 || self.ws_ping_timeout == 0 {
            return Err(BridgeError::Config(
                "WS_PING_INTERVAL and WS_PING_TIMEOUT must be non-zero".into(),
            ));
        }
        Ok(())
    }

    pub fn listener_config(&self) -> ListenerConfig {
        ListenerConfig {
            url: self.ws_url.clone(),
            auth_token: self.ws_auth_token.clone(),
            reconnect_delay: Duration::from_secs(self.reconnect_delay),
            ping_interval: Duration::from_secs(self.ws_ping_interval),
            ping_timeout: Duration::from_secs(self.ws_ping_timeout),
            ..ListenerConfig::default()
        }
    }

    pub fn pg_connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.postgres_host)
            .port(self.postgres_port)
            .username(&self.postgres_user)
            .password(&self.postgres_password)
            .database(&self.postgres_db)
    }

    pub fn postgres_options(&self) -> PostgresOptions {
        PostgresOptions {
            max_connections: self.postgres_pool_max,
            min_connections: self.postgres_pool_min,
            ..PostgresOptions::default()
        }
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.flask_host, self.flask_port)
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field(
                "postgres",
                &format!(
                    "{}@{}:{}/{}",
                    self.postgres_user, self.postgres_host, self.postgres_port, self.postgres_db
                ),
            )
            .field("pool", &(self.postgres_pool_min..=self.postgres_pool_max))
            .field("ws_url", &self.ws_url)
            .field("reconnect_delay", &self.reconnect_delay)
            .field("ws_ping", &(self.ws_ping_interval, self.ws_ping_timeout))
            .field("http", &self.http_addr())
            .field("flask_debug", &self.flask_debug)
            .finish()
    }
}
