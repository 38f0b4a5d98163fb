//! Configuration management for the server.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Where documents are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// PostgreSQL through sqlx (transactional)
    Postgres,
    /// In-process document store (non-transactional, lost on restart)
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(ConfigError::InvalidBackend(other.to_string())),
        }
    }
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    pub backend: StorageBackend,
    /// PostgreSQL connection URL, required for the postgres backend
    pub database_url: Option<String>,
    pub max_connections: u32,
    /// Interval of the invariant reconciliation sweep; `None` disables it
    pub reconcile_interval: Option<Duration>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = lookup("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let backend = match lookup("STORAGE_BACKEND") {
            Some(value) => value.parse()?,
            None => StorageBackend::Postgres,
        };

        let database_url = lookup("DATABASE_URL").filter(|url| !url.is_empty());
        if backend == StorageBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::MissingDatabaseUrl);
        }

        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(value) => value
                .parse()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidNumber("DATABASE_MAX_CONNECTIONS"))?,
            None => 10,
        };

        let reconcile_interval = match lookup("RECONCILE_INTERVAL_SECS") {
            Some(value) => {
                let secs: u64 = value
                    .parse()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or(ConfigError::InvalidNumber("RECONCILE_INTERVAL_SECS"))?;
                Some(Duration::from_secs(secs))
            }
            None => None,
        };

        Ok(Self {
            host,
            port,
            backend,
            database_url,
            max_connections,
            reconcile_interval,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("DATABASE_URL environment variable is required for the postgres backend")]
    MissingDatabaseUrl,

    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Unknown STORAGE_BACKEND '{0}' (expected 'postgres' or 'memory')")]
    InvalidBackend(String),

    #[error("{0} must be a positive integer")]
    InvalidNumber(&'static str),
}
