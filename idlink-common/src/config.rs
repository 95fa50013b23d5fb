//! Store configuration
//!
//! The only externally required option is the store connection string
//! (`DATABASE_URL`). Pool sizing and timeouts have defaults and are
//! overridable from the command line or environment by the binary.

use crate::{Error, Result};
use std::time::Duration;

/// Default maximum pooled connections
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Default connection acquisition timeout
pub const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 5000;

/// Default SQLite busy timeout (how long one statement waits for a lock)
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 250;

/// Default total time a contended transaction is retried before giving up
pub const DEFAULT_MAX_LOCK_WAIT_MS: u64 = 5000;

/// Contact store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Connection string, e.g. `sqlite://contacts.db?mode=rwc`
    pub database_url: String,
    pub max_connections: u32,
    /// Bounded wait for a pooled connection; exceeding it fails the request
    pub acquire_timeout: Duration,
    pub busy_timeout: Duration,
    /// Retry budget for transactions that lose a race
    pub max_lock_wait: Duration,
}

impl StoreConfig {
    /// Create a configuration with default pool settings
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: Duration::from_millis(DEFAULT_ACQUIRE_TIMEOUT_MS),
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
            max_lock_wait: Duration::from_millis(DEFAULT_MAX_LOCK_WAIT_MS),
        }
    }

    /// Validate settings before opening the pool
    pub fn validate(&self) -> Result<()> {
        if self.database_url.trim().is_empty() {
            return Err(Error::Config(
                "DATABASE_URL must not be empty".to_string(),
            ));
        }
        if !self.database_url.starts_with("sqlite:") {
            return Err(Error::Config(format!(
                "Unsupported store URL (expected sqlite:...): {}",
                self.database_url
            )));
        }
        if self.max_connections == 0 {
            return Err(Error::Config(
                "max_connections must be at least 1".to_string(),
            ));
        }
        if self.acquire_timeout.is_zero() {
            return Err(Error::Config(
                "acquire timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
