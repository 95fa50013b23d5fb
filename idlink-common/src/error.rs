//! Common error types for idlink

use thiserror::Error;

/// Common result type for idlink store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across idlink crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (corrupt row, injected fault, ...)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// SQLite result codes that mean "another transaction got there first".
///
/// 5 = SQLITE_BUSY, 6 = SQLITE_LOCKED, 261 = SQLITE_BUSY_RECOVERY,
/// 262 = SQLITE_LOCKED_SHAREDCACHE, 517 = SQLITE_BUSY_SNAPSHOT
const CONTENTION_CODES: &[&str] = &["5", "6", "261", "262", "517"];

impl Error {
    /// True when the failed transaction lost a race and can be re-run from scratch.
    ///
    /// Covers writer contention and unique-index violations: a resolution that
    /// collides with a concurrent insert of the same pair will find the winner's
    /// record on the next attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::Database(db_err)) => {
                if db_err.is_unique_violation() {
                    return true;
                }
                if let Some(code) = db_err.code() {
                    if CONTENTION_CODES.contains(&code.as_ref()) {
                        return true;
                    }
                }
                db_err.message().contains("database is locked")
            }
            _ => false,
        }
    }
}
