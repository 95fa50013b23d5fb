//! Retry for transactions that lose a race
//!
//! A resolution or deletion that collides with a concurrent writer (busy
//! database, stale snapshot, duplicate active pair) is rolled back by the store
//! and re-run from scratch with exponential backoff until `max_wait` elapses.
//!
//! **Backoff Strategy:**
//! - Initial delay: 10ms
//! - Max delay: 1000ms
//! - Multiplier: 2.0 (exponential)

use std::future::Future;
use std::time::{Duration, Instant};

use crate::Error;

const INITIAL_BACKOFF_MS: u64 = 10;
const MAX_BACKOFF_MS: u64 = 1000;

/// Errors that can tell whether re-running the whole unit of work may succeed
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for Error {
    fn is_retryable(&self) -> bool {
        Error::is_retryable(self)
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// `max_wait` has elapsed. The last error is returned when the budget runs out.
pub async fn retry_on_lock<F, Fut, T, E>(
    operation_name: &str,
    max_wait: Duration,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let start_time = Instant::now();
    let mut attempt = 0u32;
    let mut backoff_ms = INITIAL_BACKOFF_MS;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                if !err.is_retryable() {
                    return Err(err);
                }

                let elapsed = start_time.elapsed();
                if elapsed >= max_wait {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = elapsed.as_millis() as u64,
                        max_wait_ms = max_wait.as_millis() as u64,
                        error = %err,
                        "Giving up: retry budget exhausted"
                    );
                    return Err(err);
                }

                let remaining = max_wait.saturating_sub(elapsed);
                let delay = Duration::from_millis(backoff_ms).min(remaining);

                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transaction lost a race, retrying"
                );

                tokio::time::sleep(delay).await;
                backoff_ms = (backoff_ms * 2).min(MAX_BACKOFF_MS);
            }
        }
    }
}
