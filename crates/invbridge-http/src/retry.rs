//! Exponential backoff with a cap
//!
//! For attempt `a` (0-based) a retryable failure sleeps `min(cap, 2^a s)`
//! before the next attempt. After `max_retries` attempts the last error is
//! returned. Nothing sleeps after the final attempt.

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use invbridge_core::config::Config;

/// Classifies errors for [`RetryPolicy::run`]
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Why [`RetryPolicy::run`] gave up
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    /// A non-retryable error ended the loop early
    #[error("{0}")]
    Permanent(E),
}

/// Retry parameters shared by both HTTP adapters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    cap: Duration,
}

impl RetryPolicy {
    /// Creates a policy making at most `max_retries` attempts (at least one)
    pub fn new(max_retries: u32, cap: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            cap,
        }
    }

    /// Policy from the `http` section of the configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.http.max_retries, config.http.backoff_cap())
    }

    /// Total attempts before giving up
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn cap(&self) -> Duration {
        self.cap
    }

    /// Delay slept after a retryable failure of attempt `attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_secs(exp).min(self.cap)
    }

    /// Runs `operation` until it succeeds, fails permanently, or runs out
    /// of attempts
    ///
    /// # Arguments
    /// * `operation_name` - Label used in retry log lines
    /// * `f` - Produces a fresh future per attempt
    ///
    /// # Errors
    ///
    /// `RetryError::Permanent` for the first non-retryable error,
    /// `RetryError::Exhausted` after `max_retries` retryable failures.
    pub async fn run<F, Fut, T, E>(&self, operation_name: &str, mut f: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + std::fmt::Display,
    {
        let mut attempt = 0u32;
        loop {
            match f().await {
                Ok(value) => {
                    if attempt > 0 {
                        info!(
                            operation = operation_name,
                            attempt, "Operation succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(err) if !err.is_retryable() => return Err(RetryError::Permanent(err)),
                Err(err) => {
                    if attempt + 1 >= self.max_retries {
                        warn!(
                            operation = operation_name,
                            attempts = attempt + 1,
                            error = %err,
                            "Retry limit exhausted"
                        );
                        return Err(RetryError::Exhausted {
                            attempts: attempt + 1,
                            last: err,
                        });
                    }

                    let delay = self.delay_for(attempt);
                    warn!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        delay_secs = delay.as_secs(),
                        error = %err,
                        "Transient error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(6, Duration::from_secs(60))
    }
}
