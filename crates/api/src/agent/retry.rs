//! Bounded exponential backoff for rate-limited remote calls.
//!
//! Only rate-limit failures are retried. Anything else propagates on first
//! occurrence, and the wrapped operation's output is passed through untouched.
//!
//! After failed attempt `k` (1-based) the wait is
//! `min(base_delay * 2^k, max_delay)`, so with the defaults the waits are
//! 2s, 4s, 8s, ... capped at 30s.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::claude::ClaudeError;

/// Implemented by errors that can signal "too many requests".
pub trait RateLimitSignal {
    fn is_rate_limited(&self) -> bool;
}

impl RateLimitSignal for ClaudeError {
    fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }
}

/// Retry policy for rate-limited calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first call.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(30_000),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Wait after failed attempt `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Failure of a retried operation.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every attempt was rate limited.
    #[error("max retries exceeded after {attempts} attempts: {last}")]
    MaxRetriesExceeded { attempts: u32, last: E },

    /// The operation failed with a non-retryable error.
    #[error(transparent)]
    Operation(E),
}

/// Run `operation`, retrying rate-limit failures with exponential backoff.
///
/// The backoff is a `tokio::time::sleep`, so other tasks keep running while
/// this one waits.
///
/// # Errors
///
/// Returns `RetryError::Operation` for the first non-rate-limit failure and
/// `RetryError::MaxRetriesExceeded` once `policy.max_attempts` attempts have
/// all been rate limited.
pub async fn with_backoff<F, Fut, T, E>(policy: &RetryPolicy, mut operation: F) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RateLimitSignal,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_rate_limited() => return Err(RetryError::Operation(err)),
            Err(err) if attempt >= max_attempts => {
                tracing::warn!(attempts = attempt, "rate limited on every attempt, giving up");
                return Err(RetryError::MaxRetriesExceeded {
                    attempts: attempt,
                    last: err,
                });
            }
            Err(_) => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "rate limited, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
