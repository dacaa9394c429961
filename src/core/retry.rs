//! Bounded retry with exponential backoff
//!
//! The n-th retry waits `base_delay * 2^(n-1)`, capped at `max_delay`. An
//! operation is submitted at most `max_attempts` times.

use crate::config::RetryConfig;
use crate::core::cancel::CancelToken;
use crate::domain::Result;
use crate::log_retry_attempt;
use std::future::Future;
use std::time::Duration;

/// Retry settings shared by the writer and the scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum submissions of the same request
    pub max_attempts: usize,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound of any delay
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Build from configuration
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }

    /// Policy without delays, for tests and dry runs
    pub fn immediate(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: usize) -> Duration {
        let exponent = retry.saturating_sub(1).min(31) as u32;
        self.base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Sleep before retry number `retry`, abandoning the wait on cancellation
    pub async fn backoff(&self, retry: usize, cancel: &CancelToken) -> Result<()> {
        let delay = self.delay_for(retry);
        if delay.is_zero() {
            return match cancel.reason() {
                Some(_) => Err(cancel.error()),
                None => Ok(()),
            };
        }
        cancel.run(tokio::time::sleep(delay)).await
    }

    /// Run `operation` until it succeeds, fails permanently or attempts run out
    ///
    /// Only retryable errors ([`FerryError::is_retryable`](crate::domain::FerryError::is_retryable))
    /// are retried. The last error is returned on exhaustion.
    pub async fn run<T, F, Fut>(&self, what: &str, cancel: &CancelToken, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match cancel.run(operation()).await? {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    log_retry_attempt!(attempt, self.max_attempts, format!("{what}: {e}"));
                    self.backoff(attempt, cancel).await?;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
