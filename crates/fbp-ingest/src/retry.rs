//! Exponential backoff for transient source errors.
//!
//! Transient errors ([`SourceError::is_transient`]) are retried; permanent
//! ones and cancellation are returned immediately. There is no jitter, so a
//! given failure sequence always produces the same schedule.

use std::future::Future;
use std::time::Duration;

use fbp_core::AppConfig;
use tokio_util::sync::CancellationToken;

use crate::error::{Cancelled, RetryError, SourceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_retries: config.retry_max,
            base_delay: Duration::from_millis(config.retry_base_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
        }
    }

    /// Delay before retry number `attempt + 1`.
    ///
    /// | attempt | delay |
    /// |---------|-------|
    /// | 0 | base |
    /// | 1 | 2 × base |
    /// | 2 | 4 × base |
    ///
    /// A server-provided retry-after wins when it is longer. The result never
    /// exceeds `max_delay`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, err: &SourceError) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
        let computed = self.base_delay.saturating_mul(factor);
        let delay = match err.retry_after() {
            Some(retry_after) => computed.max(retry_after),
            None => computed,
        };
        delay.min(self.max_delay)
    }
}

/// Executes `operation` with exponential backoff retries on transient errors.
///
/// Cancellation is checked before every attempt and interrupts backoff
/// sleeps. With `max_retries = 3` the operation runs at most 4 times.
///
/// # Errors
///
/// Returns the last [`SourceError`] once retries are exhausted, any
/// permanent error immediately, or [`RetryError::Cancelled`].
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RetryError>>,
{
    let mut attempt = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(Cancelled.into());
        }

        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(RetryError::Source(err)) => err,
            Err(cancelled @ RetryError::Cancelled(_)) => return Err(cancelled),
        };

        if !err.is_transient() || attempt >= policy.max_retries {
            return Err(err.into());
        }

        let delay = policy.delay_for(attempt, &err);
        tracing::warn!(
            attempt,
            max_retries = policy.max_retries,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "transient source error, retrying after backoff"
        );
        tokio::select! {
            () = cancel.cancelled() => return Err(Cancelled.into()),
            () = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}
