//! Fixed-window outbound rate limiting, one limiter per source.
//!
//! A call that finds its window exhausted is deferred until the window
//! resets; a rate-limit rejection from the source additionally pushes a
//! `backoff_until` instant that defers every call until it passes.

use std::sync::Arc;
use std::time::Duration;

use fbp_core::SourceConfig;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::Cancelled;

/// Window bookkeeping for one source.
#[derive(Debug, Clone)]
pub struct RateState {
    pub requests_in_window: u32,
    pub window_start: Instant,
    pub window_limit: u32,
    pub window: Duration,
    pub backoff_until: Option<Instant>,
}

impl RateState {
    #[must_use]
    pub fn new(window_limit: u32, window: Duration) -> Self {
        Self {
            requests_in_window: 0,
            window_start: Instant::now(),
            window_limit: window_limit.max(1),
            window,
            backoff_until: None,
        }
    }

    /// Take a slot at `now`, or return the instant the caller must wait for.
    fn try_take(&mut self, now: Instant) -> Result<(), Instant> {
        if let Some(until) = self.backoff_until {
            if now < until {
                return Err(until);
            }
            self.backoff_until = None;
        }

        if now.duration_since(self.window_start) >= self.window {
            self.window_start = now;
            self.requests_in_window = 0;
        }

        if self.requests_in_window >= self.window_limit {
            return Err(self.window_start + self.window);
        }

        self.requests_in_window += 1;
        Ok(())
    }
}

/// Cloneable handle to a source's [`RateState`].
#[derive(Debug, Clone)]
pub struct RateLimiter {
    state: Arc<Mutex<RateState>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(window_limit: u32, window: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(RateState::new(window_limit, window))),
        }
    }

    #[must_use]
    pub fn from_config(config: &SourceConfig) -> Self {
        Self::new(config.window_limit, Duration::from_secs(config.window_secs))
    }

    /// Snapshot of the current window state.
    pub async fn state(&self) -> RateState {
        self.state.lock().await.clone()
    }

    /// Defer all calls for at least `delay` from now.
    pub async fn backoff(&self, delay: Duration) {
        let until = Instant::now() + delay;
        let mut state = self.state.lock().await;
        state.backoff_until = Some(state.backoff_until.map_or(until, |prev| prev.max(until)));
    }

    /// Wait for a slot, returning how long the call was deferred.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] if `cancel` fires while waiting.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<Duration, Cancelled> {
        let started = Instant::now();
        loop {
            if cancel.is_cancelled() {
                return Err(Cancelled);
            }

            let wait_until = {
                let mut state = self.state.lock().await;
                match state.try_take(Instant::now()) {
                    Ok(()) => return Ok(started.elapsed()),
                    Err(until) => until,
                }
            };

            tracing::debug!(
                wait_ms = wait_until.saturating_duration_since(Instant::now()).as_millis(),
                "rate limit window exhausted, deferring call"
            );
            tokio::select! {
                () = cancel.cancelled() => return Err(Cancelled),
                () = tokio::time::sleep_until(wait_until) => {}
            }
        }
    }
}
