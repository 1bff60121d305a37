//! Retry Controller
//!
//! Wraps an asynchronous backend call with bounded exponential backoff. The
//! controller is stateless across calls: every [`RetryController::run`]
//! invocation owns its attempt counter and delay.

use crate::cancel::CancelToken;
use crate::config::RetryConfig;
use crate::error::StudioError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Backoff parameters for one class of backend calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts before the last error is returned (including the first call)
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each subsequent retry
    pub initial_delay: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(2000);

    pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
        }
    }

    /// Delay to wait after the failed attempt numbered `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_RETRIES, Self::DEFAULT_INITIAL_DELAY)
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.initial_delay_ms),
        )
    }
}

/// Per-invocation bookkeeping
#[derive(Debug, Clone, Copy, Default)]
struct RetryState {
    attempt: u32,
    delay: Duration,
}

/// Runs operations under a [`RetryPolicy`]
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryController {
    policy: RetryPolicy,
}

impl RetryController {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error, or
    /// the attempt budget is spent.
    ///
    /// `on_retry(retry_number, delay)` fires before each backoff sleep, with
    /// `retry_number` starting at 1. With `max_retries = n` an always-transient
    /// operation is attempted `n` times and `on_retry` fires `n - 1` times.
    pub async fn run<T, F, Fut, R>(&self, operation: F, on_retry: R) -> Result<T, StudioError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StudioError>>,
        R: FnMut(u32, Duration),
    {
        self.run_inner(None, operation, on_retry).await
    }

    /// Like [`RetryController::run`], but a backoff sleep ends early with
    /// `Err(StudioError::Cancelled)` once `token` is cancelled.
    pub async fn run_cancellable<T, F, Fut, R>(
        &self,
        token: &CancelToken,
        operation: F,
        on_retry: R,
    ) -> Result<T, StudioError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StudioError>>,
        R: FnMut(u32, Duration),
    {
        self.run_inner(Some(token), operation, on_retry).await
    }

    async fn run_inner<T, F, Fut, R>(
        &self,
        cancel: Option<&CancelToken>,
        mut operation: F,
        mut on_retry: R,
    ) -> Result<T, StudioError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StudioError>>,
        R: FnMut(u32, Duration),
    {
        let max_attempts = self.policy.max_retries.max(1);
        let mut state = RetryState::default();

        loop {
            match operation().await {
                Ok(value) => {
                    if state.attempt > 0 {
                        debug!(attempts = state.attempt + 1, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => {
                    if state.attempt + 1 >= max_attempts {
                        warn!(
                            attempts = state.attempt + 1,
                            error = %err,
                            "Retries exhausted"
                        );
                        return Err(err);
                    }

                    state.delay = self.policy.delay_for(state.attempt).max(state.delay);
                    state.attempt += 1;
                    warn!(
                        attempt = state.attempt,
                        max_attempts,
                        delay_ms = state.delay.as_millis() as u64,
                        error = %err,
                        "Transient backend error, backing off"
                    );
                    on_retry(state.attempt, state.delay);
                    match cancel {
                        Some(token) => {
                            tokio::select! {
                                biased;
                                _ = token.cancelled() => return Err(StudioError::Cancelled),
                                _ = sleep(state.delay) => {}
                            }
                        }
                        None => sleep(state.delay).await,
                    }
                }
            }
        }
    }
}

/// Convenience wrapper around [`RetryController::run`].
pub async fn run_with_retry<T, F, Fut, R>(
    policy: RetryPolicy,
    operation: F,
    on_retry: R,
) -> Result<T, StudioError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StudioError>>,
    R: FnMut(u32, Duration),
{
    RetryController::new(policy).run(operation, on_retry).await
}
