//! Bounded retry with backoff.
//!
//! [`RetryPolicy::run`] wraps one operation, usually a single
//! [`RequestExecutor::execute`](crate::RequestExecutor::execute), and
//! repeats it only for errors where another attempt could help (see
//! [`RouteError::is_retryable`]). Everything else returns on first
//! occurrence.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::RouteError;

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    /// Same delay every time.
    Fixed,
    /// Delay doubles after each attempt.
    #[default]
    Exponential,
}

/// Strategy for retrying failed requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Upper bound for any single delay, including `Retry-After`.
    pub max_delay: Duration,
    /// Delay growth.
    pub backoff: Backoff,
    /// Adds up to 25% random delay to spread out concurrent retries.
    pub jitter: bool,
}

impl RetryPolicy {
    /// Creates a new retry policy.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff: Backoff::Exponential,
            jitter: false,
        }
    }

    /// Disables retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff: Backoff::Fixed,
            jitter: false,
        }
    }

    /// Sets the base delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff growth.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Calculates the delay after the given (1-based) failed attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = match self.backoff {
            Backoff::Fixed => self.base_delay,
            Backoff::Exponential => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                self.base_delay.saturating_mul(factor)
            }
        };

        delay.min(self.max_delay)
    }

    fn delay_after(&self, attempt: u32, error: &RouteError) -> Duration {
        let delay = error
            .retry_after()
            .map_or_else(|| self.delay_for_attempt(attempt), |d| d.min(self.max_delay));

        if self.jitter && !delay.is_zero() {
            let extra_ms = u64::try_from(delay.as_millis() / 4).unwrap_or(u64::MAX);
            let extra = Duration::from_millis(rand::thread_rng().gen_range(0..=extra_ms));
            delay.saturating_add(extra).min(self.max_delay)
        } else {
            delay
        }
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or
    /// attempts run out.
    ///
    /// `op` receives the 1-based attempt number. Cancelling `cancel` aborts
    /// both an in-flight attempt and a backoff wait immediately.
    ///
    /// # Errors
    ///
    /// The first non-retryable error as-is, [`RouteError::RetryExhausted`]
    /// wrapping the last error once attempts run out, or
    /// [`RouteError::Cancelled`].
    pub async fn run<T, F, Fut>(&self, cancel: &CancellationToken, mut op: F) -> Result<T, RouteError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, RouteError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(RouteError::Cancelled),
                result = op(attempt) => result,
            };

            let error = match result {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "Request succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) if !error.is_retryable() => return Err(error),
                Err(error) => error,
            };

            if attempt >= max_attempts {
                warn!(attempts = attempt, error = %error, "Retries exhausted");
                return Err(RouteError::RetryExhausted {
                    attempts: attempt,
                    last: Box::new(error),
                });
            }

            let delay = self.delay_after(attempt, &error);
            warn!(
                attempt,
                error = %error,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Request failed, retrying"
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(RouteError::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}
