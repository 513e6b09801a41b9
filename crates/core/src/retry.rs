//! Bounded retries with exponential backoff.
//!
//! Wraps any single-shot fallible async operation. Failures are classified
//! through [`Classify`]: transient ones are retried after a growing delay,
//! permanent ones are returned immediately. Every attempt and every wait is
//! raced against a [`CancellationToken`].

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Whether a failure is worth another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    Permanent,
}

/// Implemented by error types the retry caller can reason about.
pub trait Classify {
    fn class(&self) -> ErrorClass;

    fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

/// Retry parameters. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Zero is treated as one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    fn effective_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Wait after the `failed`-th failed attempt (1-based), capped at `max_delay`.
    pub fn delay_for(&self, failed: u32) -> Duration {
        let multiplier = self.backoff_multiplier.powi(failed.saturating_sub(1) as i32);
        let secs = self.initial_delay.as_secs_f64() * multiplier;
        Duration::try_from_secs_f64(secs)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// The waits between attempts when every attempt fails transiently.
    pub fn backoff_schedule(&self) -> Vec<Duration> {
        (1..self.effective_attempts())
            .map(|failed| self.delay_for(failed))
            .collect()
    }
}

/// Why a retried operation gave up.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    #[error("retries exhausted after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    #[error("permanent failure: {0}")]
    Permanent(E),

    #[error("cancelled")]
    Cancelled,
}

/// Run `operation` under `policy`.
pub async fn execute<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify,
{
    execute_observed(policy, cancel, operation, |_, _, _| {}).await
}

/// Like [`execute`], calling `on_retry(attempt, delay, &error)` before each wait.
pub async fn execute_observed<T, E, F, Fut, O>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
    mut on_retry: O,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify,
    O: FnMut(u32, Duration, &E),
{
    let max_attempts = policy.effective_attempts();
    let mut attempt = 0;

    loop {
        attempt += 1;

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            result = operation() => result,
        };

        let err = match outcome {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.is_transient() {
            return Err(RetryError::Permanent(err));
        }
        if attempt >= max_attempts {
            return Err(RetryError::Exhausted {
                attempts: attempt,
                last: err,
            });
        }

        let delay = policy.delay_for(attempt);
        on_retry(attempt, delay, &err);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
