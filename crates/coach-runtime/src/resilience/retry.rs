//! Bounded retry with exponential backoff and jitter.
//!
//! Only errors that signal upstream overload are retried. Everything else
//! is returned at once. The retry budget is mandatory: retrying without
//! bound against an overloaded upstream only adds to its load.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of an error for retry purposes.
pub trait Retryable {
    /// True if the error is transient overload and the call may be repeated.
    fn is_retryable(&self) -> bool;
}

/// Retry budget and backoff curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub retries: u32,

    /// Delay before the first retry
    #[serde(with = "crate::config::duration_str")]
    pub min_delay: Duration,

    /// Cap on the exponential delay (jitter is added on top)
    #[serde(with = "crate::config::duration_str")]
    pub max_delay: Duration,

    /// Upper bound (exclusive) of the random jitter
    #[serde(with = "crate::config::duration_str")]
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 4,
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(6000),
            max_jitter: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn none() -> Self {
        Self {
            retries: 0,
            ..Default::default()
        }
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Backoff before retry number `attempt` (1-based), without jitter:
    /// `min(max_delay, min_delay * 2^(attempt-1))`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self.min_delay.saturating_mul(1u32 << exponent);
        delay.min(self.max_delay)
    }

    /// Backoff plus a random jitter in `0..max_jitter`.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.backoff(attempt) + self.jitter()
    }

    fn jitter(&self) -> Duration {
        let max = self.max_jitter.as_millis() as u64;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..max))
    }

    /// Worst-case total time spent waiting across the whole budget.
    pub fn worst_case_wait(&self) -> Duration {
        (1..=self.retries)
            .map(|attempt| self.backoff(attempt) + self.max_jitter)
            .sum()
    }
}

/// Terminal outcome of [`with_retries`].
#[derive(Error, Debug)]
pub enum RetryError<E: fmt::Display> {
    /// Every attempt hit a retryable error
    #[error("service overloaded, retries exhausted after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    /// A non-retryable error; returned on first sight
    #[error("{0}")]
    Fatal(E),
}

impl<E: fmt::Display> RetryError<E> {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }
}

/// Run `operation`, retrying retryable failures per `policy`.
///
/// Makes at most `policy.retries + 1` calls. Waits use `tokio::time::sleep`,
/// so a waiting call never blocks other tasks.
pub async fn with_retries<F, Fut, T, E>(policy: &RetryPolicy, mut operation: F) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + fmt::Display,
{
    let mut attempt: u32 = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(retries = attempt, "Call succeeded after retrying");
                }
                return Ok(value);
            }
            Err(e) if !e.is_retryable() => return Err(RetryError::Fatal(e)),
            Err(e) => {
                attempt += 1;
                if attempt > policy.retries {
                    tracing::warn!(
                        attempts = attempt,
                        error = %e,
                        "Retry budget exhausted"
                    );
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: e,
                    });
                }

                let delay = policy.delay(attempt);
                tracing::warn!(
                    attempt = attempt,
                    max = policy.retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying after overload signal"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
