//! Classification-driven retry.
//!
//! Every failure is classified before any backoff delay is taken: a
//! permanent failure is handed back unchanged after the attempt that
//! produced it, a transient one is retried until the attempt cap.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Whether a failed operation may succeed if attempted again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Retryability {
    /// A platform hiccup; the same call may succeed later.
    Transient,
    /// Retrying cannot change the outcome.
    Permanent,
}

/// Delay growth between attempts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    /// The initial delay before every retry.
    Fixed,
    /// `initial * 2^retry`, capped at the maximum delay.
    #[default]
    Exponential,
}

/// Failure returned by [`RetryPolicy::run`].
#[derive(Debug, PartialEq, Eq)]
pub enum RetryError<E> {
    /// The error was classified permanent and returned as-is.
    Permanent(E),
    /// Every attempt failed transiently; carries the last error.
    Exhausted { attempts: u32, last: E },
}

impl<E> RetryError<E> {
    /// The underlying error, whichever way the retry loop ended.
    pub fn into_inner(self) -> E {
        match self {
            Self::Permanent(e) => e,
            Self::Exhausted { last, .. } => last,
        }
    }
}

/// Retry policy: attempt cap and backoff schedule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
    backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential()
    }
}

impl RetryPolicy {
    /// Exponential backoff from 100ms up to 5s, at most 4 attempts.
    pub fn exponential() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff: Backoff::Exponential,
        }
    }

    /// The same delay before every retry, at most 4 attempts.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            max_attempts: 4,
            initial_delay: delay,
            max_delay: delay,
            backoff: Backoff::Fixed,
        }
    }

    /// A single attempt with no retries.
    pub fn no_retry() -> Self {
        Self::exponential().with_max_attempts(1)
    }

    /// Set the total number of attempts. Zero is treated as one.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the delay before the first retry.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the cap on any single delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the backoff strategy.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Total number of attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retry number `retry` (0 = the first retry).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let delay = match self.backoff {
            Backoff::Fixed => self.initial_delay,
            Backoff::Exponential => self.initial_delay.saturating_mul(2u32.saturating_pow(retry)),
        };
        delay.min(self.max_delay)
    }

    /// Run `operation` until it succeeds, fails permanently, or the attempt
    /// cap is reached.
    ///
    /// `operation` receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut, C>(&self, mut operation: F, classify: C) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> Retryability,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let err = match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if classify(&err) == Retryability::Permanent {
                return Err(RetryError::Permanent(err));
            }

            if attempt >= max_attempts {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: err,
                });
            }

            let delay = self.delay_for(attempt - 1);
            tracing::warn!(
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                "transient failure, backing off"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
