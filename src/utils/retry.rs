//! Bounded retry with exponential or randomized backoff.
//!
//! The operation decides what is retryable: it returns
//! [`AttemptError::Transient`] for failures the policy may retry and
//! [`AttemptError::Fatal`] for everything else.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{FetchError, TransientError};

/// How the delay between attempts grows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `min_delay * multiplier^(n-1)`, capped at `max_delay`
    Exponential,
    /// Uniformly random between `min_delay` and `max_delay`
    Jittered,
}

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    /// Initial (exponential) or lower (jittered) delay
    pub min_delay: Duration,
    /// Maximum delay between attempts
    pub max_delay: Duration,
    pub backoff: Backoff,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(5, Duration::from_secs(1), Duration::from_secs(2))
    }
}

impl RetryPolicy {
    pub fn exponential(max_attempts: u32, min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            min_delay,
            max_delay,
            backoff: Backoff::Exponential,
            backoff_multiplier: 2.0,
        }
    }

    pub fn jittered(max_attempts: u32, min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            backoff: Backoff::Jittered,
            ..Self::exponential(max_attempts, min_delay, max_delay)
        }
    }

    /// Delay to wait after the `failures`-th failed attempt (1-based)
    pub fn delay_for(&self, failures: u32) -> Duration {
        let min = self.min_delay.as_secs_f64();
        let max = self.max_delay.as_secs_f64().max(min);

        let secs = match self.backoff {
            Backoff::Exponential => {
                let exp = min * self.backoff_multiplier.powf(failures.saturating_sub(1) as f64);
                exp.min(max)
            }
            Backoff::Jittered => {
                if max > min {
                    rand::thread_rng().gen_range(min..=max)
                } else {
                    min
                }
            }
        };

        Duration::from_secs_f64(secs)
    }
}

/// Outcome of one failed attempt
#[derive(Debug)]
pub enum AttemptError {
    /// Retry if attempts remain
    Transient(TransientError),
    /// Give up immediately
    Fatal(FetchError),
}

impl From<TransientError> for AttemptError {
    fn from(err: TransientError) -> Self {
        AttemptError::Transient(err)
    }
}

impl From<FetchError> for AttemptError {
    fn from(err: FetchError) -> Self {
        AttemptError::Fatal(err)
    }
}

/// Execute an async operation with retry logic
///
/// The closure receives the 1-based attempt number. Once `max_attempts`
/// transient failures have been seen the call fails with
/// [`FetchError::RequestExhausted`] carrying the last failure.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, FetchError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempts = 0;

    loop {
        attempts += 1;

        match operation(attempts).await {
            Ok(result) => {
                if attempts > 1 {
                    tracing::info!(
                        "Operation succeeded on attempt {} after {} transient failures",
                        attempts,
                        attempts - 1
                    );
                }
                return Ok(result);
            }
            Err(AttemptError::Fatal(error)) => return Err(error),
            Err(AttemptError::Transient(transient)) => {
                if attempts >= max_attempts {
                    tracing::warn!(
                        "Operation failed after {} attempts: {}",
                        attempts,
                        transient
                    );
                    return Err(FetchError::RequestExhausted {
                        attempts,
                        last: transient,
                    });
                }

                let delay = policy.delay_for(attempts);
                tracing::debug!(
                    "Transient error on attempt {}/{}: {}, retrying in {:?}",
                    attempts,
                    max_attempts,
                    transient,
                    delay
                );
                sleep(delay).await;
            }
        }
    }
}
