//! Generic retry loop parameterized by a backoff schedule and an error
//! classifier. The client's unbounded linear policy and the transport's
//! bounded exponential per-request retry are both instances of it.

use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio::task::yield_now;
use tokio::time::sleep;

/// Delay schedule applied between attempts. `attempt` is 1-based and counts
/// the attempt that just failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backoff {
    /// `attempt * unit`: 1, 2, 3, ... units.
    Linear { unit: Duration },
    /// `initial * 2^(attempt - 1)`, capped at `max`.
    Exponential { initial: Duration, max: Duration },
}

impl Backoff {
    pub fn delay(&self, attempt: usize) -> Duration {
        match *self {
            Backoff::Linear { unit } => {
                let factor = u32::try_from(attempt.max(1)).unwrap_or(u32::MAX);
                unit.saturating_mul(factor)
            }
            Backoff::Exponential { initial, max } => {
                if attempt <= 1 {
                    return initial.min(max);
                }
                let exponent = attempt.saturating_sub(1).min(31) as u32;
                let multiplier = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
                initial.saturating_mul(multiplier).min(max)
            }
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RetryBackoff {
    pub backoff: Backoff,
    /// `None` retries until the operation succeeds or the classifier aborts.
    pub max_attempts: Option<usize>,
}

impl RetryBackoff {
    pub fn unbounded(backoff: Backoff) -> Self {
        Self {
            backoff,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = Some(max_attempts.max(1));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retry,
    Abort,
}

/// Runs `operation` until it succeeds, the classifier aborts, or the attempt
/// cap is reached. `on_retry` observes every classified-retryable failure
/// with the attempt number, the upcoming delay, the error, and whether
/// another attempt will follow.
pub async fn retry_with_backoff<T, F, Fut, L, C>(
    config: RetryBackoff,
    mut operation: F,
    mut on_retry: L,
    mut classify_error: C,
) -> Result<T>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T>>,
    L: FnMut(usize, Duration, &anyhow::Error, bool),
    C: FnMut(usize, &anyhow::Error) -> RetryDisposition,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => match classify_error(attempt, &err) {
                RetryDisposition::Abort => return Err(err),
                RetryDisposition::Retry => {
                    let exhausted = config
                        .max_attempts
                        .map(|max| attempt >= max)
                        .unwrap_or(false);
                    let delay = config.backoff.delay(attempt);

                    on_retry(attempt, delay, &err, !exhausted);

                    if exhausted {
                        return Err(err);
                    }

                    pause(delay).await;
                }
            },
        }
    }
}

async fn pause(delay: Duration) {
    if delay.is_zero() {
        yield_now().await;
    } else {
        sleep(delay).await;
    }
}
