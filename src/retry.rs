//! Bounded retries with exponential backoff.
//!
//! An operation moves `NotStarted -> Running`, then ends in `Succeeded`,
//! `FailedPermanent`, or `FailedTransient`. A transient failure goes back to
//! `Running` after a backoff delay while retries remain; once they are
//! exhausted the last error is returned as a permanent failure.

use std::time::Duration;

use crate::defaults;
use crate::error::{Error, Result};

/// How many times to retry and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each following retry.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    pub const fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Delay before the `retry`-th retry (1-based).
    pub fn delay_before(&self, retry: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(retry.saturating_sub(1))
    }

    /// Every delay the policy would wait, in order.
    pub fn schedule(&self) -> Vec<Duration> {
        (1..=self.max_retries).map(|retry| self.delay_before(retry)).collect()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(defaults::CLONE_RETRIES, defaults::RETRY_BASE_DELAY)
    }
}

/// Runs `attempt` until it succeeds or fails for good.
///
/// `attempt` receives the 1-based attempt number. Errors for which
/// `is_retryable` returns true are retried while the policy allows it;
/// `on_retry` is told how many retries remain before `sleep` waits out the
/// backoff delay.
pub fn run_with_retry<T, A, P, N>(
    policy: &RetryPolicy,
    sleep: &dyn Fn(Duration),
    mut attempt: A,
    is_retryable: P,
    mut on_retry: N,
) -> Result<T>
where
    A: FnMut(u32) -> Result<T>,
    P: Fn(&Error) -> bool,
    N: FnMut(u32, &Error),
{
    let mut retries_left = policy.max_retries;
    let mut number = 1;
    loop {
        match attempt(number) {
            Ok(value) => return Ok(value),
            Err(error) if retries_left > 0 && is_retryable(&error) => {
                retries_left -= 1;
                on_retry(retries_left, &error);
                sleep(policy.delay_before(policy.max_retries - retries_left));
                number += 1;
            }
            Err(error) => return Err(error),
        }
    }
}
