//! Fixed-attempt retry with optional backoff.
//!
//! Activities (list, download, upload) run under a [`RetryPolicy`]: the
//! first retry waits `first_interval`, each later one multiplies the wait by
//! `backoff_coefficient`, and the call gives up after `max_attempts`.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Default delay before the first retry.
pub const DEFAULT_FIRST_INTERVAL: Duration = Duration::from_secs(10);

/// Default total number of attempts (first call included).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub first_interval: Duration,
    pub max_attempts: u32,
    pub backoff_coefficient: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            first_interval: DEFAULT_FIRST_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_coefficient: 1.0,
        }
    }
}

impl RetryPolicy {
    /// Policy that retries immediately; for tests and interactive use.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            first_interval: Duration::ZERO,
            max_attempts,
            backoff_coefficient: 1.0,
        }
    }

    /// Delay after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self
            .backoff_coefficient
            .max(1.0)
            .powi(attempt.saturating_sub(1) as i32);
        self.first_interval.mul_f64(factor)
    }
}

/// Run `op` until it succeeds, `should_retry` rejects the error, or the
/// policy's attempts are used up. Returns the last error on failure.
pub async fn retry<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts && should_retry(&e) => {
                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    activity = label,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Activity attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(activity = label, attempt, error = %e, "Activity failed");
                return Err(e);
            }
        }
    }
}
