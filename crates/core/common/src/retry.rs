//! Bounded retry with exponential backoff.
//!
//! One policy drives both the blocking warehouse path and the async object
//! store path. Errors pass through unchanged: the caller decides which error
//! values are worth another attempt, and after the last attempt the final
//! error is re-raised as-is.

use std::time::Duration;

use tracing::{error, warn};

/// Backoff parameters for a bounded retry loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one. Must be >= 1.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Growth factor applied per attempt. Strictly increasing delays for
    /// multipliers above 1.
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// The nominal delay after the given failed attempt (1-based), before
    /// jitter: `base_delay * backoff_multiplier^(attempt - 1)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        self.base_delay.mul_f64(factor)
    }

    /// The full schedule of nominal delays between attempts.
    pub fn backoff_delays(&self) -> Vec<Duration> {
        (1..self.max_attempts).map(|a| self.delay_for(a)).collect()
    }

    /// `delay_for` with +/-10% random jitter, so simultaneous builds do not
    /// hammer the warehouse or the store in lockstep.
    fn jittered_delay_for(&self, attempt: u32) -> Duration {
        use rand::Rng as _;
        let factor = rand::rng().random_range(0.9..=1.1);
        self.delay_for(attempt).mul_f64(factor)
    }
}

/// Runs `op` under `policy`, sleeping on the current thread between attempts.
///
/// `is_retryable` filters which errors earn another attempt; non-retryable
/// errors propagate immediately. After `max_attempts` failures the last error
/// is returned unchanged.
pub fn retry_blocking<T, E, F>(
    policy: &RetryPolicy,
    label: &str,
    is_retryable: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Result<T, E>,
{
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_attempts && is_retryable(&err) => {
                let delay = policy.jittered_delay_for(attempt);
                warn!(
                    "{label} failed (attempt {attempt}/{}), retrying in {:.1}s: {err}",
                    policy.max_attempts,
                    delay.as_secs_f64(),
                );
                std::thread::sleep(delay);
                attempt += 1;
            }
            Err(err) => {
                if attempt >= policy.max_attempts && is_retryable(&err) {
                    error!("{label} failed after {attempt} attempts: {err}");
                }
                return Err(err);
            }
        }
    }
}

/// Async variant of [`retry_blocking`]; sleeps on the tokio timer.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    is_retryable: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_attempts && is_retryable(&err) => {
                let delay = policy.jittered_delay_for(attempt);
                warn!(
                    "{label} failed (attempt {attempt}/{}), retrying in {:.1}s: {err}",
                    policy.max_attempts,
                    delay.as_secs_f64(),
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                if attempt >= policy.max_attempts && is_retryable(&err) {
                    error!("{label} failed after {attempt} attempts: {err}");
                }
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[derive(Debug, thiserror::Error, PartialEq)]
    enum TestError {
        #[error("transient")]
        Transient,
        #[error("fatal")]
        Fatal,
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            backoff_multiplier: 2.0,
        }
    }

    #[test]
    fn delays_grow_strictly_for_multiplier_above_one() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
        };

        let delays = policy.backoff_delays();
        assert_eq!(delays.len(), 4);
        assert_eq!(delays[0], Duration::from_millis(100));
        assert_eq!(delays[1], Duration::from_millis(200));
        assert_eq!(delays[2], Duration::from_millis(400));
        assert_eq!(delays[3], Duration::from_millis(800));
        assert!(delays.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn succeeds_after_transient_failures() {
        //* Given an operation that fails twice before succeeding
        let calls = Cell::new(0u32);
        let result = retry_blocking(
            &fast_policy(),
            "test op",
            |err| *err == TestError::Transient,
            || {
                calls.set(calls.get() + 1);
                if calls.get() < 3 {
                    Err(TestError::Transient)
                } else {
                    Ok("done")
                }
            },
        );

        //* Then the final attempt's value is returned
        assert_eq!(result, Ok("done"));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn exhaustion_returns_last_error_unchanged() {
        let calls = Cell::new(0u32);
        let result: Result<(), _> = retry_blocking(
            &fast_policy(),
            "test op",
            |_| true,
            || {
                calls.set(calls.get() + 1);
                Err(TestError::Transient)
            },
        );

        assert_eq!(result, Err(TestError::Transient));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn non_retryable_errors_propagate_immediately() {
        let calls = Cell::new(0u32);
        let result: Result<(), _> = retry_blocking(
            &fast_policy(),
            "test op",
            |err| *err == TestError::Transient,
            || {
                calls.set(calls.get() + 1);
                Err(TestError::Fatal)
            },
        );

        assert_eq!(result, Err(TestError::Fatal));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn async_driver_retries_and_succeeds() {
        let calls = Cell::new(0u32);
        let result = retry(
            &fast_policy(),
            "test op",
            |err| *err == TestError::Transient,
            || {
                calls.set(calls.get() + 1);
                let outcome = if calls.get() < 2 {
                    Err(TestError::Transient)
                } else {
                    Ok(42)
                };
                async move { outcome }
            },
        )
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn single_attempt_policy_never_sleeps() {
        let policy = RetryPolicy {
            max_attempts: 1,
            base_delay: Duration::from_secs(3600),
            backoff_multiplier: 2.0,
        };
        let calls = Cell::new(0u32);
        let result: Result<(), _> = retry_blocking(&policy, "test op", |_| true, || {
            calls.set(calls.get() + 1);
            Err(TestError::Transient)
        });

        assert_eq!(result, Err(TestError::Transient));
        assert_eq!(calls.get(), 1);
    }
}
