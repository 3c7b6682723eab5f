//! Retry with exponential backoff.
//!
//! The operation is supplied as a factory: a future that already failed cannot
//! be polled again, so every attempt asks the factory for a fresh one.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, warn};

use crate::{Error, Result};

fn default_multiplier() -> u32 {
    2
}

fn default_true() -> bool {
    true
}

/// Stateless retry policy, reusable across operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(with = "crate::config::duration_secs")]
    pub base_delay: Duration,
    #[serde(default = "default_multiplier")]
    pub backoff_multiplier: u32,
    /// Upper bound for a single backoff sleep.
    #[serde(default, with = "crate::config::opt_duration_secs")]
    pub max_delay: Option<Duration>,
    /// Whether [`Error::Timeout`] is eligible for another attempt.
    #[serde(default = "default_true")]
    pub retry_timeouts: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// Per-call retry statistics, for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryStats {
    pub attempts: u32,
    pub elapsed: Duration,
    /// Sum of the backoff sleeps taken between attempts.
    pub total_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff_multiplier: 2,
            max_delay: None,
            retry_timeouts: true,
        }
    }

    /// Single attempt, no sleeping.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn with_backoff_multiplier(mut self, multiplier: u32) -> Self {
        self.backoff_multiplier = multiplier.max(1);
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    pub fn with_retry_timeouts(mut self, enable: bool) -> Self {
        self.retry_timeouts = enable;
        self
    }

    /// Effective attempt budget; zero is treated as one.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Sleep taken after failed attempt number `attempt` (1-based):
    /// `base_delay * multiplier^(attempt-1)`, capped by `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = self
            .backoff_multiplier
            .max(1)
            .checked_pow(exponent)
            .unwrap_or(u32::MAX);
        let delay = self.base_delay.checked_mul(factor).unwrap_or(Duration::MAX);
        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }

    pub fn should_retry(&self, err: &Error) -> bool {
        if err.is_timeout() {
            return self.retry_timeouts;
        }
        err.is_retryable()
    }

    pub async fn run<T, F, Fut>(&self, label: &str, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run_with_stats(label, operation).await.0
    }

    /// Run `operation` under this policy and report how many attempts it took.
    ///
    /// The final error is returned unchanged once attempts are exhausted or the
    /// error is not retryable.
    pub async fn run_with_stats<T, F, Fut>(
        &self,
        label: &str,
        mut operation: F,
    ) -> (Result<T>, RetryStats)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.attempts();
        let started = Instant::now();
        let mut stats = RetryStats::default();

        loop {
            stats.attempts += 1;
            let attempt = stats.attempts;

            let err = match operation().await {
                Ok(value) => {
                    stats.elapsed = started.elapsed();
                    return (Ok(value), stats);
                }
                Err(e) => e,
            };

            let retryable = self.should_retry(&err);
            if retryable && attempt < max_attempts {
                let delay = self.delay_for(attempt);
                warn!(
                    label,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "{label} failed (attempt {attempt}/{max_attempts}), retrying in {:.1}s",
                    delay.as_secs_f64()
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                stats.total_backoff += delay;
                continue;
            }

            stats.elapsed = started.elapsed();
            if retryable {
                error!(
                    label,
                    attempts = attempt,
                    elapsed_ms = stats.elapsed.as_millis() as u64,
                    error = %err,
                    "{label} failed after {attempt} attempt(s)"
                );
            } else {
                error!(
                    label,
                    attempts = attempt,
                    elapsed_ms = stats.elapsed.as_millis() as u64,
                    error = %err,
                    "{label} failed with a non-retryable error"
                );
            }
            return (Err(err), stats);
        }
    }
}

/// Retry `operation` with exponential backoff (multiplier 2).
///
/// Shorthand for [`RetryPolicy::run`] with a default-shaped policy.
pub async fn retry_async<T, F, Fut>(
    operation: F,
    max_attempts: u32,
    base_delay: Duration,
    label: &str,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    RetryPolicy::new(max_attempts, base_delay)
        .run(label, operation)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_per_attempt() {
        let policy = RetryPolicy::new(5, Duration::from_millis(500));
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(4), Duration::from_millis(4000));
    }

    #[test]
    fn delay_respects_cap_and_does_not_overflow() {
        let policy =
            RetryPolicy::new(100, Duration::from_secs(1)).with_max_delay(Duration::from_secs(10));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(5), Duration::from_secs(10));
        assert_eq!(policy.delay_for(90), Duration::from_secs(10));

        let uncapped = RetryPolicy::new(100, Duration::from_secs(1));
        assert!(uncapped.delay_for(90) >= Duration::from_secs(u32::MAX as u64));
    }

    #[test]
    fn zero_attempts_means_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).attempts(), 1);
    }

    #[test]
    fn timeouts_can_be_excluded() {
        let timeout = Error::timeout("op", Duration::from_secs(1));
        assert!(RetryPolicy::default().should_retry(&timeout));
        assert!(!RetryPolicy::default()
            .with_retry_timeouts(false)
            .should_retry(&timeout));
        assert!(RetryPolicy::default()
            .with_retry_timeouts(false)
            .should_retry(&Error::transient("flaky")));
    }

    #[test]
    fn policy_deserializes_with_defaults() {
        let policy: RetryPolicy =
            serde_yaml::from_str("max_attempts: 4\nbase_delay: 0.25\n").unwrap();
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.base_delay, Duration::from_millis(250));
        assert_eq!(policy.backoff_multiplier, 2);
        assert_eq!(policy.max_delay, None);
        assert!(policy.retry_timeouts);
    }
}
