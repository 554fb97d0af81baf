// crates/resilience/src/retry.rs
//! Retry budgets with exponential backoff

use crate::error::ResilienceError;
use std::time::Duration;

/// Retry policy configuration
///
/// Attempt `n` (counted from 0) is preceded by a sleep of `base^n`
/// milliseconds; the first attempt runs immediately.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first attempt)
    max_attempts: usize,
    /// Backoff base in milliseconds
    base: u64,
    /// Maximum delay between retries
    max_delay: Duration,
}

impl RetryPolicy {
    /// Creates a new retry policy
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            base: 4,
            max_delay: Duration::from_secs(30),
        }
    }

    /// Sets the backoff base
    pub fn with_base(mut self, base: u64) -> Self {
        self.base = base;
        self
    }

    /// Sets the maximum delay
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Calculates the delay preceding a given attempt
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = u32::try_from(attempt).unwrap_or(u32::MAX);
        let millis = self.base.checked_pow(exponent).unwrap_or(u64::MAX);

        Duration::from_millis(millis).min(self.max_delay)
    }

    /// Sleeps for the backoff preceding `attempt`
    pub async fn wait(&self, attempt: usize) {
        let delay = self.delay_for_attempt(attempt);
        if !delay.is_zero() {
            log::debug!("Backing off {:?} before attempt {}", delay, attempt + 1);
            tokio::time::sleep(delay).await;
        }
    }

    /// Returns the maximum number of attempts
    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Returns the backoff base
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Builds the error reported once the budget is spent
    pub fn exhausted(&self, last_error: impl ToString) -> ResilienceError {
        ResilienceError::RetriesExhausted {
            attempts: self.max_attempts,
            last_error: last_error.to_string(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 5);
        assert_eq!(policy.base(), 4);
    }

    #[test]
    fn test_retry_policy_builder() {
        let policy = RetryPolicy::new(3)
            .with_base(10)
            .with_max_delay(Duration::from_secs(60));

        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.base, 10);
        assert_eq!(policy.max_delay, Duration::from_secs(60));
    }

    #[test]
    fn test_exponential_backoff() {
        let policy = RetryPolicy::new(5).with_base(4);

        assert_eq!(policy.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(4));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(16));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(64));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(256));
    }

    #[test]
    fn test_max_delay_capping() {
        let policy = RetryPolicy::new(100)
            .with_base(10)
            .with_max_delay(Duration::from_secs(5));

        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(5));
        assert_eq!(policy.delay_for_attempt(90), Duration::from_secs(5));
    }

    #[test]
    fn test_exhausted_error() {
        let policy = RetryPolicy::new(5);
        match policy.exhausted("Internal: boom") {
            ResilienceError::RetriesExhausted { attempts, last_error } => {
                assert_eq!(attempts, 5);
                assert_eq!(last_error, "Internal: boom");
            }
            other => panic!("Expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_sleeps_for_backoff() {
        let policy = RetryPolicy::new(5).with_base(4);
        let start = tokio::time::Instant::now();

        policy.wait(0).await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        policy.wait(3).await;
        assert_eq!(start.elapsed(), Duration::from_millis(64));
    }
}
