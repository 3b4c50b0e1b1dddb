//! Retry with exponential backoff
//!
//! The policy holds configuration only; every call keeps its own attempt
//! counter, so one policy can be shared by concurrent callers.

use crate::config::RetryConfig;
use crate::domain::Retryable;
use crate::log_retry_attempt;
use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: usize,
    initial_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f64,
    jitter: bool,
}

impl RetryPolicy {
    pub fn new(
        max_attempts: usize,
        initial_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay,
            backoff_multiplier: backoff_multiplier.max(1.0),
            jitter: false,
        }
    }

    /// `max_retries` counts retries, so a call makes up to `max_retries + 1` attempts
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries.saturating_add(1),
            Duration::from_millis(config.initial_delay_ms),
            Duration::from_millis(config.max_delay_ms),
            config.backoff_multiplier,
        )
        .with_jitter(config.jitter)
    }

    /// Adds up to 10% random jitter to every delay
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Backoff before retry number `attempt` (1-based), without jitter
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let delay_ms =
            self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        let capped = delay_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    fn jittered_delay(&self, attempt: usize) -> Duration {
        let delay = self.delay_for_attempt(attempt);
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let spread = delay.as_millis() as u64 / 10;
        let extra = rand::thread_rng().gen_range(0..=spread);
        delay + Duration::from_millis(extra)
    }

    /// Runs `operation` until it succeeds, fails with a non-transient error,
    /// or the attempts are used up
    ///
    /// The last error is returned unchanged.
    pub async fn execute<F, Fut, T, E>(&self, operation_name: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    attempt += 1;
                    if !e.is_retryable() {
                        return Err(e);
                    }
                    if attempt >= self.max_attempts {
                        tracing::error!(
                            operation = operation_name,
                            attempts = attempt,
                            error = %e,
                            "Retries exhausted"
                        );
                        return Err(e);
                    }

                    let delay = self.jittered_delay(attempt);
                    log_retry_attempt!(attempt, self.max_attempts, e);
                    tracing::debug!(
                        operation = operation_name,
                        delay_ms = delay.as_millis() as u64,
                        "Backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UcsError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_policy(attempts: usize) -> RetryPolicy {
        RetryPolicy::new(
            attempts,
            Duration::from_millis(1),
            Duration::from_millis(5),
            2.0,
        )
    }

    #[test]
    fn test_config_retries_exclude_first_attempt() {
        let config = RetryConfig {
            max_retries: 3,
            ..Default::default()
        };
        assert_eq!(RetryPolicy::from_config(&config).max_attempts(), 4);
    }

    #[tokio::test]
    async fn test_configured_retries_all_happen() {
        let calls = AtomicUsize::new(0);
        let calls = &calls;
        let config = RetryConfig {
            max_retries: 2,
            initial_delay_ms: 1,
            max_delay_ms: 2,
            jitter: false,
            ..Default::default()
        };
        let result: Result<(), UcsError> = RetryPolicy::from_config(&config)
            .execute("get_client", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(UcsError::Timeout("slow".into()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = RetryPolicy::new(
            5,
            Duration::from_millis(100),
            Duration::from_millis(500),
            2.0,
        );
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(500));
    }

    #[test]
    fn test_jitter_stays_within_ten_percent() {
        let policy = RetryPolicy::new(
            3,
            Duration::from_millis(1000),
            Duration::from_millis(1000),
            1.0,
        )
        .with_jitter(true);
        for _ in 0..20 {
            let delay = policy.jittered_delay(1);
            assert!(delay >= Duration::from_millis(1000));
            assert!(delay <= Duration::from_millis(1100));
        }
    }

    #[tokio::test]
    async fn test_retries_transient_errors_until_success() {
        let calls = AtomicUsize::new(0);
        let calls = &calls;
        let result = fast_policy(3)
            .execute("get_client", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(UcsError::Timeout("slow".into()))
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let calls = AtomicUsize::new(0);
        let calls = &calls;
        let result: Result<(), UcsError> = fast_policy(3)
            .execute("create_client", move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Err(UcsError::ServerError {
                    status: 503,
                    message: format!("attempt {n}"),
                })
            })
            .await;

        match result {
            Err(UcsError::ServerError { message, .. }) => assert_eq!(message, "attempt 2"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let calls = AtomicUsize::new(0);
        let calls = &calls;
        let result: Result<(), UcsError> = fast_policy(5)
            .execute("get_client", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(UcsError::NotFound("OPENSRP-1".into()))
            })
            .await;

        assert!(matches!(result, Err(UcsError::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
