//! Bounded exponential backoff for transient transport failures.

use crate::error::{TransportError, TransportResult};
use std::time::Duration;
use tracing::{debug, warn};

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt (0 = no retries).
    pub max_retries: u32,
    /// Base delay in seconds for exponential backoff.
    pub base_delay_secs: u64,
    /// Maximum delay cap in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_secs: 2,
            max_delay_secs: 60,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy with the given max retries and base delay.
    /// The maximum delay cap defaults to 60 seconds.
    #[must_use]
    pub fn new(max_retries: u32, base_delay_secs: u64) -> Self {
        Self {
            max_retries,
            base_delay_secs,
            max_delay_secs: 60,
        }
    }

    /// Whether the error should be retried at the given attempt number.
    ///
    /// Only transient network failures (timeout, connection) are retried;
    /// protocol, auth, and server responses fail the run immediately.
    #[must_use]
    pub fn should_retry(&self, attempt: u32, error: &TransportError) -> bool {
        attempt < self.max_retries && error.is_retryable()
    }

    /// Calculate the delay before retry number `attempt` (0-based).
    ///
    /// The delay is `min(base_delay_secs * 2^attempt, max_delay_secs)`, so a
    /// base of 2 yields 2s, 4s, 8s between successive attempts.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponential = self
            .base_delay_secs
            .saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_secs(exponential.min(self.max_delay_secs))
    }

    /// Execute an async operation with retry.
    ///
    /// The closure `f` is called until it succeeds, a non-retryable error is
    /// returned, or the retry budget is exhausted. Exhaustion yields
    /// [`TransportError::MaxAttemptsExceeded`] wrapping the last cause and
    /// the total attempt count.
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, mut f: F) -> TransportResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = TransportResult<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match f().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(
                            operation = operation_name,
                            attempt = attempt + 1,
                            "operation succeeded after retries"
                        );
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if !self.should_retry(attempt, &error) {
                        if error.is_retryable() && attempt >= self.max_retries {
                            warn!(
                                operation = operation_name,
                                attempts = attempt + 1,
                                error = %error,
                                "retry budget exhausted"
                            );
                            return Err(TransportError::MaxAttemptsExceeded {
                                attempts: attempt + 1,
                                message: error.to_string(),
                            });
                        }
                        // Non-retryable failure.
                        return Err(error);
                    }

                    let delay = self.delay_for(attempt);
                    warn!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        delay_secs = delay.as_secs(),
                        error = %error,
                        "transient failure, retrying"
                    );

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.base_delay_secs, 2);
        assert_eq!(policy.max_delay_secs, 60);
    }

    #[test]
    fn test_should_retry_network_error() {
        let policy = RetryPolicy::new(3, 1);
        let error = TransportError::Connection("refused".into());
        assert!(policy.should_retry(0, &error));
        assert!(policy.should_retry(2, &error));
        assert!(!policy.should_retry(3, &error)); // at max
    }

    #[test]
    fn test_should_not_retry_non_network_errors() {
        let policy = RetryPolicy::new(3, 1);

        let auth = TransportError::Auth("invalid token".into());
        assert!(!policy.should_retry(0, &auth));

        let server = TransportError::Server {
            status: 503,
            body: "unavailable".into(),
        };
        assert!(!policy.should_retry(0, &server));

        let rate_limited = TransportError::RateLimited {
            retry_after_secs: Some(10),
        };
        assert!(!policy.should_retry(0, &rate_limited));
    }

    #[test]
    fn test_delay_strictly_increasing() {
        let policy = RetryPolicy::new(5, 2);

        assert_eq!(policy.delay_for(0), Duration::from_secs(2)); // 2 * 2^0
        assert_eq!(policy.delay_for(1), Duration::from_secs(4)); // 2 * 2^1
        assert_eq!(policy.delay_for(2), Duration::from_secs(8)); // 2 * 2^2

        for attempt in 0..4 {
            assert!(policy.delay_for(attempt + 1) > policy.delay_for(attempt));
        }
    }

    #[test]
    fn test_delay_capped_at_max() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_delay_secs: 1,
            max_delay_secs: 10,
        };

        assert_eq!(policy.delay_for(5), Duration::from_secs(10)); // 32 capped to 10
        assert_eq!(policy.delay_for(8), Duration::from_secs(10)); // 256 capped to 10
    }

    #[tokio::test]
    async fn test_execute_succeeds_first_try() {
        let policy = RetryPolicy::new(3, 0);
        let result = policy
            .execute("test_op", || async { Ok::<_, TransportError>(42) })
            .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_execute_succeeds_after_retries() {
        let policy = RetryPolicy::new(3, 0);
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = policy
            .execute("test_op", move || {
                let counter = counter_clone.clone();
                async move {
                    let attempt = counter.fetch_add(1, Ordering::SeqCst);
                    if attempt < 2 {
                        Err(TransportError::Connection("refused".into()))
                    } else {
                        Ok(99)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 99);
        assert_eq!(counter.load(Ordering::SeqCst), 3); // initial + 2 retries
    }

    #[tokio::test]
    async fn test_execute_non_retryable_fails_immediately() {
        let policy = RetryPolicy::new(3, 0);
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result: TransportResult<()> = policy
            .execute("test_op", move || {
                let counter = counter_clone.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(TransportError::NotFound("contact".into()))
                }
            })
            .await;

        assert!(matches!(result, Err(TransportError::NotFound(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 1); // only one attempt
    }

    #[tokio::test]
    async fn test_execute_max_attempts_exceeded() {
        let policy = RetryPolicy::new(2, 0);
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result: TransportResult<()> = policy
            .execute("test_op", move || {
                let counter = counter_clone.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(TransportError::Timeout("deadline".into()))
                }
            })
            .await;

        match result {
            Err(TransportError::MaxAttemptsExceeded { attempts, message }) => {
                assert_eq!(attempts, 3); // 1 initial + 2 retries
                assert!(message.contains("deadline"));
            }
            other => panic!("expected MaxAttemptsExceeded, got: {other:?}"),
        }
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_no_retries_policy() {
        let policy = RetryPolicy::new(0, 1);
        let error = TransportError::Connection("refused".into());
        assert!(!policy.should_retry(0, &error));
    }
}
