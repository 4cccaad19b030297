//! Retrying dispatcher for outbound provider calls

use std::future::Future;
use std::time::Duration;

use super::error::{DispatchError, UpstreamError};
use crate::config::RetryConfig;

/// How many attempts a dispatch makes and how long it waits between them
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Attempt N waits N * base_delay before the next try
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

/// Runs one upstream call to completion, retrying transient failures
///
/// Owns no shared state; each invocation runs its own backoff timer. Rate
/// limits and client errors are returned on the first occurrence; rerouting
/// on 429 is the caller's job, via the model tracker.
pub struct Dispatcher {
    policy: RetryPolicy,
}

impl Dispatcher {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Drive `call` until it succeeds, fails terminally, or attempts run out
    ///
    /// The closure produces one fresh attempt per invocation. On exhaustion
    /// the last error is surfaced annotated with the attempt count.
    pub async fn dispatch<F, Fut, T>(&self, model: &str, mut call: F) -> Result<T, DispatchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            match call().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(model = %model, attempt, "upstream call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = self.policy.base_delay * attempt;
                    tracing::warn!(
                        model = %model,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying upstream call"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    if err.is_retryable() {
                        tracing::error!(
                            model = %model,
                            attempts = attempt,
                            error = %err,
                            "upstream call exhausted retries"
                        );
                    }
                    return Err(DispatchError {
                        attempts: attempt,
                        source: err,
                    });
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

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(10),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_attempts_on_persistent_network_error() {
        let dispatcher = Dispatcher::new(fast_policy(3));
        let attempts = Arc::new(AtomicU32::new(0));

        let counter = attempts.clone();
        let result: Result<(), DispatchError> = dispatcher
            .dispatch("gpt-4o", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(UpstreamError::Network("connection reset".into()))
                }
            })
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        let err = result.unwrap_err();
        assert_eq!(err.attempts, 3);
        assert!(matches!(err.source, UpstreamError::Network(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_success_from_second_attempt() {
        let dispatcher = Dispatcher::new(fast_policy(3));
        let attempts = Arc::new(AtomicU32::new(0));

        let counter = attempts.clone();
        let result = dispatcher
            .dispatch("gpt-4o", || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(UpstreamError::Timeout)
                    } else {
                        Ok("completion")
                    }
                }
            })
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(result.unwrap(), "completion");
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_error_is_never_retried() {
        let dispatcher = Dispatcher::new(fast_policy(3));
        let attempts = Arc::new(AtomicU32::new(0));

        let counter = attempts.clone();
        let result: Result<(), DispatchError> = dispatcher
            .dispatch("gpt-4o", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(UpstreamError::from_status(400, "bad request".into()))
                }
            })
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        let err = result.unwrap_err();
        assert_eq!(err.attempts, 1);
        assert_eq!(err.status_code(), Some(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_is_surfaced_immediately() {
        // 429 goes back to the caller for model fallback, not a blind retry
        let dispatcher = Dispatcher::new(fast_policy(5));
        let attempts = Arc::new(AtomicU32::new(0));

        let counter = attempts.clone();
        let result: Result<(), DispatchError> = dispatcher
            .dispatch("gpt-4o", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(UpstreamError::from_status(429, "quota exceeded".into()))
                }
            })
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(result.unwrap_err().source.is_rate_limited());
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_errors_are_retried() {
        let dispatcher = Dispatcher::new(fast_policy(2));
        let attempts = Arc::new(AtomicU32::new(0));

        let counter = attempts.clone();
        let result: Result<(), DispatchError> = dispatcher
            .dispatch("gpt-4o", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(UpstreamError::from_status(503, "overloaded".into()))
                }
            })
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(result.unwrap_err().status_code(), Some(503));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_policy() {
        let dispatcher = Dispatcher::new(fast_policy(1));
        let attempts = Arc::new(AtomicU32::new(0));

        let counter = attempts.clone();
        let result: Result<(), DispatchError> = dispatcher
            .dispatch("gpt-4o", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(UpstreamError::Timeout)
                }
            })
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(result.unwrap_err().attempts, 1);
    }

    #[test]
    fn test_policy_from_config_clamps_zero_attempts() {
        let policy = RetryPolicy::from_config(&RetryConfig {
            max_attempts: 0,
            base_delay_ms: 500,
        });
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.base_delay, Duration::from_millis(500));
    }
}
