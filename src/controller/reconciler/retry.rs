//! # Store Call Retry
//!
//! Every native secret API call runs under a timeout and is retried with
//! exponential backoff while its failure is retryable.

use crate::config::ControllerConfig;
use crate::controller::backoff::ExponentialBackoff;
use crate::controller::reconciler::store::StoreError;
use crate::observability;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Timeout and retry budget for one store call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub max_attempts: u32,
    pub backoff_start: Duration,
    pub backoff_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ControllerConfig::default())
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn from_config(config: &ControllerConfig) -> Self {
        Self {
            timeout: config.api_timeout_duration(),
            max_attempts: config.api_max_attempts.max(1),
            backoff_start: config.backoff_start_duration(),
            backoff_max: config.backoff_max_duration(),
        }
    }
}

/// Run `call` until it succeeds, fails permanently, or attempts run out
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    mut call: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut backoff = ExponentialBackoff::new(policy.backoff_start, policy.backoff_max);
    let mut attempt: u32 = 1;

    loop {
        let result = match tokio::time::timeout(policy.timeout, call()).await {
            Ok(result) => result,
            Err(_elapsed) => Err(StoreError::Timeout {
                operation,
                timeout: policy.timeout,
            }),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                let delay = backoff.next_delay();
                warn!(
                    operation,
                    attempt,
                    max_attempts = policy.max_attempts,
                    "Secret API call failed: {}, retrying in {}ms",
                    e,
                    delay.as_millis()
                );
                observability::metrics::increment_store_retries(operation);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_millis(200),
            max_attempts,
            backoff_start: Duration::from_millis(1),
            backoff_max: Duration::from_millis(2),
        }
    }

    fn server_error() -> StoreError {
        StoreError::Api {
            operation: "get",
            code: Some(503),
            message: "unavailable".to_string(),
        }
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = with_retry(&fast_policy(3), "get", move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(server_error())
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> = with_retry(&fast_policy(3), "get", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(server_error())
        })
        .await;

        assert_eq!(result, Err(server_error()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let calls = AtomicU32::new(0);
        let forbidden = StoreError::Api {
            operation: "upsert",
            code: Some(403),
            message: "forbidden".to_string(),
        };
        let result: Result<(), _> = with_retry(&fast_policy(5), "upsert", || {
            calls.fetch_add(1, Ordering::SeqCst);
            let err = forbidden.clone();
            async move { Err(err) }
        })
        .await;

        assert_eq!(result, Err(forbidden));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slow_call_times_out() {
        let policy = RetryPolicy {
            timeout: Duration::from_millis(10),
            ..fast_policy(1)
        };
        let result: Result<(), _> = with_retry(&policy, "delete", || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        assert_eq!(
            result,
            Err(StoreError::Timeout {
                operation: "delete",
                timeout: Duration::from_millis(10)
            })
        );
    }
}
