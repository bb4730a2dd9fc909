//! Retry policy with exponential backoff for transient failures.
//!
//! Database contention, price-feed hiccups, and version conflicts are
//! retried; domain errors are surfaced immediately.

use backoff::{future::retry, ExponentialBackoff};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::domain::errors::{WeaverError, WeaverResult};

/// Retry policy with exponential backoff
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Initial backoff duration in milliseconds
    pub initial_backoff_ms: u64,
    /// Maximum backoff duration in milliseconds
    pub max_backoff_ms: u64,
    /// Give up after this much total elapsed time, in milliseconds.
    pub max_elapsed_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 200,
            max_backoff_ms: 10_000,
            max_elapsed_ms: 60_000,
        }
    }
}

impl RetryPolicy {
    pub fn new(initial_backoff_ms: u64, max_backoff_ms: u64, max_elapsed_ms: u64) -> Self {
        assert!(initial_backoff_ms > 0, "initial_backoff_ms must be greater than 0");
        assert!(
            max_backoff_ms >= initial_backoff_ms,
            "max_backoff_ms must be >= initial_backoff_ms"
        );
        Self {
            initial_backoff_ms,
            max_backoff_ms,
            max_elapsed_ms,
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: Duration::from_millis(self.initial_backoff_ms),
            max_interval: Duration::from_millis(self.max_backoff_ms),
            max_elapsed_time: Some(Duration::from_millis(self.max_elapsed_ms)),
            ..ExponentialBackoff::default()
        }
    }

    /// Execute an operation, retrying transient failures with exponential
    /// backoff until the elapsed budget runs out.
    pub async fn execute<T, F, Fut>(&self, operation_name: &str, operation: F) -> WeaverResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = WeaverResult<T>>,
    {
        retry(self.backoff(), || async {
            match operation().await {
                Ok(value) => Ok(value),
                Err(e) if e.is_transient() => {
                    warn!(operation = operation_name, error = %e, "transient failure, will retry");
                    Err(backoff::Error::transient(e))
                }
                Err(e) => Err(backoff::Error::permanent(e)),
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use uuid::Uuid;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(1, 5, 200)
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let result = fast_policy()
            .execute("noop", || async { Ok::<_, WeaverError>(42) })
            .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_transient_error_is_retried() {
        let attempts = AtomicU32::new(0);
        let result = fast_policy()
            .execute("flaky", || async {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(WeaverError::Database("locked".to_string()))
                } else {
                    Ok(7)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let attempts = AtomicU32::new(0);
        let id = Uuid::new_v4();
        let result: WeaverResult<()> = fast_policy()
            .execute("missing", || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(WeaverError::StrandNotFound(id))
            })
            .await;
        assert!(matches!(result, Err(WeaverError::StrandNotFound(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
