//! Bounded retry around fallible async operations.

use std::future::Future;
use std::sync::Arc;

use tracing::warn;

use toolbridge_core::Error;

type Classifier = Arc<dyn Fn(&Error) -> bool + Send + Sync>;

/// Retries an operation immediately, up to `max_retries` extra times, when
/// its failure is accepted by the classifier. Other failures are returned at
/// once.
#[derive(Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    classify: Classifier,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, classify: impl Fn(&Error) -> bool + Send + Sync + 'static) -> Self {
        Self {
            max_retries,
            classify: Arc::new(classify),
        }
    }

    /// Retry only when the upstream session was closed concurrently.
    #[must_use]
    pub fn on_closed_session(max_retries: u32) -> Self {
        Self::new(max_retries, Error::is_session_closed)
    }

    /// Run `op`, retrying per this policy.
    ///
    /// # Errors
    ///
    /// Returns the last failure once it is not retryable or the retry budget
    /// is spent.
    pub async fn run<F, Fut, T>(&self, operation: &str, mut op: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let mut retries = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if retries < self.max_retries && (self.classify)(&err) => {
                    retries += 1;
                    warn!(
                        "{} failed: {}. Retrying ({}/{})",
                        operation, err, retries, self.max_retries
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::on_closed_session(1)
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    async fn failing_then_ok(calls: &AtomicU32, failures: u32, err: fn() -> Error) -> Result<u32, Error> {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= failures {
            Err(err())
        } else {
            Ok(n)
        }
    }

    fn closed() -> Error {
        Error::SessionClosed("stream closed".into())
    }

    fn refused() -> Error {
        Error::Transport("connection refused".into())
    }

    #[tokio::test]
    async fn recovers_from_one_closed_session() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let result = policy
            .run("create session", || failing_then_ok(&calls, 1, closed))
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn second_closed_session_is_surfaced() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let result = policy
            .run("create session", || failing_then_ok(&calls, 2, closed))
            .await;

        assert!(result.unwrap_err().is_session_closed());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn other_failures_are_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let result = policy
            .run("create session", || failing_then_ok(&calls, 1, refused))
            .await;

        assert!(matches!(result, Err(Error::Transport(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_budget_never_retries() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::on_closed_session(0);

        let result = policy
            .run("create session", || failing_then_ok(&calls, 1, closed))
            .await;

        assert!(result.unwrap_err().is_session_closed());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn custom_classifier_and_budget() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, |e| matches!(e, Error::Transport(_)));

        let result = policy.run("connect", || failing_then_ok(&calls, 3, refused)).await;

        assert_eq!(result.unwrap(), 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
