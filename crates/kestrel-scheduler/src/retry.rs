use crate::error::{Result, SchedulerError};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Bounded retry with exponential backoff for single store calls
///
/// Only transient errors (see `ClusterError::is_transient`) are retried. Any
/// other error is returned right away as `SchedulerError::Cluster`; running
/// out of attempts yields `SchedulerError::Transport`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub initial_backoff: Duration,
    /// Upper bound for any single delay
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
        }
    }
}

/// Delay after `failures` consecutive failures: doubles from `initial`, capped at `max`
pub fn exponential_backoff(initial: Duration, max: Duration, failures: u32) -> Duration {
    let exponent = failures.saturating_sub(1).min(16);
    initial.saturating_mul(1 << exponent).min(max)
}

impl RetryPolicy {
    /// A single attempt, no retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn backoff(&self, failures: u32) -> Duration {
        exponential_backoff(self.initial_backoff, self.max_backoff, failures)
    }

    /// Run `call` until it succeeds, fails permanently, or attempts run out
    pub async fn call<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = kestrel_core::Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() => return Err(SchedulerError::Cluster(e)),
                Err(e) if attempt >= max_attempts => {
                    return Err(SchedulerError::transport(operation, attempt, e.to_string()));
                }
                Err(e) => {
                    let delay = self.backoff(attempt);
                    warn!(
                        "{} failed (attempt {}/{}): {}, retrying in {:?}",
                        operation, attempt, max_attempts, e, delay
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
    use kestrel_core::ClusterError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(40),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = fast_policy(5);
        assert_eq!(policy.backoff(1), Duration::from_millis(10));
        assert_eq!(policy.backoff(2), Duration::from_millis(20));
        assert_eq!(policy.backoff(3), Duration::from_millis(40));
        assert_eq!(policy.backoff(4), Duration::from_millis(40));
        assert_eq!(policy.backoff(100), Duration::from_millis(40));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_errors() {
        let calls = AtomicU32::new(0);
        let result = fast_policy(3)
            .call("list nodes", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(ClusterError::transport("connection reset"))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = fast_policy(3)
            .call("bind default/web-1", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ClusterError::transport("connection refused")) }
            })
            .await;

        assert!(matches!(
            result,
            Err(SchedulerError::Transport { attempts: 3, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = fast_policy(3)
            .call("bind ns/x", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ClusterError::conflict("pods/ns/x")) }
            })
            .await;

        assert!(matches!(
            result,
            Err(SchedulerError::Cluster(ClusterError::Conflict { .. }))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_none_makes_a_single_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = RetryPolicy::none()
            .call("emit", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ClusterError::transport("timeout")) }
            })
            .await;

        assert!(matches!(
            result,
            Err(SchedulerError::Transport { attempts: 1, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
