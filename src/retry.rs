//! Bounded retry with exponential backoff.
//!
//! Only errors for which [`SearchError::is_retryable`] returns `true` are
//! retried. Permanent errors are returned as-is; the last transient error
//! is returned once attempts run out, annotated with the attempt count.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;
use crate::error::{Result, SearchError};

/// Retry policy derived from [`RetryConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Always at least 1.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Cap for any single delay.
    pub max_delay: Duration,
    /// Randomise each delay within `[delay / 2, delay]`.
    pub jitter: bool,
}

impl RetryPolicy {
    /// Delay to wait after the failed attempt numbered `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.min(31);
        let base = self
            .initial_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay);
        if !self.jitter || base.is_zero() {
            return base;
        }
        let millis = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
        let jittered = rand::thread_rng().gen_range(millis / 2..=millis);
        Duration::from_millis(jittered)
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_retries.saturating_add(1),
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: config.jitter,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

/// Run `operation` until it succeeds, fails permanently, or runs out of
/// attempts.
///
/// `operation` receives the 0-based attempt number. `label` only appears in
/// log lines.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut operation: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt + 1 < max_attempts => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    label,
                    attempt = attempt + 1,
                    max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(final_error(err, attempt + 1)),
        }
    }
}

/// Annotate a retryable error that survived every attempt.
fn final_error(err: SearchError, attempts: u32) -> SearchError {
    if attempts <= 1 || !err.is_retryable() {
        return err;
    }
    match err {
        SearchError::Timeout(msg) => {
            SearchError::Timeout(format!("{msg} (after {attempts} attempts)"))
        }
        SearchError::Transport(msg) => {
            SearchError::Transport(format!("{msg} (after {attempts} attempts)"))
        }
        SearchError::Http { status, message } => SearchError::Http {
            status,
            message: format!("{message} (after {attempts} attempts)"),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn instant_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: false,
        }
    }

    #[test]
    fn policy_from_config() {
        let policy = RetryPolicy::from(&RetryConfig::default());
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_delay, Duration::from_millis(500));
        assert_eq!(policy.max_delay, Duration::from_millis(4_000));
    }

    #[test]
    fn delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            jitter: false,
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(350));
        assert_eq!(policy.delay_for(40), Duration::from_millis(350));
    }

    #[test]
    fn jittered_delay_stays_in_range() {
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(400),
            max_delay: Duration::from_millis(400),
            jitter: true,
        };
        for _ in 0..50 {
            let delay = policy.delay_for(0);
            assert!(delay >= Duration::from_millis(200));
            assert!(delay <= Duration::from_millis(400));
        }
    }

    #[tokio::test]
    async fn succeeds_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result = with_retry(&instant_policy(3), "test", |_| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, SearchError>(7)
            }
        })
        .await;
        assert_eq!(result.expect("ok"), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result = with_retry(&instant_policy(3), "test", |attempt| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                if attempt < 2 {
                    Err(SearchError::Transport("connection reset".into()))
                } else {
                    Ok("done")
                }
            }
        })
        .await;
        assert_eq!(result.expect("ok"), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_error_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result: Result<()> = with_retry(&instant_policy(5), "test", |_| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(SearchError::Http {
                    status: 404,
                    message: "Not Found".into(),
                })
            }
        })
        .await;
        assert!(matches!(result, Err(SearchError::Http { status: 404, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_attempts_return_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result: Result<()> = with_retry(&instant_policy(3), "test", |_| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(SearchError::Timeout("no response within 10ms".into()))
            }
        })
        .await;
        let err = result.unwrap_err();
        assert!(matches!(err, SearchError::Timeout(_)));
        assert!(err.to_string().contains("after 3 attempts"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn single_attempt_policy_does_not_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result: Result<()> = with_retry(&instant_policy(1), "test", |_| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(SearchError::Transport("refused".into()))
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!result.unwrap_err().to_string().contains("attempts"));
    }
}
