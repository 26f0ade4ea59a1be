use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

use crate::errors::{ErrorKind, FetchError};

/// Upstream rejections (403/429 from the category API) get one more try,
/// never more.
const MAX_REJECTION_ATTEMPTS: u32 = 2;

/// Bounded retry applied uniformly around every fetch unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Wait before attempt `n + 1` is `base_delay * n`.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn should_retry(&self, error: &FetchError, attempt: u32) -> bool {
        if error.kind() == ErrorKind::Permanent {
            return false;
        }
        let ceiling = if error.is_rejection() {
            self.max_attempts.min(MAX_REJECTION_ATTEMPTS)
        } else {
            self.max_attempts
        };
        attempt < ceiling
    }

    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    /// Drive `operation` until it succeeds or the policy gives up.
    ///
    /// Returns the final outcome and the number of attempts made. The
    /// closure receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> (Result<T, FetchError>, u32)
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match operation(attempt).await {
                Ok(value) => return (Ok(value), attempt),
                Err(error) => {
                    if !self.should_retry(&error, attempt) {
                        return (Err(error), attempt);
                    }
                    let wait = self.delay_after(attempt);
                    debug!(attempt, error = %error, wait_ms = wait.as_millis() as u64, "retrying");
                    if !wait.is_zero() {
                        sleep(wait).await;
                    }
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_should_retry_transient_until_ceiling() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let err = FetchError::Status(503);
        assert!(policy.should_retry(&err, 1));
        assert!(policy.should_retry(&err, 2));
        assert!(!policy.should_retry(&err, 3));
    }

    #[test]
    fn test_permanent_never_retried() {
        let policy = RetryPolicy::new(5, Duration::ZERO);
        assert!(!policy.should_retry(&FetchError::Status(404), 1));
        assert!(!policy.should_retry(&FetchError::Malformed("bad".into()), 1));
    }

    #[test]
    fn test_rejection_retried_once() {
        let policy = RetryPolicy::new(5, Duration::ZERO);
        let err = FetchError::Rejected(403);
        assert!(policy.should_retry(&err, 1));
        assert!(!policy.should_retry(&err, 2));
    }

    #[test]
    fn test_linear_delay() {
        let policy = RetryPolicy::new(3, Duration::from_millis(500));
        assert_eq!(policy.delay_after(1), Duration::from_millis(500));
        assert_eq!(policy.delay_after(2), Duration::from_millis(1000));
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_recovers_after_two_failures() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        let calls = AtomicU32::new(0);

        let (result, attempts) = policy
            .run(|attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(FetchError::Status(503))
                    } else {
                        Ok("body")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "body");
        assert_eq!(attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_stops_on_permanent() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let (result, attempts) = policy
            .run(|_| async { Err::<(), _>(FetchError::Status(404)) })
            .await;

        assert_eq!(result.unwrap_err(), FetchError::Status(404));
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn test_run_gives_up_after_ceiling() {
        let policy = RetryPolicy::new(2, Duration::ZERO);
        let (result, attempts) = policy
            .run(|_| async { Err::<(), _>(FetchError::Timeout("slow".into())) })
            .await;

        assert!(matches!(result, Err(FetchError::Timeout(_))));
        assert_eq!(attempts, 2);
    }
}
