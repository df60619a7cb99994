use crate::error::{ErrorType, Res};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_ATTEMPTS: u32 = 3;
const DEFAULT_BASE_DELAY_MS: u64 = 500;

/// Bounded exponential backoff for calls that were rejected by rate limiting. The first retry
/// waits `base_delay_ms` and every following one waits twice as long as the one before.
///
/// Only `ErrorType::RateLimited` failures are retried, everything else is returned at once.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    attempts: u32,
    base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay_ms: base_delay.as_millis() as u64,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.max(1)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// The wait after failed attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay().saturating_mul(factor)
    }

    /// Runs `op` until it succeeds, fails with something other than a rate limit, or the attempts
    /// are used up.
    pub(crate) async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Res<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Res<T>>,
    {
        let attempts = self.attempts();
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if ErrorType::of(&e) == Some(ErrorType::RateLimited) => {
                    if attempt >= attempts {
                        warn!("{what} was rate limited {attempt} times, giving up");
                        return Err(e);
                    }
                    let delay = self.delay(attempt);
                    debug!(
                        "{what} was rate limited (attempt {attempt} of {attempts}), retrying in \
                        {}ms",
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1))
    }

    #[test]
    fn test_delay_doubles() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_retries_rate_limits_then_succeeds() {
        let calls = &AtomicU32::new(0);
        let result = fast()
            .run("read", move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(ErrorType::RateLimited.err("429"))
                } else {
                    Ok(n)
                }
            })
            .await
            .unwrap();
        assert_eq!(result, 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_attempts() {
        let calls = &AtomicU32::new(0);
        let e = fast()
            .run("read", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ErrorType::RateLimited.err("429"))
            })
            .await
            .unwrap_err();
        assert_eq!(ErrorType::of(&e), Some(ErrorType::RateLimited));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let calls = &AtomicU32::new(0);
        let e = fast()
            .run("read", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ErrorType::NotAuthenticated.err("no token"))
            })
            .await
            .unwrap_err();
        assert_eq!(ErrorType::of(&e), Some(ErrorType::NotAuthenticated));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_serde_defaults() {
        let policy: RetryPolicy =
            serde_json::from_str(r#"{"attempts": 5, "base_delay_ms": 10}"#).unwrap();
        assert_eq!(policy.attempts(), 5);
        assert_eq!(policy.base_delay(), Duration::from_millis(10));
        assert_eq!(RetryPolicy::default().attempts(), 3);
    }
}
