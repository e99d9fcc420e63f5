use std::fmt::Display;
use std::future::Future;

use tokio::time::{sleep, Duration};
use tracing::{error, warn};

use crate::config::settings::RetryConfig;
use crate::utils::constants::{DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_RETRY_MAX_DELAY_MS};

#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RETRY_ATTEMPTS,
            base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
        }
    }
}

impl From<Option<&RetryConfig>> for RetrySettings {
    fn from(retry: Option<&RetryConfig>) -> Self {
        Self {
            attempts: retry.and_then(|r| r.attempts).unwrap_or(DEFAULT_RETRY_ATTEMPTS),
            base_delay_ms: retry.and_then(|r| r.base_delay_ms).unwrap_or(DEFAULT_RETRY_BASE_DELAY_MS),
            max_delay_ms: retry.and_then(|r| r.max_delay_ms).unwrap_or(DEFAULT_RETRY_MAX_DELAY_MS),
        }
    }
}

impl RetrySettings {
    /// Runs `operation` until it succeeds, `should_retry` rejects the error,
    /// or the attempts run out. Delay doubles per attempt up to `max_delay_ms`.
    pub async fn run_with_retry<F, Fut, T, E>(&self, mut operation: F, should_retry: impl Fn(&E) -> bool) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let attempts = self.attempts.max(1);
        let mut delay = self.base_delay_ms;
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts && should_retry(&e) => {
                    warn!("Attempt {attempt}/{attempts} failed: {e}");
                    sleep(Duration::from_millis(delay)).await;
                    delay = (delay * 2).min(self.max_delay_ms);
                    attempt += 1;
                }
                Err(e) => {
                    error!("gave up after attempt {attempt}/{attempts}: {e}");
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetrySettings {
        RetrySettings { attempts: 4, base_delay_ms: 1, max_delay_ms: 4 }
    }

    #[tokio::test]
    async fn retries_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let got: Result<u32, String> = fast()
            .run_with_retry(
                || async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 2 { Err(format!("transient {n}")) } else { Ok(n) }
                },
                |_| true,
            )
            .await;
        assert_eq!(got, Ok(2));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_stops_immediately() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let got: Result<(), String> = fast()
            .run_with_retry(
                || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("fatal".to_string())
                },
                |e: &String| e != "fatal",
            )
            .await;
        assert_eq!(got, Err("fatal".to_string()));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_attempts_still_runs_once() {
        let settings = RetrySettings { attempts: 0, ..fast() };
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let _: Result<(), String> = settings
            .run_with_retry(|| async move { calls.fetch_add(1, Ordering::SeqCst); Err("x".to_string()) }, |_| true)
            .await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
