use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

use filing_hub_core::config::RetryConfig;
use filing_hub_core::logging::LOG_PROCESS;

/// HTTP status codes worth retrying
pub const RETRYABLE_STATUS_CODES: &[u16] = &[408, 429, 500, 502, 503, 504];

/// Classification of a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Transient; retry with backoff
    Retryable,
    /// Permanent; surface immediately
    Fatal,
}

/// Exponential-backoff retry executor.
///
/// Delay for attempt `n` is `min(base * 2^n, max_delay)` plus a small jitter
/// so parallel work items do not retry in lockstep.
#[derive(Debug, Clone)]
pub struct RetryManager {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryManager {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.retry_attempts,
            Duration::from_secs(config.retry_delay_seconds),
            Duration::from_secs(config.max_retry_delay_seconds),
        )
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Backoff delay for a 0-based attempt number, capped at the maximum
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(20);
        let delay = self.base_delay.saturating_mul(2u32.saturating_pow(exponent));
        delay.min(self.max_delay)
    }

    /// Delay with jitter applied, used for the actual sleeps
    fn delay_with_jitter(&self, attempt: u32) -> Duration {
        let delay = self.calculate_delay(attempt);
        let jitter_ms = rand::thread_rng().gen_range(0..=250);
        delay + Duration::from_millis(jitter_ms)
    }

    /// Classify an HTTP status code
    pub fn classify_status(status: u16) -> RetryClass {
        if RETRYABLE_STATUS_CODES.contains(&status) {
            RetryClass::Retryable
        } else {
            RetryClass::Fatal
        }
    }

    /// Classify a transport-level error. Connection failures and timeouts
    /// are transient; anything structural (bad URL, TLS setup) is fatal.
    pub fn classify_transport_error(error: &reqwest::Error) -> RetryClass {
        if error.is_builder() {
            RetryClass::Fatal
        } else {
            // Timeouts, connect failures, resets, broken pipes are transient
            RetryClass::Retryable
        }
    }

    /// Run `operation` until it succeeds, returns a fatal error, or the
    /// attempt budget is exhausted. The classifier decides which failures
    /// are worth another attempt.
    pub async fn retry_async<T, E, F, Fut, C>(
        &self,
        mut operation: F,
        classify: C,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        C: Fn(&E) -> RetryClass,
        E: std::fmt::Display,
    {
        let mut attempt = 0u32;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        info!("{} Retry succeeded on attempt {}", LOG_PROCESS, attempt + 1);
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if classify(&error) == RetryClass::Fatal {
                        warn!("Non-retryable error: {}", error);
                        return Err(error);
                    }

                    if attempt >= self.max_retries {
                        warn!("All retries exhausted after {} attempts", attempt + 1);
                        return Err(error);
                    }

                    let delay = self.delay_with_jitter(attempt);
                    warn!(
                        "{} Attempt {} failed: {}. Retrying in {:.1}s",
                        LOG_PROCESS,
                        attempt + 1,
                        error,
                        delay.as_secs_f64()
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

    fn manager() -> RetryManager {
        RetryManager::new(3, Duration::from_millis(10), Duration::from_millis(80))
    }

    #[test]
    fn test_calculate_delay_doubles_and_caps() {
        // REQUIREMENT: Delay for attempt n is min(base * 2^n, max_delay)
        // PURPOSE: Verify the exponential curve and the ceiling
        let m = manager();
        assert_eq!(m.calculate_delay(0), Duration::from_millis(10));
        assert_eq!(m.calculate_delay(1), Duration::from_millis(20));
        assert_eq!(m.calculate_delay(2), Duration::from_millis(40));
        assert_eq!(m.calculate_delay(3), Duration::from_millis(80));
        // Beyond the cap
        assert_eq!(m.calculate_delay(10), Duration::from_millis(80));
    }

    #[test]
    fn test_classify_status() {
        // REQUIREMENT: Retryable statuses are 408, 429, and the 5xx gateway set
        // PURPOSE: Verify classification of the full table
        for status in [408u16, 429, 500, 502, 503, 504] {
            assert_eq!(RetryManager::classify_status(status), RetryClass::Retryable);
        }
        for status in [400u16, 401, 403, 404, 410, 501] {
            assert_eq!(RetryManager::classify_status(status), RetryClass::Fatal);
        }
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_transient_failures() {
        // REQUIREMENT: A URL returning 429 three times then 200 succeeds
        //              after three backoff sleeps
        // PURPOSE: Verify the retry loop drives through transient failures
        let attempts = AtomicU32::new(0);
        let m = manager();

        let result: Result<&str, String> = m
            .retry_async(
                || {
                    let n = attempts.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < 3 {
                            Err(format!("HTTP 429 (attempt {})", n + 1))
                        } else {
                            Ok("downloaded")
                        }
                    }
                },
                |_| RetryClass::Retryable,
            )
            .await;

        assert_eq!(result.unwrap(), "downloaded");
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_fatal_errors_do_not_retry() {
        // REQUIREMENT: 4xx outside 408/429 is fatal
        // PURPOSE: Verify fatal classification short-circuits the loop
        let attempts = AtomicU32::new(0);
        let m = manager();

        let result: Result<(), String> = m
            .retry_async(
                || {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    async { Err("HTTP 404".to_string()) }
                },
                |_| RetryClass::Fatal,
            )
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_budget_exhaustion_surfaces_last_error() {
        // REQUIREMENT: After retry_attempts are exhausted the last error surfaces
        // PURPOSE: Verify the attempt count and the returned error
        let attempts = AtomicU32::new(0);
        let m = manager();

        let result: Result<(), String> = m
            .retry_async(
                || {
                    let n = attempts.fetch_add(1, Ordering::SeqCst);
                    async move { Err(format!("timeout {}", n + 1)) }
                },
                |_| RetryClass::Retryable,
            )
            .await;

        assert_eq!(result.unwrap_err(), "timeout 4");
        // Initial attempt + 3 retries
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }
}
