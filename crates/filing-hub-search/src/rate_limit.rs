use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::Quota;
use nonzero_ext::nonzero;
use std::collections::VecDeque;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

type DirectLimiter = governor::RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Per-second request limiter backed by the `governor` crate.
///
/// Shared across tasks via internal `Arc`; cloning is cheap and all clones
/// draw from the same quota.
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<DirectLimiter>,
    max_requests_per_second: u32,
}

impl RateLimiter {
    pub fn new(max_requests_per_second: u32) -> Self {
        let quota =
            Quota::per_second(NonZeroU32::new(max_requests_per_second).unwrap_or(nonzero!(1u32)));
        Self {
            limiter: Arc::new(governor::RateLimiter::direct(quota)),
            max_requests_per_second,
        }
    }

    /// SEC EDGAR guideline: at most 10 requests per second
    pub fn sec_edgar() -> Self {
        Self::new(10)
    }

    /// Wait until a request permit is available
    pub async fn wait_for_permit(&self) {
        self.limiter.until_ready().await;
        debug!("Rate limit permit granted");
    }

    pub fn max_requests_per_second(&self) -> u32 {
        self.max_requests_per_second
    }
}

/// Sliding-window limiter for APIs with per-window quotas.
///
/// Companies House allows 600 requests per 5-minute window; the window is a
/// ring of request timestamps guarded by a mutex so concurrent searchers
/// share one budget.
#[derive(Clone)]
pub struct SlidingWindowLimiter {
    state: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl SlidingWindowLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(VecDeque::with_capacity(max_requests))),
            max_requests,
            window,
        }
    }

    /// Companies House quota: 600 requests per 5 minutes
    pub fn companies_house() -> Self {
        Self::new(600, Duration::from_secs(300))
    }

    /// Wait until a request slot is free, then record this request
    pub async fn wait_for_permit(&self) {
        loop {
            let wait_time = {
                let mut timestamps = self.state.lock().await;
                let now = Instant::now();

                // Drop requests that have aged out of the window
                while let Some(front) = timestamps.front() {
                    if now.duration_since(*front) > self.window {
                        timestamps.pop_front();
                    } else {
                        break;
                    }
                }

                if timestamps.len() < self.max_requests {
                    timestamps.push_back(now);
                    None
                } else {
                    // Wait until the oldest request ages out
                    timestamps
                        .front()
                        .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
                }
            };

            match wait_time {
                None => return,
                Some(wait) => {
                    warn!("Rate limit window full, waiting {:?}", wait);
                    tokio::time::sleep(wait.max(Duration::from_millis(50))).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limiter_allows_burst_within_quota() {
        // REQUIREMENT: SEC requests are throttled to the configured rate
        // PURPOSE: Verify permits inside the quota are granted immediately
        let limiter = RateLimiter::new(50);

        let start = Instant::now();
        for _ in 0..10 {
            limiter.wait_for_permit().await;
        }
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_rate_limiter_throttles_over_quota() {
        // REQUIREMENT: Requests beyond the per-second quota must wait
        // PURPOSE: Verify the limiter actually delays the excess request
        let limiter = RateLimiter::new(2);

        let start = Instant::now();
        for _ in 0..4 {
            limiter.wait_for_permit().await;
        }
        // Four permits at 2/s needs roughly a second of waiting
        assert!(start.elapsed() >= Duration::from_millis(700));
    }

    #[tokio::test]
    async fn test_sliding_window_limiter() {
        // REQUIREMENT: Companies House is limited to N requests per window
        // PURPOSE: Verify the timestamp ring blocks once the window fills
        let limiter = SlidingWindowLimiter::new(3, Duration::from_millis(300));

        let start = Instant::now();
        for _ in 0..3 {
            limiter.wait_for_permit().await;
        }
        assert!(start.elapsed() < Duration::from_millis(100));

        // Fourth request must wait for the window to slide
        limiter.wait_for_permit().await;
        assert!(start.elapsed() >= Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_sliding_window_shared_across_clones() {
        // REQUIREMENT: Rate-limiter state is process-wide, shared by tasks
        // PURPOSE: Verify clones draw from the same budget
        let limiter = SlidingWindowLimiter::new(2, Duration::from_millis(300));
        let clone = limiter.clone();

        let start = Instant::now();
        limiter.wait_for_permit().await;
        clone.wait_for_permit().await;
        clone.wait_for_permit().await;
        assert!(start.elapsed() >= Duration::from_millis(250));
    }
}
