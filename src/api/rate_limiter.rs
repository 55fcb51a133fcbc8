// src/api/rate_limiter.rs
//! Shared admission control for the rate-limited upstream endpoints.
//!
//! Grants at most `permits` acquisitions inside any rolling `window`. Waiters are served
//! in arrival order: the grant log is behind a `tokio::sync::Mutex` (FIFO) that the head
//! waiter keeps while it sleeps for the oldest grant to age out.

use log::{debug, info};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub permits: usize,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            permits: 10,
            window: Duration::from_secs(1),
        }
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    grants: Arc<Mutex<VecDeque<Instant>>>,
    granted_total: Arc<AtomicU64>,
    waited_total: Arc<AtomicU64>,
    provider_name: String,
}

impl RateLimiter {
    pub fn new(provider_name: impl Into<String>, config: RateLimitConfig) -> Self {
        let config = RateLimitConfig {
            permits: config.permits.max(1),
            window: config.window,
        };
        let provider_name = provider_name.into();
        info!(
            "Initializing rate limiter for {}: {} permits per {:?}",
            provider_name, config.permits, config.window
        );

        Self {
            grants: Arc::new(Mutex::new(VecDeque::with_capacity(config.permits))),
            granted_total: Arc::new(AtomicU64::new(0)),
            waited_total: Arc::new(AtomicU64::new(0)),
            config,
            provider_name,
        }
    }

    /// Suspends the calling task until a permit is available, then takes it.
    pub async fn acquire_permit(&self) {
        let mut grants = self.grants.lock().await;
        let mut waited = false;
        loop {
            let now = Instant::now();
            while let Some(&oldest) = grants.front() {
                if now.duration_since(oldest) >= self.config.window {
                    grants.pop_front();
                } else {
                    break;
                }
            }

            if grants.len() < self.config.permits {
                grants.push_back(now);
                self.granted_total.fetch_add(1, Ordering::Relaxed);
                if waited {
                    self.waited_total.fetch_add(1, Ordering::Relaxed);
                }
                return;
            }

            // Non-empty here since permits >= 1.
            let oldest = grants[0];
            let wait = self.config.window.saturating_sub(now.duration_since(oldest));
            debug!(
                "{} API window full ({} grants), waiting {:?}",
                self.provider_name,
                grants.len(),
                wait
            );
            waited = true;
            sleep(wait).await;
        }
    }

    pub async fn get_usage_stats(&self) -> RateLimitStats {
        let grants = self.grants.lock().await;
        let now = Instant::now();
        let in_window = grants
            .iter()
            .filter(|at| now.duration_since(**at) < self.config.window)
            .count();

        RateLimitStats {
            provider_name: self.provider_name.clone(),
            permits: self.config.permits,
            window_ms: self.config.window.as_millis() as u64,
            in_window,
            granted_total: self.granted_total.load(Ordering::Relaxed),
            waited_total: self.waited_total.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RateLimitStats {
    pub provider_name: String,
    pub permits: usize,
    pub window_ms: u64,
    pub in_window: usize,
    pub granted_total: u64,
    /// Grants that had to sleep for the window to open.
    pub waited_total: u64,
}

impl std::fmt::Display for RateLimitStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} API: {}/{} in {}ms window, {} granted, {} delayed",
            self.provider_name,
            self.in_window,
            self.permits,
            self.window_ms,
            self.granted_total,
            self.waited_total
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;

    fn limiter(permits: usize, window_ms: u64) -> RateLimiter {
        RateLimiter::new(
            "test",
            RateLimitConfig {
                permits,
                window: Duration::from_millis(window_ms),
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn no_window_admits_more_than_the_cap() {
        let limiter = limiter(10, 1000);
        let started = Arc::new(Mutex::new(Vec::new()));

        let calls = (0..35).map(|_| {
            let limiter = limiter.clone();
            let started = started.clone();
            async move {
                limiter.acquire_permit().await;
                started.lock().await.push(Instant::now());
            }
        });
        join_all(calls).await;

        let started = started.lock().await;
        assert_eq!(started.len(), 35);
        for begin in started.iter() {
            let in_window = started
                .iter()
                .filter(|t| **t >= *begin && t.duration_since(*begin) < Duration::from_millis(1000))
                .count();
            assert!(in_window <= 10, "{} grants inside one window", in_window);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn burst_up_to_the_cap_is_immediate() {
        let limiter = limiter(5, 1000);
        let begin = Instant::now();
        for _ in 0..5 {
            limiter.acquire_permit().await;
        }
        assert_eq!(Instant::now(), begin);

        limiter.acquire_permit().await;
        assert!(Instant::now().duration_since(begin) >= Duration::from_millis(1000));

        let stats = limiter.get_usage_stats().await;
        assert_eq!(stats.granted_total, 6);
        assert_eq!(stats.waited_total, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn waiters_are_granted_in_arrival_order() {
        let limiter = limiter(1, 100);
        let order = Arc::new(Mutex::new(Vec::new()));

        let calls = (0..5).map(|id| {
            let limiter = limiter.clone();
            let order = order.clone();
            async move {
                limiter.acquire_permit().await;
                order.lock().await.push(id);
            }
        });
        join_all(calls).await;

        assert_eq!(*order.lock().await, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn zero_permits_is_clamped_to_one() {
        let limiter = limiter(0, 1000);
        assert_eq!(limiter.get_usage_stats().await.permits, 1);
    }
}
