//! In-process sliding-window rate limiter keyed by caller identity
//! (user email for order creation). Grounded on
//! `original_source/app/core/rate_limiter.py`'s fixed-window counter,
//! reimplemented with `dashmap` for lock-free concurrent access the way
//! the teacher uses `dashmap` for its in-memory position cache.
//!
//! A single process only — fine for this service's scale, and avoids
//! pulling in a shared store just to throttle order creation.

use dashmap::DashMap;
use std::time::{Duration, Instant};

pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    buckets: DashMap<String, Bucket>,
}

struct Bucket {
    window_started_at: Instant,
    count: u32,
}

impl RateLimiter {
    pub fn new(max_requests_per_minute: u32) -> Self {
        Self {
            window: Duration::from_secs(60),
            max_requests: max_requests_per_minute,
            buckets: DashMap::new(),
        }
    }

    /// Returns `true` if the caller identified by `key` is within their
    /// quota for the current window, recording the attempt either way a
    /// fresh window starts.
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut entry = self.buckets.entry(key.to_string()).or_insert_with(|| Bucket {
            window_started_at: now,
            count: 0,
        });

        if now.duration_since(entry.window_started_at) >= self.window {
            entry.window_started_at = now;
            entry.count = 0;
        }

        if entry.count >= self.max_requests {
            return false;
        }

        entry.count += 1;
        true
    }

    /// Drops buckets whose window has already elapsed. Intended to be
    /// called periodically so the map doesn't grow unbounded with
    /// one-shot callers.
    pub fn sweep(&self) {
        let now = Instant::now();
        self.buckets
            .retain(|_, bucket| now.duration_since(bucket.window_started_at) < self.window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_the_limit_then_denies() {
        let limiter = RateLimiter::new(3);
        assert!(limiter.check("a@example.com"));
        assert!(limiter.check("a@example.com"));
        assert!(limiter.check("a@example.com"));
        assert!(!limiter.check("a@example.com"));
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new(1);
        assert!(limiter.check("a@example.com"));
        assert!(limiter.check("b@example.com"));
        assert!(!limiter.check("a@example.com"));
    }

    #[test]
    fn sweep_drops_expired_buckets() {
        let limiter = RateLimiter::new(1);
        assert!(limiter.check("a@example.com"));
        limiter.sweep();
        assert_eq!(limiter.buckets.len(), 1);
    }
}
