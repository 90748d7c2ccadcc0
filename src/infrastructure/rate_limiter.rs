//! Upstream budget for proxied feed requests.
//!
//! Sliding window limiter: the public feed throttles aggressively, so the
//! proxy refuses locally once the per-minute budget is spent instead of
//! forwarding requests that would be rejected upstream.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

/// Sliding window limiter shared across handlers
#[derive(Clone)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    requests: Arc<RwLock<VecDeque<Instant>>>,
}

impl RateLimiter {
    /// Create a limiter allowing `requests_per_minute` upstream calls
    pub fn new(requests_per_minute: u32) -> Self {
        Self::with_window(requests_per_minute, Duration::from_secs(60))
    }

    pub fn with_window(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            requests: Arc::new(RwLock::new(VecDeque::new())),
        }
    }

    /// Record a request if the budget allows it.
    ///
    /// Returns false when the window is full; nothing is recorded then.
    pub async fn check_and_record(&self) -> bool {
        let now = Instant::now();
        let mut requests = self.requests.write().await;

        while let Some(oldest) = requests.front() {
            if now.duration_since(*oldest) >= self.window {
                requests.pop_front();
            } else {
                break;
            }
        }

        if requests.len() < self.limit as usize {
            requests.push_back(now);
            true
        } else {
            false
        }
    }

    /// Current budget usage
    pub async fn get_stats(&self) -> RateLimitStats {
        let now = Instant::now();
        let requests = self.requests.read().await;

        let live: Vec<&Instant> = requests
            .iter()
            .filter(|time| now.duration_since(**time) < self.window)
            .collect();
        let used = live.len() as u32;

        // The budget frees up when the oldest live request leaves the window
        let until_reset = live
            .first()
            .map(|oldest| self.window.saturating_sub(now.duration_since(**oldest)))
            .unwrap_or_default();
        let unix_now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();

        RateLimitStats {
            limit: self.limit,
            remaining: self.limit.saturating_sub(used),
            used,
            reset: (unix_now + until_reset).as_secs() as i64,
        }
    }
}

/// Rate limit statistics
#[derive(Debug, Clone)]
pub struct RateLimitStats {
    pub limit: u32,
    pub remaining: u32,
    pub used: u32,
    pub reset: i64, // Unix timestamp
}
