//! Rate Limiter
//!
//! Rolling-window accounting of API requests.
//!
//! YNAB allows a fixed number of requests per access token within a rolling
//! hour. Each recorded request occupies a slot until exactly one window has
//! passed since it was made.

use std::collections::VecDeque;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

/// Rate limit configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum requests per window.
    pub limit: usize,
    /// Length of the rolling window.
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        DEFAULT_RATE_LIMIT
    }
}

/// Default YNAB limits: 200 requests per rolling hour.
pub const DEFAULT_RATE_LIMIT: RateLimitConfig = RateLimitConfig {
    limit: 200,
    window: Duration::from_secs(3600),
};

/// Tracks request timestamps within a rolling window.
///
/// Accounting only: nothing blocks or rejects requests.
#[derive(Debug)]
pub struct RateLimitTracker {
    config: RateLimitConfig,
    requests: RwLock<VecDeque<Instant>>,
}

impl RateLimitTracker {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            requests: RwLock::new(VecDeque::new()),
        }
    }

    pub fn limit(&self) -> usize {
        self.config.limit
    }

    pub fn window(&self) -> Duration {
        self.config.window
    }

    /// Record a request made now.
    pub fn record_request(&self) {
        let mut requests = self.requests.write().unwrap_or_else(PoisonError::into_inner);
        // Read the clock under the lock so entries stay in append order.
        let now = Instant::now();
        self.evict(&mut requests, now);
        requests.push_back(now);

        if requests.len() == self.config.limit {
            tracing::warn!(
                limit = self.config.limit,
                window_secs = self.config.window.as_secs(),
                "Rate limit reached"
            );
        }
    }

    /// Requests recorded within the current window.
    pub fn requests_in_window(&self) -> usize {
        self.with_live(|requests, _| requests.len())
    }

    /// Requests left before the limit, never negative.
    pub fn requests_remaining(&self) -> usize {
        self.config.limit.saturating_sub(self.requests_in_window())
    }

    pub fn is_at_limit(&self) -> bool {
        self.requests_in_window() >= self.config.limit
    }

    /// Time until the oldest recorded request leaves the window; zero if none.
    pub fn time_until_reset(&self) -> Duration {
        self.with_live(|requests, now| {
            requests
                .front()
                .map(|oldest| {
                    oldest
                        .checked_add(self.config.window)
                        .map_or(Duration::MAX, |reset| reset.saturating_duration_since(now))
                })
                .unwrap_or(Duration::ZERO)
        })
    }

    /// Forget all recorded requests.
    pub fn reset(&self) {
        self.requests
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn is_stale(&self, recorded: Instant, now: Instant) -> bool {
        now.duration_since(recorded) >= self.config.window
    }

    fn evict(&self, requests: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = requests.front() {
            if !self.is_stale(*oldest, now) {
                break;
            }
            requests.pop_front();
        }
    }

    /// Read the live entries, taking the write lock only when eviction is due.
    fn with_live<R>(&self, read: impl Fn(&VecDeque<Instant>, Instant) -> R) -> R {
        let now = Instant::now();
        {
            let requests = self.requests.read().unwrap_or_else(PoisonError::into_inner);
            match requests.front() {
                Some(oldest) if self.is_stale(*oldest, now) => {}
                _ => return read(&requests, now),
            }
        }

        let mut requests = self.requests.write().unwrap_or_else(PoisonError::into_inner);
        self.evict(&mut requests, now);
        read(&requests, now)
    }
}

impl Default for RateLimitTracker {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
