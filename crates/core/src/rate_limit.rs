use dashmap::DashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;

const WINDOW: Duration = Duration::from_secs(60);

/// Per-client sliding-window limiter.
pub struct RateLimiter {
    windows: DashMap<String, SlidingWindow>,
    config: RwLock<RateLimitConfig>,
}

struct SlidingWindow {
    timestamps: Vec<Instant>,
}

impl SlidingWindow {
    fn prune(&mut self, now: Instant) {
        self.timestamps
            .retain(|&t| now.saturating_duration_since(t) < WINDOW);
    }

    /// Seconds until the oldest request leaves the window.
    fn reset_secs(&self, now: Instant) -> u64 {
        self.timestamps
            .first()
            .map(|&oldest| WINDOW.saturating_sub(now.saturating_duration_since(oldest)))
            .unwrap_or(WINDOW)
            .as_secs()
            .max(1)
    }
}

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub allowed: bool,
    pub limit: u32,
    /// Requests left in the window after this one.
    pub remaining: u32,
    pub reset_secs: u64,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            windows: DashMap::new(),
            config: RwLock::new(config.clone()),
        }
    }

    /// Update configuration (called on reload).
    pub fn update_config(&self, config: &RateLimitConfig) {
        if let Ok(mut cfg) = self.config.write() {
            *cfg = config.clone();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.read().map(|c| c.enabled).unwrap_or(false)
    }

    /// Count a request for `key`; rejected requests are not recorded.
    pub fn check(&self, key: &str) -> RateLimitInfo {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> RateLimitInfo {
        let limit = self
            .config
            .read()
            .map(|c| c.requests_per_minute)
            .unwrap_or(0);

        let mut window = self
            .windows
            .entry(key.to_string())
            .or_insert_with(|| SlidingWindow {
                timestamps: Vec::new(),
            });
        window.prune(now);

        let used = window.timestamps.len() as u32;
        if used >= limit {
            return RateLimitInfo {
                allowed: false,
                limit,
                remaining: 0,
                reset_secs: window.reset_secs(now),
            };
        }

        window.timestamps.push(now);
        RateLimitInfo {
            allowed: true,
            limit,
            remaining: limit - used - 1,
            reset_secs: window.reset_secs(now),
        }
    }

    /// Drop windows with no recent requests.
    pub fn purge_idle(&self) {
        let now = Instant::now();
        self.windows.retain(|_, w| {
            w.prune(now);
            !w.timestamps.is_empty()
        });
    }
}
