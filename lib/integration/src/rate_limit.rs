//! Per-integration rate limiting for outbound sync attempts.
//!
//! Fixed-window algorithm: the first request in a window sets the reset
//! time sixty seconds out; requests past the configured limit are rejected
//! until the window resets. Check-then-increment is atomic per integration
//! because all windows live behind one lock.

use chrono::{DateTime, Duration, Utc};
use cobalt_courier_core::IntegrationId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Window length for the fixed-window algorithm.
const WINDOW_SECONDS: i64 = 60;

/// Ephemeral counter state for one integration. Never persisted.
#[derive(Debug, Clone)]
struct RateWindow {
    /// Requests admitted in the current window.
    count: u32,
    /// When the current window expires.
    reset_at: DateTime<Utc>,
}

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// Request is allowed.
    Allowed {
        remaining: u32,
        resets_at: DateTime<Utc>,
    },
    /// Rate limit exceeded; retry after the window resets.
    Exceeded {
        retry_after: Duration,
        resets_at: DateTime<Utc>,
    },
}

impl RateLimitDecision {
    /// Returns true if the request is allowed.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// Fixed-window rate limiter keyed by integration id.
///
/// The per-minute limit comes from each integration's configuration; the
/// `burst_limit` and `requests_per_hour` fields are reserved for a
/// token-bucket upgrade and are not consulted here.
#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: Arc<Mutex<HashMap<IntegrationId, RateWindow>>>,
}

impl RateLimiter {
    /// Creates a rate limiter with no recorded windows.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks whether a request is allowed and, if so, counts it.
    pub fn check_and_increment(&self, id: IntegrationId, limit: u32) -> RateLimitDecision {
        self.check_and_increment_at(id, limit, Utc::now())
    }

    /// Time-injected variant of [`check_and_increment`](Self::check_and_increment).
    pub fn check_and_increment_at(
        &self,
        id: IntegrationId,
        limit: u32,
        now: DateTime<Utc>,
    ) -> RateLimitDecision {
        let mut windows = self.windows.lock().unwrap();
        let window_duration = Duration::seconds(WINDOW_SECONDS);

        match windows.get_mut(&id) {
            Some(window) if now < window.reset_at => {
                if window.count < limit {
                    window.count += 1;
                    RateLimitDecision::Allowed {
                        remaining: limit - window.count,
                        resets_at: window.reset_at,
                    }
                } else {
                    RateLimitDecision::Exceeded {
                        retry_after: window.reset_at - now,
                        resets_at: window.reset_at,
                    }
                }
            }
            _ => {
                // First request, or the window has expired: start a fresh one.
                let reset_at = now + window_duration;
                windows.insert(id, RateWindow { count: 1, reset_at });
                RateLimitDecision::Allowed {
                    remaining: limit.saturating_sub(1),
                    resets_at: reset_at,
                }
            }
        }
    }

    /// Clears the window for an integration.
    pub fn reset(&self, id: IntegrationId) {
        let mut windows = self.windows.lock().unwrap();
        windows.remove(&id);
    }
}

impl Clone for RateLimiter {
    fn clone(&self) -> Self {
        Self {
            windows: Arc::clone(&self.windows),
        }
    }
}
