//! Sliding-window message-rate limiter.
//!
//! Counts events within a trailing fixed time span, keyed by
//! `(user_id, action)`. State is create-on-first-use and expires as the
//! window slides past recorded timestamps. The check-and-record step runs
//! under one lock acquisition, so concurrent requests from the same user
//! cannot both slip under the limit.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::clock::Clock;

/// Outcome of one rate check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateDecision {
    /// Under the limit; the request was recorded in the window.
    Allowed {
        /// Requests left in the current window, including after this one.
        remaining: u32,
    },
    /// At the limit; nothing recorded.
    Denied {
        /// Seconds until the oldest windowed request expires.
        retry_after_seconds: u64,
    },
}

/// Sliding-window counters keyed by `(user_id, action)`.
pub struct RateLimiter {
    clock: Arc<dyn Clock>,
    windows: Mutex<HashMap<(String, String), Vec<i64>>>,
}

impl RateLimiter {
    /// Create a limiter over the given clock.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Check the window and record the request when under the limit.
    ///
    /// Prunes timestamps older than `window_ms`, denies when the remaining
    /// count has reached `limit`, otherwise records the current instant.
    pub fn hit(&self, user_id: &str, action: &str, limit: u32, window_ms: i64) -> RateDecision {
        let now = self.clock.now_millis();
        let mut windows = self.windows.lock();
        let window = windows
            .entry((user_id.to_string(), action.to_string()))
            .or_default();

        window.retain(|&t| now - t < window_ms);

        if window.len() >= limit as usize {
            let oldest = window.first().copied().unwrap_or(now);
            let remaining_ms = (oldest + window_ms - now).max(0);
            #[allow(clippy::cast_sign_loss)] // clamped non-negative above
            let retry_after_seconds = (remaining_ms as u64).div_ceil(1000);
            return RateDecision::Denied {
                retry_after_seconds,
            };
        }

        window.push(now);
        #[allow(clippy::cast_possible_truncation)] // len <= limit: u32
        let used = window.len() as u32;
        RateDecision::Allowed {
            remaining: limit - used,
        }
    }

    /// Current count within the window, without recording.
    #[must_use]
    pub fn count(&self, user_id: &str, action: &str, window_ms: i64) -> u32 {
        let now = self.clock.now_millis();
        let windows = self.windows.lock();
        windows
            .get(&(user_id.to_string(), action.to_string()))
            .map_or(0, |w| {
                #[allow(clippy::cast_possible_truncation)]
                let n = w.iter().filter(|&&t| now - t < window_ms).count() as u32;
                n
            })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
