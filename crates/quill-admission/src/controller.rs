//! The admission gate: rate window, daily quota, concurrency cap.
//!
//! [`AdmissionController::check_admission`] runs the three checks in order,
//! short-circuiting on the first failure. Admitted requests must be bracketed
//! by [`AdmissionController::start_request`] / release of the returned
//! [`ConcurrencyGuard`]; the guard decrements the concurrency counter on
//! drop, so the counter returns to zero on every exit path — success,
//! upstream error, cancellation, or a panic in persistence.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::DateTime;
use parking_lot::Mutex;
use tracing::debug;

use quill_core::constants::{RATE_ACTION_AI_CHAT, RATE_WINDOW_MS};
use quill_core::ids::UserId;

use crate::clock::Clock;
use crate::limiter::{RateDecision, RateLimiter};
use crate::tiers::tier_for_role;

/// Which gate denied an admission request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DenialReason {
    /// Hourly message window exhausted.
    RateWindow,
    /// Daily token quota exhausted.
    DailyQuota,
    /// Too many in-flight requests.
    Concurrency,
}

impl DenialReason {
    /// User-facing description of the denial.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RateWindow => "hourly message limit reached",
            Self::DailyQuota => "daily token quota exhausted",
            Self::Concurrency => "too many concurrent requests",
        }
    }
}

/// Outcome of one admission check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdmissionDecision {
    /// Request admitted.
    Allowed {
        /// Messages left in the sliding window.
        remaining_messages: u32,
        /// Tokens left in the daily quota.
        remaining_daily_tokens: u64,
    },
    /// Request denied.
    Denied {
        /// Which gate denied it.
        reason: DenialReason,
        /// Retry hint in seconds, when derivable. Absent for concurrency
        /// denials — the caller should wait for an in-flight request.
        retry_after_seconds: Option<u64>,
    },
}

/// Per-user admission gate. One instance per process.
pub struct AdmissionController {
    limiter: RateLimiter,
    concurrency: Mutex<HashMap<String, u32>>,
    clock: Arc<dyn Clock>,
}

impl AdmissionController {
    /// Create a controller over the given clock.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            limiter: RateLimiter::new(clock.clone()),
            concurrency: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Run the three admission checks in order: rate window, daily quota,
    /// concurrency cap. A pass through the rate window records the request.
    #[must_use]
    pub fn check_admission(
        &self,
        user_id: &UserId,
        role: &str,
        daily_tokens_used: u64,
    ) -> AdmissionDecision {
        let tier = tier_for_role(role);

        let remaining_messages = match self.limiter.hit(
            user_id.as_str(),
            RATE_ACTION_AI_CHAT,
            tier.messages_per_hour,
            RATE_WINDOW_MS,
        ) {
            RateDecision::Allowed { remaining } => remaining,
            RateDecision::Denied {
                retry_after_seconds,
            } => {
                debug!(user = %user_id, "admission denied: rate window");
                return AdmissionDecision::Denied {
                    reason: DenialReason::RateWindow,
                    retry_after_seconds: Some(retry_after_seconds),
                };
            }
        };

        if daily_tokens_used >= tier.daily_token_limit {
            debug!(user = %user_id, used = daily_tokens_used, "admission denied: daily quota");
            return AdmissionDecision::Denied {
                reason: DenialReason::DailyQuota,
                retry_after_seconds: None,
            };
        }

        if self.concurrent_requests(user_id) >= tier.max_concurrent_requests {
            debug!(user = %user_id, "admission denied: concurrency cap");
            return AdmissionDecision::Denied {
                reason: DenialReason::Concurrency,
                retry_after_seconds: None,
            };
        }

        AdmissionDecision::Allowed {
            remaining_messages,
            remaining_daily_tokens: tier.daily_token_limit - daily_tokens_used,
        }
    }

    /// Increment the caller's concurrency counter and return the guard that
    /// decrements it on drop.
    #[must_use]
    pub fn start_request(self: &Arc<Self>, user_id: &UserId) -> ConcurrencyGuard {
        {
            let mut counters = self.concurrency.lock();
            *counters.entry(user_id.as_str().to_string()).or_insert(0) += 1;
        }
        ConcurrencyGuard {
            controller: Arc::clone(self),
            user_id: user_id.as_str().to_string(),
        }
    }

    /// Decrement the caller's concurrency counter, saturating at zero.
    ///
    /// Normally invoked by [`ConcurrencyGuard::drop`]; calling it more times
    /// than `start_request` never drives the counter negative.
    pub fn end_request(&self, user_id: &str) {
        let mut counters = self.concurrency.lock();
        if let Some(count) = counters.get_mut(user_id) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                let _ = counters.remove(user_id);
            }
        }
    }

    /// Current in-flight request count for a user.
    #[must_use]
    pub fn concurrent_requests(&self, user_id: &UserId) -> u32 {
        self.concurrency
            .lock()
            .get(user_id.as_str())
            .copied()
            .unwrap_or(0)
    }

    /// Whether a user's daily counters should be zeroed, per this
    /// controller's clock.
    #[must_use]
    pub fn needs_daily_reset(&self, last_reset_millis: i64) -> bool {
        should_reset_daily_quota(last_reset_millis, self.clock.now_millis())
    }
}

/// Scoped concurrency acquisition. Dropping the guard releases the slot.
pub struct ConcurrencyGuard {
    controller: Arc<AdmissionController>,
    user_id: String,
}

impl Drop for ConcurrencyGuard {
    fn drop(&mut self) {
        self.controller.end_request(&self.user_id);
    }
}

/// Whether the current UTC date differs from the stored reset timestamp's
/// date, signaling the caller to zero the daily counters.
#[must_use]
pub fn should_reset_daily_quota(last_reset_millis: i64, now_millis: i64) -> bool {
    let Some(last) = DateTime::from_timestamp_millis(last_reset_millis) else {
        return true;
    };
    let Some(now) = DateTime::from_timestamp_millis(now_millis) else {
        return false;
    };
    last.date_naive() != now.date_naive()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::tiers::USER_TIER;
    use assert_matches::assert_matches;

    fn controller_at(start: i64) -> (Arc<AdmissionController>, ManualClock) {
        let clock = ManualClock::at(start);
        (
            Arc::new(AdmissionController::new(Arc::new(clock.clone()))),
            clock,
        )
    }

    #[test]
    fn fresh_user_is_admitted() {
        let (controller, _) = controller_at(0);
        let decision = controller.check_admission(&UserId::from("u1"), "user", 0);
        assert_matches!(
            decision,
            AdmissionDecision::Allowed {
                remaining_messages,
                remaining_daily_tokens,
            } if remaining_messages == USER_TIER.messages_per_hour - 1
                && remaining_daily_tokens == USER_TIER.daily_token_limit
        );
    }

    #[test]
    fn rate_window_denial_carries_retry_hint() {
        let (controller, _) = controller_at(0);
        let user = UserId::from("u1");
        for _ in 0..USER_TIER.messages_per_hour {
            assert_matches!(
                controller.check_admission(&user, "user", 0),
                AdmissionDecision::Allowed { .. }
            );
        }
        let decision = controller.check_admission(&user, "user", 0);
        assert_matches!(
            decision,
            AdmissionDecision::Denied {
                reason: DenialReason::RateWindow,
                retry_after_seconds: Some(s),
            } if s > 0 && s <= 3_600
        );
    }

    #[test]
    fn daily_quota_denial_has_no_retry_hint() {
        let (controller, _) = controller_at(0);
        let decision = controller.check_admission(
            &UserId::from("u1"),
            "user",
            USER_TIER.daily_token_limit,
        );
        assert_eq!(
            decision,
            AdmissionDecision::Denied {
                reason: DenialReason::DailyQuota,
                retry_after_seconds: None,
            }
        );
    }

    #[test]
    fn concurrency_cap_denies_specifically() {
        let (controller, _) = controller_at(0);
        let user = UserId::from("u1");

        let _guards: Vec<ConcurrencyGuard> = (0..USER_TIER.max_concurrent_requests)
            .map(|_| controller.start_request(&user))
            .collect();

        let decision = controller.check_admission(&user, "user", 0);
        assert_eq!(
            decision,
            AdmissionDecision::Denied {
                reason: DenialReason::Concurrency,
                retry_after_seconds: None,
            }
        );
    }

    #[test]
    fn guard_drop_releases_concurrency_slot() {
        let (controller, _) = controller_at(0);
        let user = UserId::from("u1");

        {
            let _guard = controller.start_request(&user);
            assert_eq!(controller.concurrent_requests(&user), 1);
        }
        assert_eq!(controller.concurrent_requests(&user), 0);
    }

    #[test]
    fn counter_never_goes_negative() {
        let (controller, _) = controller_at(0);
        let user = UserId::from("u1");

        let guard = controller.start_request(&user);
        drop(guard);
        controller.end_request(user.as_str());
        controller.end_request(user.as_str());
        assert_eq!(controller.concurrent_requests(&user), 0);

        // Still usable afterwards.
        let _guard = controller.start_request(&user);
        assert_eq!(controller.concurrent_requests(&user), 1);
    }

    #[test]
    fn counter_returns_to_zero_after_all_requests() {
        let (controller, _) = controller_at(0);
        let user = UserId::from("u1");

        let a = controller.start_request(&user);
        let b = controller.start_request(&user);
        assert_eq!(controller.concurrent_requests(&user), 2);
        drop(a);
        drop(b);
        assert_eq!(controller.concurrent_requests(&user), 0);
    }

    #[test]
    fn unknown_role_uses_user_tier() {
        let (controller, _) = controller_at(0);
        let decision = controller.check_admission(
            &UserId::from("u1"),
            "wizard",
            USER_TIER.daily_token_limit,
        );
        assert_matches!(
            decision,
            AdmissionDecision::Denied {
                reason: DenialReason::DailyQuota,
                ..
            }
        );
    }

    #[test]
    fn admin_tier_admits_past_user_quota() {
        let (controller, _) = controller_at(0);
        let decision = controller.check_admission(
            &UserId::from("u1"),
            "admin",
            USER_TIER.daily_token_limit,
        );
        assert_matches!(decision, AdmissionDecision::Allowed { .. });
    }

    #[test]
    fn rate_window_readmits_after_an_hour() {
        let (controller, clock) = controller_at(0);
        let user = UserId::from("u1");
        for _ in 0..USER_TIER.messages_per_hour {
            let _ = controller.check_admission(&user, "user", 0);
        }
        assert_matches!(
            controller.check_admission(&user, "user", 0),
            AdmissionDecision::Denied { .. }
        );

        clock.advance(RATE_WINDOW_MS);
        assert_matches!(
            controller.check_admission(&user, "user", 0),
            AdmissionDecision::Allowed { .. }
        );
    }

    // ── should_reset_daily_quota ─────────────────────────────────────────

    const DAY_MS: i64 = 24 * 60 * 60 * 1000;

    #[test]
    fn same_day_does_not_reset() {
        let noon = DAY_MS / 2;
        assert!(!should_reset_daily_quota(noon, noon + 1_000));
    }

    #[test]
    fn next_day_resets() {
        let noon = DAY_MS / 2;
        assert!(should_reset_daily_quota(noon, noon + DAY_MS));
    }

    #[test]
    fn reset_at_utc_midnight_boundary() {
        // 23:59:59.999 vs 00:00:00.000 the next day
        assert!(should_reset_daily_quota(DAY_MS - 1, DAY_MS));
        assert!(!should_reset_daily_quota(DAY_MS, DAY_MS + 1));
    }

    #[test]
    fn controller_needs_daily_reset_uses_its_clock() {
        let (controller, clock) = controller_at(DAY_MS / 2);
        assert!(!controller.needs_daily_reset(DAY_MS / 2));
        clock.advance(DAY_MS);
        assert!(controller.needs_daily_reset(DAY_MS / 2));
    }
}
