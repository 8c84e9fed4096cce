//! Role-based admission tiers.
//!
//! One immutable [`RateLimitTier`] per role. Unknown roles get the `user`
//! tier — a typo in a role claim must never grant elevated limits.

use serde::{Deserialize, Serialize};

/// Admission limits for one role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitTier {
    /// Messages allowed per sliding hour.
    pub messages_per_hour: u32,
    /// Total tokens allowed per UTC day.
    pub daily_token_limit: u64,
    /// Maximum output tokens requested per upstream call.
    pub max_tokens_per_request: u32,
    /// In-flight streaming requests allowed at once.
    pub max_concurrent_requests: u32,
}

/// Tier for ordinary users.
pub const USER_TIER: RateLimitTier = RateLimitTier {
    messages_per_hour: 30,
    daily_token_limit: 100_000,
    max_tokens_per_request: 2_048,
    max_concurrent_requests: 2,
};

/// Tier for moderators.
pub const MODERATOR_TIER: RateLimitTier = RateLimitTier {
    messages_per_hour: 60,
    daily_token_limit: 250_000,
    max_tokens_per_request: 4_096,
    max_concurrent_requests: 3,
};

/// Tier for administrators.
pub const ADMIN_TIER: RateLimitTier = RateLimitTier {
    messages_per_hour: 120,
    daily_token_limit: 1_000_000,
    max_tokens_per_request: 8_192,
    max_concurrent_requests: 5,
};

/// Resolve the tier for a role string. Unknown roles fall back to `user`.
#[must_use]
pub fn tier_for_role(role: &str) -> RateLimitTier {
    match role {
        "moderator" => MODERATOR_TIER,
        "admin" => ADMIN_TIER,
        _ => USER_TIER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_roles_resolve() {
        assert_eq!(tier_for_role("user"), USER_TIER);
        assert_eq!(tier_for_role("moderator"), MODERATOR_TIER);
        assert_eq!(tier_for_role("admin"), ADMIN_TIER);
    }

    #[test]
    fn unknown_role_falls_back_to_user() {
        assert_eq!(tier_for_role("superuser"), USER_TIER);
        assert_eq!(tier_for_role(""), USER_TIER);
    }

    #[test]
    fn tiers_escalate_with_role() {
        assert!(MODERATOR_TIER.messages_per_hour > USER_TIER.messages_per_hour);
        assert!(ADMIN_TIER.daily_token_limit > MODERATOR_TIER.daily_token_limit);
        assert!(ADMIN_TIER.max_concurrent_requests > USER_TIER.max_concurrent_requests);
    }
}
