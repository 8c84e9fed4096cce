//! # quill-admission
//!
//! Per-user admission control for the chat pipeline. Three gates, checked in
//! order with short-circuit on first failure:
//!
//! 1. Sliding-window message-rate limit ([`limiter`])
//! 2. Daily token quota (state held by the persistence collaborator,
//!    checked here)
//! 3. Concurrency cap ([`controller::ConcurrencyGuard`] guarantees release)
//!
//! Limits are tiered by role ([`tiers`]). All counters live in process
//! memory behind owned services with an injectable [`clock::Clock`], so
//! tests run against deterministic time and a scaled deployment could swap
//! the backing store without changing callers.

#![deny(unsafe_code)]

pub mod clock;
pub mod controller;
pub mod limiter;
pub mod tiers;

pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{
    AdmissionController, AdmissionDecision, ConcurrencyGuard, DenialReason,
    should_reset_daily_quota,
};
pub use limiter::{RateDecision, RateLimiter};
pub use tiers::{RateLimitTier, tier_for_role};
