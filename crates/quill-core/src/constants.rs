//! Pipeline-wide constants.
//!
//! Budgets for context assembly, the token estimator ratio, and admission
//! window sizing. Character budgets are defaults — callers override them
//! through `ContextOptions`, they are not derived from any model's context
//! window.

// ─────────────────────────────────────────────────────────────────────────────
// Token estimation
// ─────────────────────────────────────────────────────────────────────────────

/// Approximate characters per token.
pub const CHARS_PER_TOKEN: usize = 4;

/// Fixed per-message token overhead approximating protocol framing cost.
pub const PER_MESSAGE_TOKEN_OVERHEAD: u64 = 4;

// ─────────────────────────────────────────────────────────────────────────────
// Context assembly
// ─────────────────────────────────────────────────────────────────────────────

/// Default number of history messages kept in the context tail window.
pub const DEFAULT_MAX_CONTEXT_MESSAGES: usize = 15;

/// Default total character budget for the assembled context.
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 80_000;

/// Maximum character length for a single message before truncation.
pub const MAX_MESSAGE_CHARS: usize = 32_000;

/// Marker appended to messages truncated by the per-message limit.
pub const TRUNCATION_MARKER: &str = "[Message truncated due to length...]";

/// Headroom reserved ahead of [`TRUNCATION_MARKER`] so the marker always fits.
pub const TRUNCATION_HEADROOM: usize = 100;

// ─────────────────────────────────────────────────────────────────────────────
// Admission
// ─────────────────────────────────────────────────────────────────────────────

/// Sliding-window length for the message-rate limiter (1 hour).
pub const RATE_WINDOW_MS: i64 = 60 * 60 * 1000;

/// Limiter key suffix for chat requests.
pub const RATE_ACTION_AI_CHAT: &str = "ai-chat";

// ─────────────────────────────────────────────────────────────────────────────
// Upstream
// ─────────────────────────────────────────────────────────────────────────────

/// Hard timeout for a single upstream completion request (seconds).
pub const UPSTREAM_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Default model when a conversation does not specify one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Fallback model surfaced for collaborators deciding escalation policy.
/// Never invoked automatically by the pipeline.
pub const FALLBACK_MODEL: &str = "gpt-4.1";
