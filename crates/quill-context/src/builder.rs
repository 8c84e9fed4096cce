//! Bounded context assembly.
//!
//! Builds the message list for one upstream call from persisted history,
//! honoring three independent budgets:
//!
//! 1. Per-message character cap ([`MAX_MESSAGE_CHARS`]) — oversize messages
//!    are truncated with a marker, never dropped for length alone.
//! 2. Tail window ([`ContextOptions::max_messages`]) — only the most recent
//!    N messages are considered.
//! 3. Total character budget ([`ContextOptions::max_chars`]) — oldest
//!    messages are dropped until the total fits.
//!
//! The newest message always survives, even when it alone exceeds the total
//! budget. That single accepted violation keeps the user's current turn from
//! vanishing.

use quill_core::constants::{
    DEFAULT_MAX_CONTEXT_CHARS, DEFAULT_MAX_CONTEXT_MESSAGES, MAX_MESSAGE_CHARS,
    TRUNCATION_HEADROOM, TRUNCATION_MARKER,
};
use quill_core::messages::{ChatMessage, Role};
use quill_tokens::estimate_messages_tokens;
use tracing::debug;

use crate::prompts::{CURRENT_PROMPT_VERSION, resolve_system_prompt};

/// Options for context assembly.
#[derive(Clone, Debug)]
pub struct ContextOptions {
    /// Maximum history messages kept (tail window).
    pub max_messages: usize,
    /// Total character budget across system prompt and history.
    pub max_chars: usize,
    /// Per-message character cap before truncation.
    pub max_message_chars: usize,
    /// System prompt version to inject.
    pub prompt_version: String,
    /// Whether to prepend the system prompt.
    pub include_system_prompt: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            max_messages: DEFAULT_MAX_CONTEXT_MESSAGES,
            max_chars: DEFAULT_MAX_CONTEXT_CHARS,
            max_message_chars: MAX_MESSAGE_CHARS,
            prompt_version: CURRENT_PROMPT_VERSION.to_string(),
            include_system_prompt: true,
        }
    }
}

/// Result of context assembly. Never mutated after construction.
#[derive(Clone, Debug)]
pub struct ContextResult {
    /// Assembled message sequence, system prompt first when included.
    pub messages: Vec<ChatMessage>,
    /// Prompt version actually injected.
    pub prompt_version: String,
    /// Estimated token count of the final sequence.
    pub estimated_tokens: u64,
    /// History messages dropped by the tail window and character budget.
    pub trimmed_count: usize,
}

/// Assemble a bounded context from chronological history (oldest first).
///
/// Embedded system messages are stripped defensively — the system prompt is
/// always injected fresh from `options.prompt_version`.
#[must_use]
pub fn build_context(prior_messages: &[ChatMessage], options: &ContextOptions) -> ContextResult {
    // 1. Strip embedded system messages; 2. truncate each independently.
    let mut kept: Vec<ChatMessage> = prior_messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| truncate_message(m, options.max_message_chars))
        .collect();

    // 3. Tail window.
    let mut trimmed_count = kept.len().saturating_sub(options.max_messages);
    if kept.len() > options.max_messages {
        kept.drain(..kept.len() - options.max_messages);
    }

    let system_prompt = options
        .include_system_prompt
        .then(|| resolve_system_prompt(&options.prompt_version));
    let system_chars = system_prompt.map_or(0, |p| p.chars().count());

    // 4–5. Character budget: drop oldest while over, but never the newest.
    let mut total_chars: usize =
        system_chars + kept.iter().map(|m| m.content.chars().count()).sum::<usize>();
    while total_chars > options.max_chars && kept.len() > 1 {
        let removed = kept.remove(0);
        total_chars -= removed.content.chars().count();
        trimmed_count += 1;
    }

    if trimmed_count > 0 {
        debug!(
            trimmed = trimmed_count,
            remaining = kept.len(),
            "trimmed history to fit context budget"
        );
    }

    // 6. Prepend the fresh system prompt.
    let mut messages = Vec::with_capacity(kept.len() + 1);
    if let Some(prompt) = system_prompt {
        messages.push(ChatMessage::system(prompt));
    }
    messages.extend(kept);

    let estimated_tokens = estimate_messages_tokens(&messages);

    ContextResult {
        messages,
        prompt_version: options.prompt_version.clone(),
        estimated_tokens,
        trimmed_count,
    }
}

/// Truncate a message's content to the per-message cap.
///
/// Over-cap content keeps a prefix of `max_message_chars −
/// TRUNCATION_HEADROOM` characters plus the marker, which guarantees the
/// marker always fits under the cap.
fn truncate_message(message: &ChatMessage, max_message_chars: usize) -> ChatMessage {
    let char_count = message.content.chars().count();
    if char_count <= max_message_chars {
        return message.clone();
    }

    let keep = max_message_chars.saturating_sub(TRUNCATION_HEADROOM);
    let mut content: String = message.content.chars().take(keep).collect();
    content.push_str(TRUNCATION_MARKER);

    ChatMessage {
        role: message.role,
        content,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
