//! Approximate token counting from text length.
//!
//! The upstream provider bills by token; this estimator approximates counts
//! with a fixed characters-per-token ratio so context budgeting never needs
//! a network round trip or a tokenizer model.

use quill_core::constants::{CHARS_PER_TOKEN, PER_MESSAGE_TOKEN_OVERHEAD};
use quill_core::messages::ChatMessage;

/// Estimate the token count of a text: `ceil(len / CHARS_PER_TOKEN)`.
#[must_use]
pub fn estimate_tokens(text: &str) -> u64 {
    (text.len() as u64).div_ceil(CHARS_PER_TOKEN as u64)
}

/// Estimate the token count of a message sequence.
///
/// Sum of per-message estimates plus a fixed per-message overhead
/// approximating protocol framing cost.
#[must_use]
pub fn estimate_messages_tokens(messages: &[ChatMessage]) -> u64 {
    messages
        .iter()
        .map(|m| estimate_tokens(&m.content) + PER_MESSAGE_TOKEN_OVERHEAD)
        .sum()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
