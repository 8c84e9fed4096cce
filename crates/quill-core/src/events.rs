//! Streaming events and their wire encoding.
//!
//! [`StreamEvent`] is the tagged union produced by the streaming relay and
//! consumed by the HTTP surface. Exactly one [`StreamEvent::Done`] or
//! [`StreamEvent::Error`] terminates a stream; zero or more
//! [`StreamEvent::Token`] events precede it. A stream that ends without a
//! terminal event was cancelled — callers must not treat that as a failure.
//!
//! The wire format (one SSE `data:` frame per event) is:
//!
//! - `{"token": "<delta text>"}`
//! - `{"done": true, "content": "<full text>", "usage": {...}}`
//! - `{"error": true, "message": "<text>"}`

use serde_json::{Value, json};

use crate::messages::TokenUsage;

/// Events emitted while relaying an upstream completion.
///
/// Transient — never persisted. `Token` events drive incremental rendering;
/// the aggregate content and usage arrive only in the terminal `Done`.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// Incremental text delta, in upstream production order.
    Token {
        /// Text fragment.
        text: String,
    },

    /// Terminal success event carrying the full aggregated response.
    Done {
        /// Complete response text.
        content: String,
        /// Usage reported by the provider (zeros if never reported).
        usage: TokenUsage,
    },

    /// Terminal failure event. Mutually exclusive with `Done`.
    Error {
        /// User-facing error description.
        message: String,
    },
}

impl StreamEvent {
    /// Whether this event terminates the stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }

    /// Encode as the JSON payload of one SSE frame.
    #[must_use]
    pub fn to_wire(&self) -> Value {
        match self {
            Self::Token { text } => json!({ "token": text }),
            Self::Done { content, usage } => json!({
                "done": true,
                "content": content,
                "usage": usage,
            }),
            Self::Error { message } => json!({
                "error": true,
                "message": message,
            }),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
