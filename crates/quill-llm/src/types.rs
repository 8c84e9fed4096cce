//! Upstream chat-completions wire types.
//!
//! Request and response shapes for the provider's `/chat/completions`
//! endpoint, streaming and non-streaming. Kept deliberately minimal — only
//! the fields this pipeline reads.

use serde::{Deserialize, Serialize};

use quill_core::messages::{ChatMessage, TokenUsage};

/// A chat-completions request body.
#[derive(Clone, Debug, Serialize)]
pub struct CompletionRequest {
    /// Model identifier.
    pub model: String,
    /// Context messages, oldest first.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Maximum output tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Whether to stream the response.
    pub stream: bool,
    /// Streaming extras (usage reporting in the final frame).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<StreamRequestOptions>,
}

/// Streaming request extras.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct StreamRequestOptions {
    /// Ask the provider to report usage in the final frame.
    pub include_usage: bool,
}

/// One streamed chunk of a completion.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CompletionChunk {
    /// Choice deltas (the pipeline reads only the first).
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    /// Usage counters, sent once, typically in the final frame.
    #[serde(default)]
    pub usage: Option<WireUsage>,
}

/// One choice within a streamed chunk.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ChunkChoice {
    /// Incremental content delta.
    #[serde(default)]
    pub delta: ChunkDelta,
    /// Finish reason, present on the last content chunk.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// The delta payload of a streamed choice.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ChunkDelta {
    /// New content text, absent on role/finish frames.
    #[serde(default)]
    pub content: Option<String>,
}

/// A non-streaming completion response.
#[derive(Clone, Debug, Deserialize)]
pub struct CompletionResponse {
    /// Completion choices (the pipeline reads only the first).
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
    /// Usage counters.
    #[serde(default)]
    pub usage: Option<WireUsage>,
}

/// One choice of a non-streaming response.
#[derive(Clone, Debug, Deserialize)]
pub struct CompletionChoice {
    /// The full response message.
    pub message: CompletionMessage,
}

/// The message payload of a non-streaming choice.
#[derive(Clone, Debug, Deserialize)]
pub struct CompletionMessage {
    /// Full response text.
    #[serde(default)]
    pub content: Option<String>,
}

/// Usage counters as the provider reports them.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct WireUsage {
    /// Tokens consumed by the prompt.
    #[serde(default)]
    pub prompt_tokens: u64,
    /// Tokens generated.
    #[serde(default)]
    pub completion_tokens: u64,
    /// Provider-reported total, derived when absent.
    #[serde(default)]
    pub total_tokens: Option<u64>,
}

impl From<WireUsage> for TokenUsage {
    fn from(wire: WireUsage) -> Self {
        Self {
            input_tokens: wire.prompt_tokens,
            output_tokens: wire.completion_tokens,
            total_tokens: wire
                .total_tokens
                .unwrap_or(wire.prompt_tokens + wire.completion_tokens),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
