//! # quill-llm
//!
//! The streaming relay between the chat pipeline and the upstream
//! chat-completions provider:
//!
//! - [`sse`] — line-level Server-Sent-Events parsing over a byte stream
//! - [`types`] — upstream request and response wire types
//! - [`relay`] — the relay itself: one streaming HTTP call per request,
//!   token deltas forwarded as they arrive, aggregate content and usage
//!   folded into the terminal event
//!
//! The relay never buffers a full response before forwarding, and a stream
//! that ends without a terminal event was cancelled or timed out — never
//! retried here.

#![deny(unsafe_code)]

pub mod relay;
pub mod sse;
pub mod types;

pub use relay::{Completion, CompletionOptions, EventStream, RelayConfig, StreamingRelay};
