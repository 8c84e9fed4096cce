//! # quill-core
//!
//! Shared types for the Quill AI chat pipeline:
//!
//! - [`messages`] — chat message and token usage types
//! - [`events`] — streaming events and their wire encoding
//! - [`errors`] — the [`ChatError`](errors::ChatError) taxonomy
//! - [`ids`] — branded ID newtypes (UUID v7)
//! - [`constants`] — budgets, markers, and window sizes

#![deny(unsafe_code)]

pub mod constants;
pub mod errors;
pub mod events;
pub mod ids;
pub mod messages;

pub use errors::ChatError;
pub use events::StreamEvent;
pub use ids::{ConversationId, MessageId, UserId};
pub use messages::{ChatMessage, Role, TokenUsage};
