//! # quill-chat
//!
//! Conversation orchestration for the Quill chat pipeline:
//!
//! - [`store`] — the [`ChatStore`](store::ChatStore) persistence contract
//!   and its record types
//! - [`memory_store`] — in-memory [`ChatStore`](store::ChatStore) used by
//!   tests and by deployments without an external store
//! - [`orchestrator`] — the per-request coordinator tying validation,
//!   admission, context assembly, streaming, and persistence together

#![deny(unsafe_code)]

pub mod memory_store;
pub mod orchestrator;
pub mod store;

pub use memory_store::MemoryStore;
pub use orchestrator::{ChatTurn, Orchestrator};
pub use store::{ChatStore, ConversationRecord, MessageRecord, StoreError, UserUsageRecord};
