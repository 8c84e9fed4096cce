//! Persistence contract for conversations, messages, and usage counters.
//!
//! The orchestrator never touches storage directly; it speaks to a
//! [`ChatStore`]. Implementations own their aggregate bookkeeping:
//! appending a message updates the conversation's message and token
//! counters, deleting an assistant message rolls them back, and reading
//! usage applies the lazy daily reset before returning.

use async_trait::async_trait;
use thiserror::Error;

use quill_core::errors::ChatError;
use quill_core::ids::{ConversationId, MessageId, UserId};
use quill_core::messages::{ChatMessage, Role, TokenUsage};

/// A persisted conversation with its running aggregates.
#[derive(Clone, Debug, PartialEq)]
pub struct ConversationRecord {
    /// Conversation ID.
    pub id: ConversationId,
    /// Owning user. Ownership is checked on every request.
    pub owner: UserId,
    /// Display title, absent until the first assistant reply.
    pub title: Option<String>,
    /// Model pinned to this conversation, if any.
    pub model: Option<String>,
    /// System prompt version the conversation was created with. Absent
    /// means the current version.
    pub prompt_version: Option<String>,
    /// Number of persisted messages.
    pub message_count: u64,
    /// Sum of token usage across persisted messages.
    pub total_tokens: u64,
    /// Creation timestamp, Unix milliseconds.
    pub created_at_millis: i64,
}

/// A persisted chat message.
#[derive(Clone, Debug, PartialEq)]
pub struct MessageRecord {
    /// Message ID.
    pub id: MessageId,
    /// Parent conversation.
    pub conversation_id: ConversationId,
    /// Author role.
    pub role: Role,
    /// Message text.
    pub content: String,
    /// Upstream-reported usage. Assistant messages only.
    pub usage: Option<TokenUsage>,
    /// Wall-clock time of the upstream call. Assistant messages only.
    pub latency_ms: Option<u64>,
    /// Creation timestamp, Unix milliseconds.
    pub created_at_millis: i64,
}

impl MessageRecord {
    /// Project onto the exchange type consumed by the context builder.
    #[must_use]
    pub fn to_chat_message(&self) -> ChatMessage {
        ChatMessage {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// Per-user usage counters backing the daily quota and the cost ledger.
#[derive(Clone, Debug, PartialEq)]
pub struct UserUsageRecord {
    /// User these counters belong to.
    pub user_id: UserId,
    /// Tokens consumed since the last daily reset.
    pub daily_tokens: u64,
    /// Lifetime token total.
    pub total_tokens: u64,
    /// Lifetime estimated cost in dollars.
    pub total_cost: f64,
    /// Timestamp of the last daily reset, Unix milliseconds.
    pub last_reset_millis: i64,
}

impl UserUsageRecord {
    /// Fresh zeroed counters for a user, reset-stamped at `now_millis`.
    #[must_use]
    pub fn zeroed(user_id: UserId, now_millis: i64) -> Self {
        Self {
            user_id,
            daily_tokens: 0,
            total_tokens: 0,
            total_cost: 0.0,
            last_reset_millis: now_millis,
        }
    }
}

/// Failures surfaced by a [`ChatStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The addressed record does not exist.
    #[error("record not found")]
    NotFound,
    /// Backend failure (I/O, serialization, connectivity).
    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for ChatError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => Self::NotFound,
            StoreError::Backend(msg) => Self::Persistence(msg),
        }
    }
}

/// Persistence collaborator for the orchestrator.
///
/// All methods are async so a database-backed implementation can slot in
/// without changing the orchestrator.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Create an empty conversation owned by `owner`.
    async fn create_conversation(
        &self,
        owner: &UserId,
        model: Option<String>,
    ) -> Result<ConversationRecord, StoreError>;

    /// Fetch a conversation by ID. `Ok(None)` when it does not exist.
    async fn get_conversation(
        &self,
        id: &ConversationId,
    ) -> Result<Option<ConversationRecord>, StoreError>;

    /// Set a conversation's display title.
    async fn set_conversation_title(
        &self,
        id: &ConversationId,
        title: &str,
    ) -> Result<(), StoreError>;

    /// All messages of a conversation in creation order (oldest first).
    async fn list_messages(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<MessageRecord>, StoreError>;

    /// Append a message and update the conversation's aggregates.
    async fn append_message(&self, record: MessageRecord) -> Result<(), StoreError>;

    /// Delete the most recent assistant message, rolling its token
    /// contribution out of the conversation aggregates. `Ok(None)` when the
    /// conversation holds no assistant message.
    async fn delete_last_assistant_message(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<MessageRecord>, StoreError>;

    /// Current usage counters for a user, with the daily counter zeroed
    /// first when `now_millis` falls on a later UTC date than the stored
    /// reset stamp. Unknown users get zeroed counters.
    async fn user_usage(
        &self,
        user_id: &UserId,
        now_millis: i64,
    ) -> Result<UserUsageRecord, StoreError>;

    /// Fold one completed request's usage and cost into the user counters.
    async fn record_usage(
        &self,
        user_id: &UserId,
        usage: TokenUsage,
        cost: f64,
        now_millis: i64,
    ) -> Result<(), StoreError>;
}
