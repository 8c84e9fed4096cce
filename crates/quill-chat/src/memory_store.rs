//! In-memory [`ChatStore`].
//!
//! Backing store for tests and for deployments that accept process-lifetime
//! persistence. One mutex over the whole state keeps every aggregate update
//! atomic with respect to concurrent requests; contention is negligible at
//! the write rates this pipeline admits.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use quill_admission::should_reset_daily_quota;
use quill_core::ids::{ConversationId, UserId};
use quill_core::messages::{Role, TokenUsage};

use crate::store::{ChatStore, ConversationRecord, MessageRecord, StoreError, UserUsageRecord};

#[derive(Default)]
struct State {
    conversations: HashMap<String, ConversationRecord>,
    // Keyed by conversation ID, messages in creation order.
    messages: HashMap<String, Vec<MessageRecord>>,
    usage: HashMap<String, UserUsageRecord>,
}

/// Process-memory [`ChatStore`] implementation.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn create_conversation(
        &self,
        owner: &UserId,
        model: Option<String>,
    ) -> Result<ConversationRecord, StoreError> {
        let record = ConversationRecord {
            id: ConversationId::new(),
            owner: owner.clone(),
            title: None,
            model,
            prompt_version: None,
            message_count: 0,
            total_tokens: 0,
            created_at_millis: 0,
        };
        let mut state = self.state.lock();
        let _ = state
            .conversations
            .insert(record.id.as_str().to_string(), record.clone());
        Ok(record)
    }

    async fn get_conversation(
        &self,
        id: &ConversationId,
    ) -> Result<Option<ConversationRecord>, StoreError> {
        Ok(self.state.lock().conversations.get(id.as_str()).cloned())
    }

    async fn set_conversation_title(
        &self,
        id: &ConversationId,
        title: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let conversation = state
            .conversations
            .get_mut(id.as_str())
            .ok_or(StoreError::NotFound)?;
        conversation.title = Some(title.to_string());
        Ok(())
    }

    async fn list_messages(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        Ok(self
            .state
            .lock()
            .messages
            .get(conversation_id.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn append_message(&self, record: MessageRecord) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let conversation = state
            .conversations
            .get_mut(record.conversation_id.as_str())
            .ok_or(StoreError::NotFound)?;
        conversation.message_count += 1;
        conversation.total_tokens += record.usage.map_or(0, |u| u.total_tokens);

        state
            .messages
            .entry(record.conversation_id.as_str().to_string())
            .or_default()
            .push(record);
        Ok(())
    }

    async fn delete_last_assistant_message(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<MessageRecord>, StoreError> {
        let mut state = self.state.lock();
        let Some(messages) = state.messages.get_mut(conversation_id.as_str()) else {
            return Ok(None);
        };
        let Some(index) = messages.iter().rposition(|m| m.role == Role::Assistant) else {
            return Ok(None);
        };
        let removed = messages.remove(index);

        let conversation = state
            .conversations
            .get_mut(conversation_id.as_str())
            .ok_or(StoreError::NotFound)?;
        conversation.message_count = conversation.message_count.saturating_sub(1);
        conversation.total_tokens = conversation
            .total_tokens
            .saturating_sub(removed.usage.map_or(0, |u| u.total_tokens));

        Ok(Some(removed))
    }

    async fn user_usage(
        &self,
        user_id: &UserId,
        now_millis: i64,
    ) -> Result<UserUsageRecord, StoreError> {
        let mut state = self.state.lock();
        let record = state
            .usage
            .entry(user_id.as_str().to_string())
            .or_insert_with(|| UserUsageRecord::zeroed(user_id.clone(), now_millis));
        if should_reset_daily_quota(record.last_reset_millis, now_millis) {
            record.daily_tokens = 0;
            record.last_reset_millis = now_millis;
        }
        Ok(record.clone())
    }

    async fn record_usage(
        &self,
        user_id: &UserId,
        usage: TokenUsage,
        cost: f64,
        now_millis: i64,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let record = state
            .usage
            .entry(user_id.as_str().to_string())
            .or_insert_with(|| UserUsageRecord::zeroed(user_id.clone(), now_millis));
        if should_reset_daily_quota(record.last_reset_millis, now_millis) {
            record.daily_tokens = 0;
            record.last_reset_millis = now_millis;
        }
        record.daily_tokens += usage.total_tokens;
        record.total_tokens += usage.total_tokens;
        record.total_cost += cost;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
