//! The per-request conversation coordinator.
//!
//! One request moves through validation, admission, context assembly,
//! streaming, and persistence, failing fast at the first gate that rejects
//! it. Pre-stream failures surface as [`ChatError`]; once the event stream
//! is returned, failures arrive as a terminal `Error` event instead.
//!
//! Two hard guarantees hold on every path:
//!
//! - the user's outbound message is persisted before the upstream call, so
//!   a failed or cancelled reply never silently loses the user's turn
//! - the concurrency slot is released exactly once, via a guard moved into
//!   the returned stream and dropped when the stream ends or is discarded
//!
//! Persistence failures after the stream has delivered its terminal event
//! are logged and swallowed. The client already has the full response by
//! then; surfacing the failure would retract a success it has seen.

use std::sync::Arc;
use std::time::Instant;

use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use quill_admission::{AdmissionController, AdmissionDecision, Clock, tier_for_role};
use quill_context::{ContextOptions, build_context, validate};
use quill_core::constants::DEFAULT_MODEL;
use quill_core::errors::ChatError;
use quill_core::events::StreamEvent;
use quill_core::ids::{ConversationId, MessageId, UserId};
use quill_core::messages::{Role, TokenUsage};
use quill_llm::{CompletionOptions, EventStream, StreamingRelay};
use quill_tokens::calculate_cost;

use crate::store::{ChatStore, ConversationRecord, MessageRecord};

/// Maximum characters of the opening user message kept as the title.
const TITLE_MAX_CHARS: usize = 50;

/// One admitted chat request, ready to stream.
pub struct ChatTurn {
    /// ID of the user message persisted for this request. Absent for
    /// regeneration, which adds no user message.
    pub user_message_id: Option<MessageId>,
    /// The event stream to relay to the client.
    pub events: EventStream,
}

impl std::fmt::Debug for ChatTurn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatTurn")
            .field("user_message_id", &self.user_message_id)
            .finish_non_exhaustive()
    }
}

/// Coordinates one chat request across the pipeline's collaborators.
pub struct Orchestrator {
    store: Arc<dyn ChatStore>,
    admission: Arc<AdmissionController>,
    relay: Arc<StreamingRelay>,
    clock: Arc<dyn Clock>,
}

impl Orchestrator {
    /// Wire an orchestrator over its collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn ChatStore>,
        admission: Arc<AdmissionController>,
        relay: Arc<StreamingRelay>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            admission,
            relay,
            clock,
        }
    }

    /// Persistence collaborator, exposed for the HTTP surface.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ChatStore> {
        &self.store
    }

    /// Send a user message and stream the assistant's reply.
    ///
    /// The user message is persisted before the upstream call. The returned
    /// stream yields zero or more `Token` events and then `Done` or `Error`;
    /// a stream that ends with neither was cancelled.
    pub async fn send_message(
        &self,
        user_id: &UserId,
        role: &str,
        conversation_id: &ConversationId,
        content: &str,
        cancel: CancellationToken,
    ) -> Result<ChatTurn, ChatError> {
        // Validating.
        let outcome = validate(content);
        if !outcome.valid {
            return Err(ChatError::Validation(
                outcome.error.unwrap_or_else(|| "invalid input".to_string()),
            ));
        }

        self.admit(user_id, role).await?;
        let conversation = self.owned_conversation(user_id, conversation_id).await?;

        // The user's turn is durable before anything upstream can fail.
        let user_message = MessageRecord {
            id: MessageId::new(),
            conversation_id: conversation_id.clone(),
            role: Role::User,
            content: content.to_string(),
            usage: None,
            latency_ms: None,
            created_at_millis: self.clock.now_millis(),
        };
        let user_message_id = user_message.id.clone();
        self.store.append_message(user_message).await?;

        let events = self.stream_reply(user_id, role, conversation, cancel).await?;
        Ok(ChatTurn {
            user_message_id: Some(user_message_id),
            events,
        })
    }

    /// Discard the latest assistant message and stream a fresh reply from
    /// the remaining context.
    ///
    /// Fails with [`ChatError::NothingToRegenerate`] before any upstream
    /// call when there is no assistant message to discard and no other
    /// context remains.
    pub async fn regenerate(
        &self,
        user_id: &UserId,
        role: &str,
        conversation_id: &ConversationId,
        cancel: CancellationToken,
    ) -> Result<ChatTurn, ChatError> {
        self.admit(user_id, role).await?;
        let conversation = self.owned_conversation(user_id, conversation_id).await?;

        let discarded = self
            .store
            .delete_last_assistant_message(conversation_id)
            .await?;
        let remaining = self.store.list_messages(conversation_id).await?;
        if discarded.is_none() && remaining.is_empty() {
            return Err(ChatError::NothingToRegenerate);
        }
        if let Some(discarded) = discarded {
            debug!(conversation = %conversation_id, message = %discarded.id, "discarded assistant message for regeneration");
        }

        let events = self.stream_reply(user_id, role, conversation, cancel).await?;
        Ok(ChatTurn {
            user_message_id: None,
            events,
        })
    }

    /// Admitting: rate window, daily quota, concurrency cap.
    async fn admit(&self, user_id: &UserId, role: &str) -> Result<(), ChatError> {
        let usage = self
            .store
            .user_usage(user_id, self.clock.now_millis())
            .await?;
        match self
            .admission
            .check_admission(user_id, role, usage.daily_tokens)
        {
            AdmissionDecision::Allowed { .. } => Ok(()),
            AdmissionDecision::Denied {
                reason,
                retry_after_seconds,
            } => Err(ChatError::RateLimited {
                reason: reason.as_str().to_string(),
                retry_after_seconds,
            }),
        }
    }

    /// Fetch a conversation and verify ownership. Missing and foreign
    /// conversations are indistinguishable to the caller.
    async fn owned_conversation(
        &self,
        user_id: &UserId,
        conversation_id: &ConversationId,
    ) -> Result<ConversationRecord, ChatError> {
        match self.store.get_conversation(conversation_id).await? {
            Some(conversation) if conversation.owner == *user_id => Ok(conversation),
            _ => Err(ChatError::NotFound),
        }
    }

    /// ContextBuilding and Streaming, with Persisting folded into the
    /// returned stream's terminal transition.
    async fn stream_reply(
        &self,
        user_id: &UserId,
        role: &str,
        conversation: ConversationRecord,
        cancel: CancellationToken,
    ) -> Result<EventStream, ChatError> {
        let history = self.store.list_messages(&conversation.id).await?;
        let chat_history: Vec<_> = history.iter().map(MessageRecord::to_chat_message).collect();
        let mut context_options = ContextOptions::default();
        if let Some(version) = &conversation.prompt_version {
            context_options.prompt_version.clone_from(version);
        }
        let context = build_context(&chat_history, &context_options);
        debug!(
            conversation = %conversation.id,
            messages = context.messages.len(),
            trimmed = context.trimmed_count,
            estimated_tokens = context.estimated_tokens,
            "assembled context"
        );

        let opening_user_content = history
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone());

        let tier = tier_for_role(role);
        let model = conversation
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let options = CompletionOptions {
            model: Some(model.clone()),
            temperature: None,
            max_tokens: Some(tier.max_tokens_per_request),
            cancel,
        };

        let guard = self.admission.start_request(user_id);
        let mut inner = self.relay.stream_completion(context.messages, options);

        let store = Arc::clone(&self.store);
        let clock = Arc::clone(&self.clock);
        let user_id = user_id.clone();
        let started = Instant::now();

        Ok(Box::pin(async_stream::stream! {
            // Holds the concurrency slot until this stream ends or is
            // dropped, whichever comes first.
            let _guard = guard;

            while let Some(event) = inner.next().await {
                if let StreamEvent::Done { content, usage } = &event {
                    let latency_ms =
                        u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                    persist_reply(
                        store.as_ref(),
                        clock.as_ref(),
                        &user_id,
                        &conversation,
                        opening_user_content.as_deref(),
                        &model,
                        content,
                        *usage,
                        latency_ms,
                    )
                    .await;
                }
                let terminal = event.is_terminal();
                yield event;
                if terminal {
                    return;
                }
            }
            // Inner stream ended without a terminal event: cancelled or
            // timed out. The user message is already durable; emit nothing.
            debug!(conversation = %conversation.id, "stream ended without terminal event");
        }))
    }
}

/// Persisting: write the assistant message, fold usage into the user's
/// counters, and derive a title on the first assistant reply. Failures are
/// logged, never surfaced.
#[allow(clippy::too_many_arguments)]
async fn persist_reply(
    store: &dyn ChatStore,
    clock: &dyn Clock,
    user_id: &UserId,
    conversation: &ConversationRecord,
    opening_user_content: Option<&str>,
    model: &str,
    content: &str,
    usage: TokenUsage,
    latency_ms: u64,
) {
    let now = clock.now_millis();
    let record = MessageRecord {
        id: MessageId::new(),
        conversation_id: conversation.id.clone(),
        role: Role::Assistant,
        content: content.to_string(),
        usage: Some(usage),
        latency_ms: Some(latency_ms),
        created_at_millis: now,
    };
    if let Err(e) = store.append_message(record).await {
        warn!(conversation = %conversation.id, error = %e, "failed to persist assistant message");
        return;
    }

    let cost = calculate_cost(model, usage.input_tokens, usage.output_tokens);
    if let Err(e) = store.record_usage(user_id, usage, cost, now).await {
        warn!(user = %user_id, error = %e, "failed to record usage");
    }

    if conversation.title.is_none() {
        if let Some(opening) = opening_user_content {
            let title = derive_title(opening);
            if let Err(e) = store.set_conversation_title(&conversation.id, &title).await {
                warn!(conversation = %conversation.id, error = %e, "failed to set conversation title");
            }
        }
    }

    info!(
        conversation = %conversation.id,
        user = %user_id,
        tokens = usage.total_tokens,
        latency_ms,
        "assistant reply persisted"
    );
}

/// Derive a short display title from the opening user message: its first
/// line, capped by character count with an ellipsis.
fn derive_title(opening: &str) -> String {
    let first_line = opening.trim().lines().next().unwrap_or("").trim();
    if first_line.chars().count() <= TITLE_MAX_CHARS {
        first_line.to_string()
    } else {
        let mut title: String = first_line.chars().take(TITLE_MAX_CHARS).collect();
        title.push_str("...");
        title
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
