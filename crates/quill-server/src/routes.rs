//! Route handlers and the SSE response mapping.
//!
//! Error split: failures before the stream opens become JSON error
//! responses with the status from [`ChatError::status_code`]; once the SSE
//! body has started, the status line is gone and failures arrive as a
//! terminal `error` frame inside the stream.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use bytes::Bytes;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::error;

use quill_chat::orchestrator::{ChatTurn, Orchestrator};
use quill_chat::store::ConversationRecord;
use quill_core::errors::ChatError;
use quill_core::ids::ConversationId;

use crate::auth::{AuthUser, Authenticator, bearer_token};
use crate::health::{HealthResponse, health_check};

/// Header carrying the ID of the persisted user message.
pub const MESSAGE_ID_HEADER: &str = "x-message-id";

/// Shared state accessible from handlers.
#[derive(Clone)]
pub struct AppState {
    /// The per-request coordinator.
    pub orchestrator: Arc<Orchestrator>,
    /// Token resolver.
    pub auth: Arc<dyn Authenticator>,
    /// When the server started.
    pub start_time: Instant,
}

/// Build the router over shared state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/chat/conversations", post(create_conversation_handler))
        .route("/api/chat/messages", post(send_message_handler))
        .route("/api/chat/regenerate", post(regenerate_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Error mapping
// ─────────────────────────────────────────────────────────────────────────────

/// [`ChatError`] as a JSON error response.
struct ApiError(ChatError);

impl From<ChatError> for ApiError {
    fn from(e: ChatError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }
        let mut body = serde_json::json!({ "error": self.0.user_message() });
        if let Some(retry) = self.0.retry_after_seconds() {
            body["retryAfter"] = retry.into();
        }
        (status, Json(body)).into_response()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request / response bodies
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageRequest {
    conversation_id: ConversationId,
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegenerateRequest {
    conversation_id: ConversationId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateConversationRequest {
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConversationResponse {
    id: ConversationId,
    title: Option<String>,
    model: Option<String>,
    message_count: u64,
    total_tokens: u64,
}

impl From<ConversationRecord> for ConversationResponse {
    fn from(record: ConversationRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            model: record.model,
            message_count: record.message_count,
            total_tokens: record.total_tokens,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AuthUser, ApiError> {
    let header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError(ChatError::Auth))?;
    let token = bearer_token(header).ok_or(ApiError(ChatError::Auth))?;
    state
        .auth
        .authenticate(token)
        .ok_or(ApiError(ChatError::Auth))
}

/// Encode a [`ChatTurn`] as the SSE response. When a user message was
/// persisted, its ID travels in the [`MESSAGE_ID_HEADER`] header so the
/// client can reference it before the stream completes.
fn sse_response(turn: ChatTurn) -> Response {
    let ChatTurn {
        user_message_id,
        events,
    } = turn;

    let frames = events
        .map(|event| Ok::<_, Infallible>(Bytes::from(format!("data: {}\n\n", event.to_wire()))));

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache");
    if let Some(id) = user_message_id {
        builder = builder.header(MESSAGE_ID_HEADER, id.as_str());
    }
    match builder.body(Body::from_stream(frames)) {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, "failed to build sse response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health_check(state.start_time))
}

/// POST /api/chat/conversations
async fn create_conversation_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateConversationRequest>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let user = authenticate(&state, &headers)?;
    let record = state
        .orchestrator
        .store()
        .create_conversation(&user.user_id, request.model)
        .await
        .map_err(ChatError::from)?;
    Ok(Json(record.into()))
}

/// POST /api/chat/messages
async fn send_message_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SendMessageRequest>,
) -> Result<Response, ApiError> {
    let user = authenticate(&state, &headers)?;
    let turn = state
        .orchestrator
        .send_message(
            &user.user_id,
            &user.role,
            &request.conversation_id,
            &request.content,
            CancellationToken::new(),
        )
        .await?;
    Ok(sse_response(turn))
}

/// POST /api/chat/regenerate
async fn regenerate_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RegenerateRequest>,
) -> Result<Response, ApiError> {
    let user = authenticate(&state, &headers)?;
    let turn = state
        .orchestrator
        .regenerate(
            &user.user_id,
            &user.role,
            &request.conversation_id,
            CancellationToken::new(),
        )
        .await?;
    Ok(sse_response(turn))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
