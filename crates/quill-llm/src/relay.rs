//! # Streaming Relay
//!
//! Opens one streaming request against the upstream provider and relays
//! token deltas to the caller as they are parsed. The relay aggregates the
//! full response text and the provider-reported usage itself and delivers
//! them only in the terminal [`StreamEvent::Done`], so callers never
//! re-derive aggregate state.
//!
//! Two cancellation sources compose, first to fire wins:
//!
//! - a hard per-request timeout (60s), enforced by the HTTP client
//! - the caller's [`CancellationToken`], checked every read-loop iteration
//!
//! Either one ends the stream with **no terminal event** — the caller treats
//! "ended without `Done` or `Error`" as a cancellation, not a failure.

use std::pin::Pin;
use std::time::Duration;

use bytes::BytesMut;
use futures::Stream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use quill_core::constants::{DEFAULT_MODEL, FALLBACK_MODEL, UPSTREAM_REQUEST_TIMEOUT_SECS};
use quill_core::errors::ChatError;
use quill_core::events::StreamEvent;
use quill_core::messages::{ChatMessage, TokenUsage};

use crate::sse::drain_data_lines;
use crate::types::{
    CompletionChunk, CompletionRequest, CompletionResponse, StreamRequestOptions,
};

/// Boxed stream of relay events.
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Configuration for the upstream provider connection.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// Upstream API key. Absence fails every call fast with a
    /// configuration error — never a silent degrade.
    pub api_key: Option<String>,
    /// Provider base URL.
    pub base_url: String,
    /// Model used when a request does not name one.
    pub default_model: String,
    /// Fallback model surfaced for collaborators; never auto-invoked here.
    pub fallback_model: String,
    /// Hard timeout for one upstream request.
    pub request_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            fallback_model: FALLBACK_MODEL.to_string(),
            request_timeout: Duration::from_secs(UPSTREAM_REQUEST_TIMEOUT_SECS),
        }
    }
}

/// Options for one completion call.
#[derive(Clone, Debug, Default)]
pub struct CompletionOptions {
    /// Model override; the relay default applies when absent.
    pub model: Option<String>,
    /// Sampling temperature.
    pub temperature: Option<f64>,
    /// Maximum output tokens.
    pub max_tokens: Option<u32>,
    /// Caller cancellation signal.
    pub cancel: CancellationToken,
}

/// Result of a non-streaming completion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Completion {
    /// Full response text.
    pub content: String,
    /// Usage reported by the provider (zeros if never reported).
    pub usage: TokenUsage,
}

/// Relay between the chat pipeline and the upstream provider.
pub struct StreamingRelay {
    config: RelayConfig,
    client: reqwest::Client,
}

impl StreamingRelay {
    /// Create a relay over a fresh HTTP client.
    #[must_use]
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Model used when a request does not name one.
    #[must_use]
    pub fn default_model(&self) -> &str {
        &self.config.default_model
    }

    /// Fallback model for collaborators deciding escalation policy.
    #[must_use]
    pub fn fallback_model(&self) -> &str {
        &self.config.fallback_model
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    fn resolve_model(&self, options: &CompletionOptions) -> String {
        options
            .model
            .clone()
            .unwrap_or_else(|| self.config.default_model.clone())
    }

    /// Stream a completion as [`StreamEvent`]s.
    ///
    /// Zero or more `Token` events, then exactly one `Done` or `Error` —
    /// unless the call is cancelled or times out, in which case the stream
    /// ends with no terminal event. Pre-flight failures (missing key,
    /// non-success status) surface as a single `Error` event.
    #[must_use]
    pub fn stream_completion(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> EventStream {
        let client = self.client.clone();
        let url = self.completions_url();
        let model = self.resolve_model(&options);
        let api_key = self.config.api_key.clone();
        let timeout = self.config.request_timeout;

        Box::pin(async_stream::stream! {
            let Some(api_key) = api_key else {
                yield StreamEvent::Error {
                    message: "AI chat is not configured: missing upstream API key".to_string(),
                };
                return;
            };

            let request = CompletionRequest {
                model: model.clone(),
                messages,
                temperature: options.temperature,
                max_tokens: options.max_tokens,
                stream: true,
                stream_options: Some(StreamRequestOptions {
                    include_usage: true,
                }),
            };

            debug!(model = %model, "opening upstream stream");

            let cancel = options.cancel;
            let send = client
                .post(&url)
                .bearer_auth(&api_key)
                .json(&request)
                .timeout(timeout)
                .send();

            let response = tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                response = send => response,
            };

            let response = match response {
                Ok(response) => response,
                Err(e) if e.is_timeout() => {
                    warn!(model = %model, "upstream request timed out");
                    return;
                }
                Err(e) => {
                    warn!(model = %model, error = %e, "upstream request failed");
                    yield StreamEvent::Error {
                        message: format!("Upstream connection failed: {e}"),
                    };
                    return;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = parse_api_error(&body, status.as_u16());
                warn!(status = status.as_u16(), body = %body, "upstream returned error status");
                yield StreamEvent::Error { message };
                return;
            }

            let mut byte_stream = Box::pin(response.bytes_stream());
            let mut buffer = BytesMut::with_capacity(8192);
            let mut content = String::new();
            let mut usage: Option<TokenUsage> = None;

            loop {
                let chunk = tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        debug!("caller cancelled upstream stream");
                        return;
                    }
                    chunk = byte_stream.next() => chunk,
                };

                match chunk {
                    Some(Ok(bytes)) => {
                        buffer.extend_from_slice(&bytes);
                        for data in drain_data_lines(&mut buffer) {
                            let parsed: CompletionChunk = match serde_json::from_str(&data) {
                                Ok(parsed) => parsed,
                                Err(e) => {
                                    // One bad line never aborts the stream.
                                    warn!(error = %e, "skipping malformed upstream frame");
                                    continue;
                                }
                            };

                            if let Some(wire) = parsed.usage {
                                usage = Some(wire.into());
                            }

                            for choice in parsed.choices {
                                if let Some(delta) = choice.delta.content {
                                    if !delta.is_empty() {
                                        content.push_str(&delta);
                                        yield StreamEvent::Token { text: delta };
                                    }
                                }
                            }
                        }
                    }
                    Some(Err(e)) if e.is_timeout() => {
                        warn!("upstream stream timed out mid-read");
                        return;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "upstream stream read error");
                        yield StreamEvent::Error {
                            message: format!("Upstream connection lost: {e}"),
                        };
                        return;
                    }
                    None => break,
                }
            }

            yield StreamEvent::Done {
                content,
                usage: usage.unwrap_or_default(),
            };
        })
    }

    /// Perform the same request without streaming and return the full result.
    ///
    /// Used where partial-token delivery is unnecessary.
    pub async fn create_completion(
        &self,
        messages: Vec<ChatMessage>,
        options: &CompletionOptions,
    ) -> Result<Completion, ChatError> {
        let api_key = self.config.api_key.as_ref().ok_or_else(|| {
            ChatError::Configuration("missing upstream API key".to_string())
        })?;

        let request = CompletionRequest {
            model: self.resolve_model(options),
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stream: false,
            stream_options: None,
        };

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(api_key)
            .json(&request)
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(|e| ChatError::Upstream {
                status: 0,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Upstream {
                status: status.as_u16(),
                message: parse_api_error(&body, status.as_u16()),
            });
        }

        let parsed: CompletionResponse =
            response.json().await.map_err(|e| ChatError::Upstream {
                status: status.as_u16(),
                message: format!("invalid upstream response: {e}"),
            })?;

        let content = parsed
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();
        let usage = parsed.usage.map(Into::into).unwrap_or_default();

        Ok(Completion { content, usage })
    }
}

/// Parse an upstream error response body into a user-facing message.
///
/// Prefers the provider's own `error.message` when the body is JSON,
/// otherwise falls back to a generic status-coded message.
fn parse_api_error(body: &str, status: u16) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = json["error"]["message"].as_str() {
            return message.to_string();
        }
    }
    format!("Upstream request failed with status {status}")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
