//! Error taxonomy for the chat pipeline.
//!
//! Built on [`thiserror`]. Each variant maps to an HTTP status for the
//! pre-stream surface; errors that occur after the response stream has
//! opened are converted into a terminal `Error` frame instead (the status
//! line and headers are already gone by then).

use thiserror::Error;

/// Errors surfaced by the chat pipeline.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Bad or oversized user input. User-fixable, surfaced verbatim.
    #[error("{0}")]
    Validation(String),

    /// No caller identity. Terminal, no retry.
    #[error("authentication required")]
    Auth,

    /// Conversation missing or not owned by the caller.
    #[error("conversation not found")]
    NotFound,

    /// Admission denied by rate window, daily quota, or concurrency cap.
    #[error("rate limited: {reason}")]
    RateLimited {
        /// Which limit denied the request.
        reason: String,
        /// Seconds until a retry can succeed, when derivable.
        retry_after_seconds: Option<u64>,
    },

    /// No prior assistant message to discard and no remaining context.
    #[error("nothing to regenerate")]
    NothingToRegenerate,

    /// Upstream provider call failed or returned non-success.
    #[error("upstream error ({status}): {message}")]
    Upstream {
        /// HTTP status from the provider (0 when the call never completed).
        status: u16,
        /// Upstream-provided or generic status-coded message.
        message: String,
    },

    /// Missing credentials or other required configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Persistence collaborator failure.
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl ChatError {
    /// HTTP status code for the pre-stream error surface.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::NothingToRegenerate => 400,
            Self::Auth => 401,
            Self::NotFound => 404,
            Self::RateLimited { .. } => 429,
            Self::Upstream { .. } | Self::Configuration(_) | Self::Persistence(_) => 500,
        }
    }

    /// Retry-after hint in seconds, when one is derivable.
    #[must_use]
    pub fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            Self::RateLimited {
                retry_after_seconds,
                ..
            } => *retry_after_seconds,
            _ => None,
        }
    }

    /// User-facing message. Upstream detail is logged, not surfaced.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Upstream { .. } => "The AI service is temporarily unavailable.".to_string(),
            other => other.to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(ChatError::Validation("empty".into()).status_code(), 400);
        assert_eq!(ChatError::NothingToRegenerate.status_code(), 400);
        assert_eq!(ChatError::Auth.status_code(), 401);
        assert_eq!(ChatError::NotFound.status_code(), 404);
        assert_eq!(
            ChatError::RateLimited {
                reason: "window".into(),
                retry_after_seconds: Some(30),
            }
            .status_code(),
            429
        );
        assert_eq!(
            ChatError::Upstream {
                status: 502,
                message: "bad gateway".into(),
            }
            .status_code(),
            500
        );
        assert_eq!(
            ChatError::Configuration("no key".into()).status_code(),
            500
        );
    }

    #[test]
    fn retry_after_only_for_rate_limits() {
        let limited = ChatError::RateLimited {
            reason: "window".into(),
            retry_after_seconds: Some(42),
        };
        assert_eq!(limited.retry_after_seconds(), Some(42));
        assert_eq!(ChatError::Auth.retry_after_seconds(), None);
    }

    #[test]
    fn upstream_detail_not_shown_to_user() {
        let err = ChatError::Upstream {
            status: 500,
            message: "internal provider trace".into(),
        };
        assert!(!err.user_message().contains("trace"));
        assert!(err.to_string().contains("internal provider trace"));
    }

    #[test]
    fn validation_message_is_verbatim() {
        let err = ChatError::Validation("Message cannot be empty".into());
        assert_eq!(err.user_message(), "Message cannot be empty");
    }
}
