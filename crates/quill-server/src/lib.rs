//! # quill-server
//!
//! Axum HTTP surface for the Quill chat pipeline:
//!
//! - `POST /api/chat/conversations` — create a conversation
//! - `POST /api/chat/messages` — send a message, stream the reply as SSE
//! - `POST /api/chat/regenerate` — discard the last answer and re-stream
//! - `GET /health` — liveness and uptime
//!
//! Pre-stream failures map to JSON error responses (400/401/404/429);
//! failures after the stream has opened arrive as a terminal `error` frame
//! inside the SSE body instead. Client disconnects drop the response body,
//! which drops the relay stream and releases the upstream connection.

#![deny(unsafe_code)]

pub mod auth;
pub mod config;
pub mod health;
pub mod routes;

pub use auth::{AuthUser, Authenticator, StaticTokenAuthenticator};
pub use config::ServerConfig;
pub use routes::{AppState, router};
