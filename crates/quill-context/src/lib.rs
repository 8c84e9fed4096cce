//! # quill-context
//!
//! Context assembly and input screening for the chat pipeline:
//!
//! - [`builder`] — assembles a bounded message list from persisted history
//!   under per-message and total budgets
//! - [`prompts`] — versioned system prompts
//! - [`validator`] — rejects malformed input, flags injection patterns

#![deny(unsafe_code)]

pub mod builder;
pub mod prompts;
pub mod validator;

pub use builder::{ContextOptions, ContextResult, build_context};
pub use prompts::{CURRENT_PROMPT_VERSION, resolve_system_prompt};
pub use validator::{ValidationOutcome, validate};
