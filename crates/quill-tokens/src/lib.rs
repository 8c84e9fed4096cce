//! # quill-tokens
//!
//! Token estimation and cost accounting:
//!
//! - [`estimator`] — approximate token counts from text length
//! - [`pricing`] — per-model pricing table and cost calculation
//!
//! Both modules are pure, total functions. The estimator feeds context
//! budgeting; the pricing table converts reported usage into an estimated
//! cost for the usage ledger.

#![deny(unsafe_code)]

pub mod estimator;
pub mod pricing;

pub use estimator::{estimate_messages_tokens, estimate_tokens};
pub use pricing::{ModelPricing, calculate_cost, format_cost, get_model_pricing};
