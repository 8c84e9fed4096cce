//! Model pricing table and cost calculation.
//!
//! Prices are USD per 1K tokens, split by input and output. Unknown models
//! fall back to the default model's pricing rather than failing — the
//! ledger must always produce a number.

use quill_core::constants::DEFAULT_MODEL;

/// Per-1K-token pricing for one model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModelPricing {
    /// USD per 1K input tokens.
    pub input_per_k: f64,
    /// USD per 1K output tokens.
    pub output_per_k: f64,
}

/// Look up pricing for a model identifier.
///
/// Exact match against the table, falling back to [`DEFAULT_MODEL`] pricing
/// for unrecognized models.
#[must_use]
pub fn get_model_pricing(model: &str) -> ModelPricing {
    exact_match(model).unwrap_or_else(|| {
        exact_match(DEFAULT_MODEL).unwrap_or(ModelPricing {
            input_per_k: 0.0004,
            output_per_k: 0.0016,
        })
    })
}

fn exact_match(model: &str) -> Option<ModelPricing> {
    let pricing = match model {
        "gpt-4.1" => ModelPricing {
            input_per_k: 0.002,
            output_per_k: 0.008,
        },
        "gpt-4.1-mini" => ModelPricing {
            input_per_k: 0.0004,
            output_per_k: 0.0016,
        },
        "gpt-4.1-nano" => ModelPricing {
            input_per_k: 0.0001,
            output_per_k: 0.0004,
        },
        "gpt-4o" => ModelPricing {
            input_per_k: 0.0025,
            output_per_k: 0.01,
        },
        "gpt-4o-mini" => ModelPricing {
            input_per_k: 0.000_15,
            output_per_k: 0.0006,
        },
        _ => return None,
    };
    Some(pricing)
}

/// Calculate the estimated cost of a completed call, in USD.
///
/// `input_tokens / 1000 * input_price + output_tokens / 1000 * output_price`,
/// rounded to 6 decimal places. Total function — never fails.
#[must_use]
#[allow(clippy::cast_precision_loss)] // Token counts never approach 2^52
pub fn calculate_cost(model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
    let pricing = get_model_pricing(model);
    let cost = input_tokens as f64 / 1000.0 * pricing.input_per_k
        + output_tokens as f64 / 1000.0 * pricing.output_per_k;
    (cost * 1_000_000.0).round() / 1_000_000.0
}

/// Format a cost value for display.
///
/// Uses 6 decimal places for values under a cent, 2 otherwise.
#[must_use]
pub fn format_cost(cost: f64) -> String {
    if cost < 0.01 {
        format!("${cost:.6}")
    } else {
        format!("${cost:.2}")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
