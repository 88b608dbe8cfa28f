//! Session-scoped LLM cost tracking with per-model pricing

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Pricing per 1M tokens: (input, output)
const PRICING: &[(&str, (f64, f64))] = &[
    ("gpt-4o-mini", (0.15, 0.60)),
    ("gpt-4o", (2.50, 10.00)),
    ("gpt-4-turbo", (10.00, 30.00)),
    ("gpt-3.5-turbo", (0.50, 1.50)),
    ("claude-3-5-haiku", (0.80, 4.00)),
    ("claude-sonnet", (3.00, 15.00)),
    ("claude-opus", (15.00, 75.00)),
];

/// Conservative fallback for unknown models
const FALLBACK_PRICING: (f64, f64) = (1.00, 3.00);

/// Return (input_price, output_price) per 1M tokens for a model.
/// Matches by substring so versioned model ids resolve to their family.
pub fn lookup_pricing(model: &str) -> (f64, f64) {
    let m = model.to_lowercase();
    PRICING
        .iter()
        .find(|(key, _)| m.contains(key))
        .map(|(_, prices)| *prices)
        .unwrap_or(FALLBACK_PRICING)
}

/// Token counts for a single call or an accumulated session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    /// Monetary cost of this usage at the given model's prices
    pub fn cost(&self, model: &str) -> f64 {
        let (inp, out) = lookup_pricing(model);
        (self.input_tokens as f64 * inp + self.output_tokens as f64 * out) / 1_000_000.0
    }

    /// Usage delta since an earlier snapshot
    pub fn since(&self, earlier: TokenUsage) -> TokenUsage {
        TokenUsage {
            input_tokens: self.input_tokens.saturating_sub(earlier.input_tokens),
            output_tokens: self.output_tokens.saturating_sub(earlier.output_tokens),
        }
    }
}

/// Accumulates token usage across a session. Not persisted across restarts.
#[derive(Debug, Default)]
pub struct CostTracker {
    totals: Mutex<TokenUsage>,
}

impl CostTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record token usage from one successful provider call
    pub fn add(&self, usage: TokenUsage) {
        let mut totals = self.totals.lock().unwrap();
        totals.input_tokens += usage.input_tokens;
        totals.output_tokens += usage.output_tokens;
    }

    pub fn reset(&self) {
        *self.totals.lock().unwrap() = TokenUsage::default();
    }

    /// Snapshot of the session totals
    pub fn tokens(&self) -> TokenUsage {
        *self.totals.lock().unwrap()
    }

    /// Accumulated session cost at the given model's prices
    pub fn session_cost(&self, model: &str) -> f64 {
        self.tokens().cost(model)
    }
}

/// Estimate the cost of summarizing a batch of documents.
/// Assumes ~4000 input / ~500 output tokens per document, doubled so the
/// figure shown at the cost gate anchors high rather than low.
pub fn estimate_summarize_cost(document_count: usize, model: &str) -> f64 {
    let (inp, out) = lookup_pricing(model);
    let raw = document_count as f64 * (4000.0 * inp + 500.0 * out) / 1_000_000.0;
    raw * 2.0
}

/// Estimate the cost of a single category insight (trend + forecast) call
pub fn estimate_insight_cost(document_count: usize, model: &str) -> f64 {
    let (inp, out) = lookup_pricing(model);
    // ~200 input tokens per document, capped, plus system prompt overhead
    let estimated_input = (document_count * 200).min(5000) + 200;
    (estimated_input as f64 * inp + 2000.0 * out) / 1_000_000.0
}

/// Estimate the cost of a full historical trend run given its period shape
pub fn estimate_trend_cost(
    n_quarters: usize,
    n_years: usize,
    n_batches: usize,
    model: &str,
) -> f64 {
    let (inp, out) = lookup_pricing(model);
    let total_input = n_quarters * 3000 + n_years * 8000 + n_batches * 15000;
    let total_output = n_quarters * 2500 + n_years * 3000 + n_batches * 1500;
    (total_input as f64 * inp + total_output as f64 * out) / 1_000_000.0
}
