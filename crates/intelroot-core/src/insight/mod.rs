//! Insight generation and the derived-artifact cache
//!
//! Two cached artifact classes share one validity primitive (`cache`):
//! category insights carry a 24h TTL on top of hash validity, period
//! trends are hash-only. Time-windowed requests are always computed
//! fresh and never persisted.

pub mod cache;
mod category;
mod periods;
pub mod prompts;

pub use category::{category_insight, InsightQuery, InsightResponse};
pub use periods::{estimate_trend_shape, trend_analysis, PeriodEntry, TrendResponse};

use crate::cost;
use crate::db::Database;
use crate::error::Result;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Serializes regeneration per cache key: readers may observe a stale
/// entry mid-regeneration, but two regenerations must never race to
/// write the same key.
#[derive(Default, Clone)]
pub struct RegenLocks {
    inner: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl RegenLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn acquire(&self, key: &str) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap();
            map.entry(key.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

lazy_static! {
    static ref EXEC_SUMMARY_RE: Regex =
        Regex::new(r"(?mi)^#\s*Executive Summary\s*$").expect("static regex");
}

/// Pull the executive-summary section out of an artifact body, falling
/// back to the leading `max_chars` of the body.
pub(crate) fn extract_executive_summary(body: &str, max_chars: usize) -> String {
    let section = EXEC_SUMMARY_RE.find(body).map(|m| {
        let rest = &body[m.end()..];
        match rest.find("\n#") {
            Some(end) => rest[..end].trim(),
            None => rest.trim(),
        }
    });
    let text = section.unwrap_or(body);
    truncate_chars(text, max_chars)
}

/// Truncate on a char boundary without splitting codepoints
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}

/// Pull the outermost JSON object out of a model response, tolerating
/// markdown fences or stray prose around it.
pub(crate) fn extract_json(response: &str) -> &str {
    match (response.find('{'), response.rfind('}')) {
        (Some(start), Some(end)) if end >= start => &response[start..=end],
        _ => response,
    }
}

/// What a pre-flight estimate covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimateKind {
    Insight,
    Trend,
}

/// Pre-flight cost estimate for an insight or trend request
#[derive(Debug, Clone, Serialize)]
pub struct Estimate {
    pub contributing_count: usize,
    pub estimated_cost: f64,
    pub model: String,
    /// (quarters, years) for trend estimates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub periods: Option<(usize, usize)>,
}

/// Estimate the cost of an insight or trend request without making any
/// provider calls.
pub fn estimate(
    db: &Database,
    model: &str,
    kind: EstimateKind,
    category: &str,
    entity: Option<&str>,
    window_days: Option<u32>,
    trend_batch_size: usize,
) -> Result<Estimate> {
    let docs = db.documents_for_category(category, entity, window_days)?;
    match kind {
        EstimateKind::Insight => Ok(Estimate {
            contributing_count: docs.len(),
            estimated_cost: cost::estimate_insight_cost(docs.len(), model),
            model: model.to_string(),
            periods: None,
        }),
        EstimateKind::Trend => {
            let (n_quarters, n_years, n_batches) = estimate_trend_shape(&docs, trend_batch_size);
            Ok(Estimate {
                contributing_count: docs.len(),
                estimated_cost: cost::estimate_trend_cost(n_quarters, n_years, n_batches, model),
                model: model.to_string(),
                periods: Some((n_quarters, n_years)),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_executive_summary_section() {
        let body = "# Executive Summary\nA short summary.\nMore of it.\n\n# Details\n- point";
        let extracted = extract_executive_summary(body, 300);
        assert_eq!(extracted, "A short summary.\nMore of it.");
    }

    #[test]
    fn test_extract_executive_summary_fallback() {
        let body = "No sections here, just prose that runs on.";
        let extracted = extract_executive_summary(body, 10);
        assert_eq!(extracted, "No section");
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        let text = "日本語テキスト";
        assert_eq!(truncate_chars(text, 3), "日本語");
        assert_eq!(truncate_chars("short", 100), "short");
    }

    #[test]
    fn test_extract_json_strips_fences() {
        let wrapped = "```json\n{\"trend\": \"up\"}\n```";
        assert_eq!(extract_json(wrapped), "{\"trend\": \"up\"}");
        assert_eq!(extract_json("no json"), "no json");
    }
}
