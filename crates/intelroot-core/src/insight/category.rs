//! Category insight (trend + forecast) with read-through caching

use super::cache::{self, category_insight_ttl};
use super::{extract_executive_summary, extract_json, prompts, truncate_chars, RegenLocks};
use crate::config::InsightConfig;
use crate::db::{Artifact, Database, Document};
use crate::error::{IntelrootError, Result};
use crate::provider::{ChatMessage, GenerateRequest, ModelClient};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MAX_INPUT_CHARS: usize = 20_000;
const EXEC_SUMMARY_CHARS: usize = 500;

/// Parameters of an insight request
#[derive(Debug, Clone)]
pub struct InsightQuery {
    pub category: String,
    pub entity: Option<String>,
    /// Restrict to documents published within this many days. Windowed
    /// requests bypass the cache entirely.
    pub window_days: Option<u32>,
}

impl InsightQuery {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            entity: None,
            window_days: None,
        }
    }

    /// Canonical cache key: `category` or `category::entity`
    pub fn cache_key(&self) -> String {
        match &self.entity {
            Some(entity) => format!("{}::{}", self.category, entity),
            None => self.category.clone(),
        }
    }

    fn display_label(&self) -> String {
        match &self.entity {
            Some(entity) => format!("{} > {}", self.category, entity),
            None => self.category.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InsightResponse {
    pub trend: String,
    pub forecast: String,
    pub contributing_count: usize,
    pub model: String,
    pub cached: bool,
    pub actual_cost: f64,
    pub generated_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct InsightPayload {
    #[serde(default)]
    trend: String,
    #[serde(default)]
    forecast: String,
}

/// Serve a category insight, regenerating only when the cached entry's
/// content hash no longer matches or its TTL has lapsed.
pub async fn category_insight(
    db: &Database,
    client: &ModelClient,
    options: &InsightConfig,
    locks: &RegenLocks,
    query: &InsightQuery,
) -> Result<InsightResponse> {
    // Windowed requests are scoped queries, not canonical entries; they
    // neither read nor write the cache, so they need no key lock either.
    let use_cache = query.window_days.is_none();
    let _guard = if use_cache {
        Some(locks.acquire(&query.cache_key()).await)
    } else {
        None
    };

    let docs = db.documents_for_category(
        &query.category,
        query.entity.as_deref(),
        query.window_days,
    )?;
    if docs.len() < options.min_documents {
        return Err(IntelrootError::InsufficientData { count: docs.len() });
    }

    let current_hash = cache::combined_hash(
        docs.iter().map(|(d, a)| (d.id, a.body_text.as_str())),
    );

    if use_cache {
        if let Some(cached) = db.category_insight(&query.cache_key())? {
            if cache::is_valid(
                &cached.content_hash,
                &current_hash,
                cached.created_at,
                Some(category_insight_ttl()),
            ) {
                tracing::debug!("insight cache hit for {}", query.cache_key());
                return Ok(InsightResponse {
                    trend: cached.trend_text,
                    forecast: cached.forecast_text,
                    contributing_count: cached.contributing_count,
                    model: cached.model,
                    cached: true,
                    actual_cost: 0.0,
                    generated_at: cached.created_at,
                });
            }
        }
    }

    tracing::info!(
        "generating insight for {} ({} documents)",
        query.cache_key(),
        docs.len()
    );

    let contributors: Vec<&(Document, Artifact)> =
        docs.iter().take(options.max_contributors).collect();
    let input_text = build_input(&contributors);

    let system = prompts::TREND_FORECAST_PROMPT.replace("{category}", &query.display_label());
    let user_message = format!(
        "Category: {}\nArticle count: {}\n\n{}",
        query.display_label(),
        contributors.len(),
        input_text
    );

    let before = client.tracker().tokens();
    let completion = client
        .generate(
            GenerateRequest::new(Some(system), vec![ChatMessage::user(user_message)])
                .temperature(0.4)
                .max_tokens(2000)
                .json_mode(true),
        )
        .await?;
    let usage = client.tracker().tokens().since(before);

    let payload: InsightPayload = serde_json::from_str(extract_json(&completion.text))
        .map_err(|e| IntelrootError::MalformedResponse(format!("insight JSON: {e}")))?;

    let model = client.model_name().to_string();
    if use_cache {
        db.save_category_insight(
            &query.cache_key(),
            &payload.trend,
            &payload.forecast,
            docs.len(),
            &current_hash,
            &model,
        )?;
    }

    Ok(InsightResponse {
        trend: payload.trend,
        forecast: payload.forecast,
        contributing_count: docs.len(),
        actual_cost: usage.cost(&model),
        model,
        cached: false,
        generated_at: Utc::now(),
    })
}

/// Newest-first contributor lines: title, date, executive summary
fn build_input(contributors: &[&(Document, Artifact)]) -> String {
    let lines: Vec<String> = contributors
        .iter()
        .map(|(doc, artifact)| {
            let date = doc
                .published_at
                .map(|dt| dt.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "unknown date".to_string());
            format!(
                "- **{}** ({}): {}",
                doc.title,
                date,
                extract_executive_summary(&artifact.body_text, EXEC_SUMMARY_CHARS)
            )
        })
        .collect();

    let text = lines.join("\n");
    if text.chars().count() > MAX_INPUT_CHARS {
        format!("{}\n\n[Truncated...]", truncate_chars(&text, MAX_INPUT_CHARS))
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_shapes() {
        let plain = InsightQuery::new("ransomware");
        assert_eq!(plain.cache_key(), "ransomware");

        let mut narrowed = InsightQuery::new("ransomware");
        narrowed.entity = Some("lockbit".to_string());
        assert_eq!(narrowed.cache_key(), "ransomware::lockbit");
        assert_eq!(narrowed.display_label(), "ransomware > lockbit");
    }
}
