//! Historical trend analysis (quarterly + yearly time series)
//!
//! Quarters are generated in chronological order so each prompt can see
//! the previous period's trend text; years chain the same way one level
//! up, consuming quarterly texts instead of raw documents. Validity is
//! hash-only: a period regenerates only when its document set changes.

use super::cache::{self, combined_hash};
use super::{extract_executive_summary, extract_json, prompts, truncate_chars, RegenLocks};
use crate::config::InsightConfig;
use crate::db::{Artifact, Database, Document};
use crate::error::{IntelrootError, Result};
use crate::insight::InsightQuery;
use crate::provider::{ChatMessage, GenerateRequest, ModelClient};
use chrono::Datelike;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const PERIOD_QUARTER: &str = "quarter";
const PERIOD_YEAR: &str = "year";

/// Prior-period trend text is capped before being chained into a prompt
const PREV_TREND_CHARS: usize = 3_000;
const QUARTERLY_SUMMARIES_CHARS: usize = 8_000;
const LINE_SUMMARY_CHARS: usize = 300;
const CONDENSE_CONCURRENCY: usize = 5;

/// One generated (or cached) period entry
#[derive(Debug, Clone, Serialize)]
pub struct PeriodEntry {
    pub period: String,
    pub contributing_count: usize,
    pub trend_text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendResponse {
    pub quarterly: Vec<PeriodEntry>,
    pub yearly: Vec<PeriodEntry>,
    pub model: String,
    pub actual_cost: f64,
}

#[derive(Deserialize)]
struct TrendPayload {
    #[serde(default)]
    trend: String,
    #[serde(default)]
    key_developments: Vec<String>,
    #[serde(default)]
    outlook: Option<String>,
}

#[derive(Deserialize)]
struct BatchPayload {
    #[serde(default)]
    trend: Option<String>,
}

/// Generate quarterly and yearly trend analyses for a category.
///
/// Windowed requests bypass the persistent cache entirely (both reads
/// and writes); everything else is cached per period with hash-only
/// validity.
pub async fn trend_analysis(
    db: &Database,
    client: &ModelClient,
    options: &InsightConfig,
    locks: &RegenLocks,
    query: &InsightQuery,
) -> Result<TrendResponse> {
    let skip_cache = query.window_days.is_some();
    let _guard = if skip_cache {
        None
    } else {
        Some(locks.acquire(&format!("trend::{}", query.cache_key())).await)
    };

    let docs = db.documents_for_category(
        &query.category,
        query.entity.as_deref(),
        query.window_days,
    )?;
    if docs.len() < options.min_documents {
        return Err(IntelrootError::InsufficientData { count: docs.len() });
    }

    let quarter_groups = group_by_quarter(&docs);
    if quarter_groups.is_empty() {
        return Err(IntelrootError::InsufficientData { count: 0 });
    }

    tracing::info!(
        "trend analysis: {} documents across {} quarters for {}",
        docs.len(),
        quarter_groups.len(),
        query.cache_key()
    );

    let before = client.tracker().tokens();
    let model = client.model_name().to_string();
    let category_key = query.cache_key();
    let category_label = match &query.entity {
        Some(entity) => format!("{} > {}", query.category, entity),
        None => query.category.clone(),
    };

    // Quarterly pass, sequential so each quarter can reference the previous
    let mut quarterly: Vec<PeriodEntry> = Vec::new();
    let mut prev_trend: Option<String> = None;

    for ((year, quarter), group) in &quarter_groups {
        let period_label = format!("{year}-Q{quarter}");
        let group_hash = combined_hash(group.iter().map(|(d, a)| (d.id, a.body_text.as_str())));

        if !skip_cache {
            if let Some(cached) = db.period_trend(&category_key, PERIOD_QUARTER, &period_label)? {
                // No TTL: a cached quarter stays valid until its documents change
                if cache::is_valid(&cached.content_hash, &group_hash, cached.created_at, None) {
                    tracing::debug!("using cached quarterly trend for {period_label}");
                    prev_trend = Some(cached.trend_text.clone());
                    quarterly.push(PeriodEntry {
                        period: period_label,
                        contributing_count: cached.contributing_count,
                        trend_text: cached.trend_text,
                    });
                    continue;
                }
            }
        }

        tracing::info!(
            "generating quarterly trend for {period_label} ({} documents)",
            group.len()
        );
        let summary_text =
            build_period_summaries(client, &category_label, group, options.trend_batch_size)
                .await?;
        let trend_text = quarterly_trend(
            client,
            &category_label,
            &period_label,
            group.len(),
            &summary_text,
            prev_trend.as_deref(),
        )
        .await?;

        if !skip_cache {
            db.save_period_trend(
                &category_key,
                PERIOD_QUARTER,
                &period_label,
                &trend_text,
                group.len(),
                &group_hash,
                &model,
            )?;
        }
        prev_trend = Some(trend_text.clone());
        quarterly.push(PeriodEntry {
            period: period_label,
            contributing_count: group.len(),
            trend_text,
        });
    }

    // Yearly pass, chained over the quarterly results
    let mut yearly: Vec<PeriodEntry> = Vec::new();
    let mut prev_year_trend: Option<String> = None;
    let years: Vec<i32> = {
        let mut seen: Vec<i32> = quarter_groups.keys().map(|(y, _)| *y).collect();
        seen.dedup();
        seen
    };

    for year in years {
        let year_prefix = format!("{year}-");
        let year_quarters: Vec<&PeriodEntry> = quarterly
            .iter()
            .filter(|q| q.period.starts_with(&year_prefix))
            .collect();
        if year_quarters.is_empty() {
            continue;
        }
        let year_total: usize = year_quarters.iter().map(|q| q.contributing_count).sum();
        let year_label = year.to_string();

        // A year's identity is the chain of its quarters' hashes
        let year_hash = if skip_cache {
            String::new()
        } else {
            let mut parts = Vec::with_capacity(year_quarters.len());
            for q in &year_quarters {
                if let Some(stored) = db.period_trend(&category_key, PERIOD_QUARTER, &q.period)? {
                    parts.push(stored.content_hash);
                }
            }
            parts.join(":")
        };

        if !skip_cache {
            if let Some(cached) = db.period_trend(&category_key, PERIOD_YEAR, &year_label)? {
                if cache::is_valid(&cached.content_hash, &year_hash, cached.created_at, None) {
                    tracing::debug!("using cached yearly trend for {year_label}");
                    prev_year_trend = Some(cached.trend_text.clone());
                    yearly.push(PeriodEntry {
                        period: year_label,
                        contributing_count: cached.contributing_count,
                        trend_text: cached.trend_text,
                    });
                    continue;
                }
            }
        }

        tracing::info!("generating yearly trend for {year_label}");
        let trend_text = yearly_trend(
            client,
            &category_label,
            year,
            &year_quarters,
            prev_year_trend.as_deref(),
        )
        .await?;

        if !skip_cache {
            db.save_period_trend(
                &category_key,
                PERIOD_YEAR,
                &year_label,
                &trend_text,
                year_total,
                &year_hash,
                &model,
            )?;
        }
        prev_year_trend = Some(trend_text.clone());
        yearly.push(PeriodEntry {
            period: year_label,
            contributing_count: year_total,
            trend_text,
        });
    }

    let usage = client.tracker().tokens().since(before);
    Ok(TrendResponse {
        quarterly,
        yearly,
        actual_cost: usage.cost(&model),
        model,
    })
}

/// (quarters, years, condensation batches) a trend run would touch
pub fn estimate_trend_shape(
    docs: &[(Document, Artifact)],
    batch_size: usize,
) -> (usize, usize, usize) {
    let groups = group_by_quarter(docs);
    let n_quarters = groups.len();
    let years: std::collections::BTreeSet<i32> = groups.keys().map(|(y, _)| *y).collect();
    let n_batches: usize = groups
        .values()
        .map(|g| {
            if g.len() > batch_size && batch_size > 0 {
                g.len().div_ceil(batch_size)
            } else {
                0
            }
        })
        .sum();
    (n_quarters, years.len(), n_batches)
}

/// Group documents into (year, quarter) buckets, chronologically sorted.
/// Documents without a published date cannot be placed and are skipped.
fn group_by_quarter(docs: &[(Document, Artifact)]) -> BTreeMap<(i32, u32), Vec<(Document, Artifact)>> {
    let mut groups: BTreeMap<(i32, u32), Vec<(Document, Artifact)>> = BTreeMap::new();
    for (doc, artifact) in docs {
        let Some(published) = doc.published_at else {
            continue;
        };
        let quarter = (published.month() - 1) / 3 + 1;
        groups
            .entry((published.year(), quarter))
            .or_default()
            .push((doc.clone(), artifact.clone()));
    }
    groups
}

fn format_line(doc: &Document, artifact: &Artifact) -> String {
    let date = doc
        .published_at
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "unknown date".to_string());
    format!(
        "- **{}** ({}): {}",
        doc.title,
        date,
        extract_executive_summary(&artifact.body_text, LINE_SUMMARY_CHARS)
    )
}

/// Build the per-period summary block. Oversized periods are condensed
/// in fixed-size batches first so the period prompt stays bounded no
/// matter how large the corpus grows.
async fn build_period_summaries(
    client: &ModelClient,
    category: &str,
    docs: &[(Document, Artifact)],
    batch_size: usize,
) -> Result<String> {
    if batch_size == 0 || docs.len() <= batch_size {
        return Ok(docs
            .iter()
            .map(|(d, a)| format_line(d, a))
            .collect::<Vec<_>>()
            .join("\n"));
    }

    let batch_texts: Vec<String> = docs
        .chunks(batch_size)
        .map(|batch| {
            batch
                .iter()
                .map(|(d, a)| format_line(d, a))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect();

    let batch_count = batch_texts.len();
    let results: Vec<(usize, Option<String>)> = stream::iter(batch_texts.into_iter().enumerate())
        .map(|(idx, text)| async move {
            (idx, condense_batch(client, category, &text).await)
        })
        .buffer_unordered(CONDENSE_CONCURRENCY)
        .collect()
        .await;

    let mut sorted = results;
    sorted.sort_by_key(|(idx, _)| *idx);

    let condensed: Vec<String> = sorted
        .into_iter()
        .map(|(idx, result)| {
            result.unwrap_or_else(|| {
                format!("Batch {}/{batch_count}: summary unavailable", idx + 1)
            })
        })
        .collect();

    Ok(condensed.join("\n\n---\n\n"))
}

/// Condense one batch via the provider. A failed batch degrades to a
/// placeholder rather than aborting the period.
async fn condense_batch(client: &ModelClient, category: &str, batch_text: &str) -> Option<String> {
    let system = prompts::BATCH_SUMMARY_PROMPT.replace("{category}", category);
    let result = client
        .generate(
            GenerateRequest::new(Some(system), vec![ChatMessage::user(batch_text.to_string())])
                .temperature(0.3)
                .max_tokens(1500)
                .json_mode(true),
        )
        .await;

    match result {
        Ok(completion) => serde_json::from_str::<BatchPayload>(extract_json(&completion.text))
            .ok()
            .and_then(|p| p.trend),
        Err(e) => {
            tracing::error!("batch condensation failed: {e}");
            None
        }
    }
}

async fn quarterly_trend(
    client: &ModelClient,
    category: &str,
    period_label: &str,
    count: usize,
    summary_text: &str,
    prev_trend: Option<&str>,
) -> Result<String> {
    let system = match prev_trend {
        Some(prev) => prompts::QUARTERLY_TREND_SUBSEQUENT_PROMPT
            .replace("{category}", category)
            .replace("{period}", period_label)
            .replace("{count}", &count.to_string())
            .replace("{prev_trend}", &truncate_chars(prev, PREV_TREND_CHARS)),
        None => prompts::QUARTERLY_TREND_FIRST_PROMPT
            .replace("{category}", category)
            .replace("{period}", period_label)
            .replace("{count}", &count.to_string()),
    };

    let user_message = format!(
        "Category: {category}\nPeriod: {period_label}\nArticle count: {count}\n\n{summary_text}"
    );

    let completion = client
        .generate(
            GenerateRequest::new(Some(system), vec![ChatMessage::user(user_message)])
                .temperature(0.4)
                .max_tokens(2500)
                .json_mode(true),
        )
        .await?;

    let payload: TrendPayload = serde_json::from_str(extract_json(&completion.text))
        .map_err(|e| IntelrootError::MalformedResponse(format!("quarterly trend JSON: {e}")))?;
    Ok(format_trend_result(payload))
}

async fn yearly_trend(
    client: &ModelClient,
    category: &str,
    year: i32,
    quarters: &[&PeriodEntry],
    prev_year_trend: Option<&str>,
) -> Result<String> {
    let quarterly_summaries = quarters
        .iter()
        .map(|q| {
            format!(
                "### {} ({} articles)\n{}",
                q.period, q.contributing_count, q.trend_text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    let quarterly_summaries = truncate_chars(&quarterly_summaries, QUARTERLY_SUMMARIES_CHARS);

    let system = match prev_year_trend {
        Some(prev) => prompts::YEARLY_TREND_SUBSEQUENT_PROMPT
            .replace("{category}", category)
            .replace("{year}", &year.to_string())
            .replace("{quarterly_summaries}", &quarterly_summaries)
            .replace("{prev_trend}", &truncate_chars(prev, PREV_TREND_CHARS)),
        None => prompts::YEARLY_TREND_FIRST_PROMPT
            .replace("{category}", category)
            .replace("{year}", &year.to_string())
            .replace("{quarterly_summaries}", &quarterly_summaries),
    };

    let user_message = format!(
        "Category: {category}\nYear: {year}\nQuarters covered: {}",
        quarters.len()
    );

    let completion = client
        .generate(
            GenerateRequest::new(Some(system), vec![ChatMessage::user(user_message)])
                .temperature(0.4)
                .max_tokens(3000)
                .json_mode(true),
        )
        .await?;

    let payload: TrendPayload = serde_json::from_str(extract_json(&completion.text))
        .map_err(|e| IntelrootError::MalformedResponse(format!("yearly trend JSON: {e}")))?;
    Ok(format_trend_result(payload))
}

/// Render the structured payload into a single markdown block
fn format_trend_result(payload: TrendPayload) -> String {
    let mut parts = vec![payload.trend.trim().to_string()];
    if !payload.key_developments.is_empty() {
        parts.push("\n**Key Developments:**".to_string());
        parts.extend(payload.key_developments.iter().map(|d| format!("- {d}")));
    }
    if let Some(outlook) = payload.outlook.as_deref().map(str::trim) {
        if !outlook.is_empty() {
            parts.push("\n**Outlook:**".to_string());
            parts.push(outlook.to_string());
        }
    }
    parts.join("\n").trim().to_string()
}
