//! Staged pipeline orchestrator
//!
//! fetch -> scrape -> cost_gate -> summarize -> notify -> embed, under a
//! single-flight lock. Stages are idempotent: each one selects only the
//! documents still lacking what it produces, so re-running after a
//! partial run or crash never duplicates work. Cancellation is
//! cooperative, checked at stage and batch-item boundaries.

use super::notify::StatusSink;
use super::scraper::Scraper;
use super::sources::{is_file_url, DocumentSource};
use super::state::{GateDecision, PipelineHandle, Stage};
use crate::config::Config;
use crate::cost;
use crate::db::Database;
use crate::error::{IntelrootError, Result};
use crate::insight::prompts::SUMMARY_PROMPT;
use crate::insight::{extract_json, truncate_chars};
use crate::provider::{ChatMessage, GenerateRequest, ModelClient};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Raw text larger than this is truncated before summarization
const MAX_CONTENT_CHARS: usize = 12_000;

/// Documents selected per scrape round
const SCRAPE_BATCH: usize = 20;

/// What a trigger call starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineMode {
    /// fetch -> scrape -> cost_gate -> summarize -> notify -> embed
    Full,
    /// embed only
    EmbedOnly,
    /// scrape -> cost_gate -> summarize -> embed, for documents
    /// ingested by an external collaborator
    ProcessPending,
}

impl std::str::FromStr for PipelineMode {
    type Err = IntelrootError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "full" => Ok(Self::Full),
            "embed_only" => Ok(Self::EmbedOnly),
            "process_pending" => Ok(Self::ProcessPending),
            other => Err(IntelrootError::Config(format!("unknown mode: {other}"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineParams {
    pub lookback_days: u32,
    pub since_last_fetch: bool,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            lookback_days: 1,
            since_last_fetch: false,
        }
    }
}

impl PipelineParams {
    /// Clamp lookback to a sane window
    pub fn clamped(mut self) -> Self {
        self.lookback_days = self.lookback_days.clamp(1, 365);
        self
    }
}

/// Immediate response to a trigger call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Started,
    AlreadyRunning,
}

#[derive(Clone)]
pub struct Orchestrator {
    db_path: PathBuf,
    config: Config,
    client: ModelClient,
    sources: Vec<Arc<dyn DocumentSource>>,
    scraper: Arc<dyn Scraper>,
    sink: Arc<dyn StatusSink>,
    handle: PipelineHandle,
}

#[derive(Deserialize)]
struct SummaryPayload {
    #[serde(default)]
    executive_summary: String,
    #[serde(default)]
    novelty: String,
    #[serde(default)]
    details: Vec<String>,
    #[serde(default)]
    mitigations: Vec<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    attack_flow: Option<serde_json::Value>,
}

struct DocumentAnalysis {
    body_text: String,
    tags: Vec<String>,
    phases: Option<serde_json::Value>,
    novelty: Option<String>,
}

impl Orchestrator {
    pub fn new(
        db_path: PathBuf,
        config: Config,
        client: ModelClient,
        scraper: Arc<dyn Scraper>,
        sink: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            db_path,
            config,
            client,
            sources: Vec::new(),
            scraper,
            sink,
            handle: PipelineHandle::new(),
        }
    }

    pub fn with_source(mut self, source: Arc<dyn DocumentSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Shared state handle for status polls, aborts, and gate decisions
    pub fn handle(&self) -> PipelineHandle {
        self.handle.clone()
    }

    /// Start a pipeline run on a background task. Non-blocking: when
    /// another run holds the lock this returns `AlreadyRunning`
    /// immediately, with no retry and no queueing.
    pub fn trigger(&self, mode: PipelineMode, params: PipelineParams) -> TriggerOutcome {
        if !self.handle.try_acquire() {
            tracing::info!("pipeline already in progress, skipping trigger");
            return TriggerOutcome::AlreadyRunning;
        }

        let orchestrator = self.clone();
        let params = params.clamped();
        tokio::spawn(async move {
            orchestrator.run(mode, params).await;
        });
        TriggerOutcome::Started
    }

    /// Run the stage machine to completion on the current task. The
    /// caller must already hold the lock via `try_acquire`.
    async fn run(self, mode: PipelineMode, params: PipelineParams) {
        tracing::info!("pipeline run starting (mode {mode:?})");
        match self.execute(mode, &params).await {
            Ok(()) => {
                tracing::info!("pipeline run finished: {}", self.handle.stage());
            }
            Err(e) => {
                tracing::error!("pipeline run failed: {e}");
                self.handle.set_error(e.to_string());
                self.sink.stage_changed(Stage::Error);
            }
        }
        self.handle.release();
    }

    async fn execute(&self, mode: PipelineMode, params: &PipelineParams) -> Result<()> {
        // This run owns its connection; initialize is idempotent and sets
        // the per-connection PRAGMAs (WAL, busy_timeout)
        let mut db = Database::open(&self.db_path)?;
        db.initialize()?;
        let baseline = self.client.tracker().tokens();

        if mode == PipelineMode::Full {
            self.transition(Stage::Fetch);
            self.fetch_stage(&mut db, params).await?;
            if self.handle.abort_requested() {
                return self.finish_aborted();
            }
        }

        if matches!(mode, PipelineMode::Full | PipelineMode::ProcessPending) {
            self.transition(Stage::Scrape);
            self.scrape_stage(&mut db).await?;
            if self.handle.abort_requested() {
                return self.finish_aborted();
            }

            let decision = self.cost_gate_stage(&mut db).await?;
            if decision == GateDecision::Declined || self.handle.abort_requested() {
                tracing::info!("cost gate declined or timed out, aborting before summarize");
                return self.finish_aborted();
            }

            self.transition(Stage::Summarize);
            let created = self.summarize_stage(&mut db).await?;

            let usage = self.client.tracker().tokens().since(baseline);
            self.handle
                .set_actual_cost(Some(usage.cost(self.client.model_name())));

            if self.handle.abort_requested() {
                return self.finish_aborted();
            }

            if mode == PipelineMode::Full {
                self.transition(Stage::Notify);
                self.notify_stage(&db, &created)?;
                if self.handle.abort_requested() {
                    return self.finish_aborted();
                }
            }
        }

        self.transition(Stage::Embed);
        self.embed_stage(&mut db).await?;
        if self.handle.abort_requested() {
            return self.finish_aborted();
        }

        self.transition(Stage::Done);
        Ok(())
    }

    fn transition(&self, stage: Stage) {
        self.handle.set_stage(stage);
        self.sink.stage_changed(stage);
    }

    /// Completed stages stay committed; nothing is rolled back
    fn finish_aborted(&self) -> Result<()> {
        self.transition(Stage::Aborted);
        Ok(())
    }

    /// Pull new documents from every injected source. A failing source
    /// is logged and skipped; it must not sink the whole fetch.
    async fn fetch_stage(&self, db: &mut Database, params: &PipelineParams) -> Result<()> {
        let deleted = db.delete_file_url_documents()?;
        if deleted > 0 {
            tracing::info!("cleaned up {deleted} file-URL documents");
        }

        let mut inserted = 0usize;
        for source in &self.sources {
            let source_id = db.upsert_source(source.name(), source.url(), true)?;
            let since = if params.since_last_fetch {
                db.source_last_fetched(source_id)?
            } else {
                None
            };

            let batch = match source.fetch(since, params.lookback_days).await {
                Ok(batch) => batch,
                Err(e) => {
                    tracing::error!("source {} failed: {e}", source.name());
                    continue;
                }
            };

            for doc in batch {
                if is_file_url(&doc.url) {
                    continue;
                }
                if db
                    .insert_document(
                        Some(source_id),
                        &doc.title,
                        &doc.url,
                        doc.published_at,
                        doc.raw_text.as_deref(),
                    )?
                    .is_some()
                {
                    inserted += 1;
                }
            }
            db.touch_source(source_id)?;
        }

        tracing::info!("fetched {inserted} new documents");
        Ok(())
    }

    /// Fill raw_text for unscraped documents. Work fans out to a bounded
    /// pool with a hard per-item timeout; results commit in selection
    /// order. Failures store the empty sentinel so the document is never
    /// retried indefinitely.
    async fn scrape_stage(&self, db: &mut Database) -> Result<()> {
        let concurrency = self.config.pipeline.scrape_concurrency.max(1);
        let per_item_timeout = Duration::from_secs(self.config.pipeline.scrape_timeout_secs);
        let mut scraped = 0usize;
        let mut failed = 0usize;

        loop {
            if self.handle.abort_requested() {
                break;
            }
            let batch = db.unscraped_documents(SCRAPE_BATCH)?;
            if batch.is_empty() {
                break;
            }

            let scrape_items: Vec<(usize, String)> = batch
                .iter()
                .enumerate()
                .map(|(idx, doc)| (idx, doc.url.clone()))
                .collect();
            let mut results: Vec<(usize, Result<String>)> =
                stream::iter(scrape_items)
                    .map(|(idx, url)| {
                        let scraper = Arc::clone(&self.scraper);
                        async move {
                            let result =
                                match tokio::time::timeout(per_item_timeout, scraper.scrape(&url))
                                    .await
                                {
                                    Ok(inner) => inner,
                                    Err(_) => Err(IntelrootError::Scrape(format!(
                                        "timed out after {}s: {url}",
                                        per_item_timeout.as_secs()
                                    ))),
                                };
                            (idx, result)
                        }
                    })
                    .buffer_unordered(concurrency)
                    .collect()
                    .await;
            results.sort_by_key(|(idx, _)| *idx);

            for (idx, result) in results {
                let doc = &batch[idx];
                match result {
                    Ok(text) => {
                        db.update_raw_text(doc.id, &text)?;
                        scraped += 1;
                    }
                    Err(e) => {
                        tracing::warn!("scrape failed for document {}: {e}", doc.id);
                        // empty sentinel: permanent failure, skip on future runs
                        db.update_raw_text(doc.id, "")?;
                        failed += 1;
                    }
                }
            }
        }

        tracing::info!("scraped {scraped} documents ({failed} failed)");
        Ok(())
    }

    /// Publish an estimate and block until it is approved, declined, or
    /// the gate times out. Declines cost nothing: no summarization call
    /// has been made yet.
    async fn cost_gate_stage(&self, db: &mut Database) -> Result<GateDecision> {
        let pending = db.unsummarized_count()?;
        if pending == 0 {
            self.handle.set_cost_estimate(None);
            return Ok(GateDecision::Approved);
        }

        let estimate = cost::estimate_summarize_cost(pending, self.client.model_name());
        self.handle.set_cost_estimate(Some(estimate));
        self.transition(Stage::CostGate);
        tracing::info!("cost gate: {pending} documents pending, estimate ${estimate:.4}");

        let timeout = Duration::from_secs(self.config.pipeline.cost_gate_timeout_secs);
        Ok(self.handle.wait_for_gate(timeout).await)
    }

    /// Summarize pending documents strictly sequentially so provider
    /// calls stay rate-budgeted and attributed one at a time. A failing
    /// document gets the failed sentinel and the batch moves on.
    async fn summarize_stage(&self, db: &mut Database) -> Result<Vec<i64>> {
        let mut created = Vec::new();
        let mut failed = 0usize;

        'outer: loop {
            let batch = db.unsummarized_documents(self.config.pipeline.summarize_batch.max(1))?;
            if batch.is_empty() {
                break;
            }

            for doc in batch {
                if self.handle.abort_requested() {
                    break 'outer;
                }

                tracing::info!("summarizing document {}: {}", doc.id, doc.title);
                let content = doc.raw_text.as_deref().unwrap_or("");
                match self.summarize_document(&doc.title, content).await {
                    Ok(analysis) => {
                        db.save_artifact(
                            doc.id,
                            &analysis.body_text,
                            &analysis.tags,
                            analysis.phases.as_ref(),
                            analysis.novelty.as_deref(),
                            self.client.model_name(),
                        )?;
                        created.push(doc.id);
                    }
                    Err(e) => {
                        tracing::warn!("summarization failed for document {}: {e}", doc.id);
                        db.save_failed_artifact(doc.id)?;
                        failed += 1;
                    }
                }
            }
        }

        tracing::info!("summarized {} documents ({failed} failed)", created.len());
        Ok(created)
    }

    async fn summarize_document(&self, title: &str, content: &str) -> Result<DocumentAnalysis> {
        let truncated = content.chars().count() > MAX_CONTENT_CHARS;
        let mut content = truncate_chars(content, MAX_CONTENT_CHARS);
        if truncated {
            content.push_str("\n\n[Content truncated...]");
        }

        let user_message = format!("Title: {title}\n\nArticle Content:\n{content}");
        let completion = self
            .client
            .generate(
                GenerateRequest::new(
                    Some(SUMMARY_PROMPT.to_string()),
                    vec![ChatMessage::user(user_message)],
                )
                .temperature(0.3)
                .max_tokens(2500)
                .json_mode(true),
            )
            .await?;

        let payload: SummaryPayload = serde_json::from_str(extract_json(&completion.text))
            .map_err(|e| IntelrootError::MalformedResponse(format!("summary JSON: {e}")))?;

        let novelty = (!payload.novelty.trim().is_empty()).then(|| payload.novelty.clone());
        let body_text = compose_markdown(&payload);
        let phases = payload.attack_flow.filter(|v| match v {
            serde_json::Value::Array(steps) => !steps.is_empty(),
            _ => false,
        });

        Ok(DocumentAnalysis {
            body_text,
            tags: payload.tags,
            phases,
            novelty,
        })
    }

    /// Publish artifact-created events for this run. Sink trouble is the
    /// collaborator's problem, not the pipeline's.
    fn notify_stage(&self, db: &Database, created: &[i64]) -> Result<()> {
        for id in created {
            if self.handle.abort_requested() {
                break;
            }
            let (Some(doc), Some(artifact)) = (db.document(*id)?, db.artifact(*id)?) else {
                continue;
            };
            self.sink.artifact_created(&doc, &artifact);
        }
        Ok(())
    }

    /// Embed artifacts that still lack vectors, in batches. A failing
    /// batch falls back to per-document calls so one bad document never
    /// aborts the rest; documents that still fail stay pending for the
    /// next run.
    async fn embed_stage(&self, db: &mut Database) -> Result<()> {
        let model = self.client.embedding_model().to_string();
        let mut skip: HashSet<i64> = HashSet::new();
        let mut embedded = 0usize;

        loop {
            if self.handle.abort_requested() {
                break;
            }
            let mut batch = db.unembedded_documents(self.config.pipeline.embed_batch.max(1))?;
            batch.retain(|(doc, _)| !skip.contains(&doc.id));
            if batch.is_empty() {
                break;
            }

            let texts: Vec<String> = batch
                .iter()
                .map(|(doc, body)| format!("{}\n{}", doc.title, body))
                .collect();

            match self.client.embed_batch(&texts).await {
                Ok(vectors) => {
                    for ((doc, _), vector) in batch.iter().zip(vectors.iter()) {
                        db.save_embedding(doc.id, vector, &model)?;
                        embedded += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!("batch embedding failed, retrying per document: {e}");
                    for ((doc, _), text) in batch.iter().zip(texts.iter()) {
                        if self.handle.abort_requested() {
                            break;
                        }
                        match self.client.embed(text).await {
                            Ok(vector) => {
                                db.save_embedding(doc.id, &vector, &model)?;
                                embedded += 1;
                            }
                            Err(e) => {
                                tracing::warn!(
                                    "embedding failed for document {}, leaving pending: {e}",
                                    doc.id
                                );
                                skip.insert(doc.id);
                            }
                        }
                    }
                }
            }
        }

        tracing::info!("embedded {embedded} documents");
        Ok(())
    }
}

/// Render structured analysis into the artifact's markdown body
fn compose_markdown(payload: &SummaryPayload) -> String {
    let mut sections = Vec::new();

    sections.push("# Executive Summary".to_string());
    if payload.executive_summary.is_empty() {
        sections.push("No summary available.".to_string());
    } else {
        sections.push(payload.executive_summary.clone());
    }
    sections.push(String::new());

    sections.push("# Novelty about reported threat actor tactics, techniques, and tooling".to_string());
    if payload.novelty.is_empty() {
        sections.push("Nothing particularly novel reported.".to_string());
    } else {
        sections.push(payload.novelty.clone());
    }
    sections.push(String::new());

    sections.push("# Details".to_string());
    for point in &payload.details {
        sections.push(format!("- {point}"));
    }
    sections.push(String::new());

    sections.push("# Mitigations".to_string());
    for point in &payload.mitigations {
        sections.push(format!("- {point}"));
    }

    sections.join("\n")
}
