//! Shared test doubles: scripted provider, scraper, source, and sink
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use intelroot_core::{
    Completion, CostTracker, Database, DocumentSource, GenerateRequest, ModelClient, NewDocument,
    Provider, RetryPolicy, Scraper, Stage, StatusSink, TokenUsage,
};
use intelroot_core::error::Result;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub type GenerateFn = dyn Fn(&GenerateRequest) -> Result<Completion> + Send + Sync;

/// Provider driven by a closure; records every generate request
pub struct MockProvider {
    pub on_generate: Box<GenerateFn>,
    pub generate_calls: AtomicUsize,
    pub requests: Mutex<Vec<GenerateRequest>>,
    pub embed_dims: usize,
}

impl MockProvider {
    pub fn new(on_generate: Box<GenerateFn>) -> Self {
        Self {
            on_generate,
            generate_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            embed_dims: 4,
        }
    }

    /// Provider that answers every generate call with the same JSON
    pub fn fixed_json(json: &str) -> Self {
        let json = json.to_string();
        Self::new(Box::new(move |_req| {
            Ok(Completion {
                text: json.clone(),
                usage: TokenUsage::new(1000, 500),
            })
        }))
    }

    pub fn calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn generate(&self, request: GenerateRequest) -> Result<Completion> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        (self.on_generate)(&request)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![0.1; self.embed_dims]).collect())
    }

    fn model_name(&self) -> &str {
        "gpt-4o-mini"
    }

    fn embedding_model(&self) -> &str {
        "test-embed"
    }

    fn dimensions(&self) -> usize {
        self.embed_dims
    }
}

pub fn client_for(provider: Arc<MockProvider>) -> ModelClient {
    client_for_provider(provider)
}

pub fn client_for_provider(provider: Arc<dyn Provider>) -> ModelClient {
    ModelClient::new(
        provider,
        Arc::new(CostTracker::new()),
        RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        },
    )
}

/// Scraper returning fixed text after an optional delay
pub struct MockScraper {
    pub delay: Duration,
    pub calls: AtomicUsize,
}

impl MockScraper {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Scraper for MockScraper {
    async fn scrape(&self, url: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(format!("scraped content of {url}"))
    }
}

/// Source serving a fixed batch of documents
pub struct MockSource {
    pub docs: Vec<NewDocument>,
}

#[async_trait]
impl DocumentSource for MockSource {
    fn name(&self) -> &str {
        "mock-source"
    }

    fn url(&self) -> &str {
        "test://mock-source"
    }

    async fn fetch(
        &self,
        _since: Option<DateTime<Utc>>,
        _lookback_days: u32,
    ) -> Result<Vec<NewDocument>> {
        Ok(self.docs.clone())
    }
}

/// Sink recording every stage transition
#[derive(Default)]
pub struct RecordingSink {
    pub stages: Mutex<Vec<Stage>>,
}

impl StatusSink for RecordingSink {
    fn stage_changed(&self, stage: Stage) {
        self.stages.lock().unwrap().push(stage);
    }

    fn artifact_created(&self, _document: &intelroot_core::Document, _artifact: &intelroot_core::Artifact) {}
}

impl RecordingSink {
    pub fn saw(&self, stage: Stage) -> bool {
        self.stages.lock().unwrap().contains(&stage)
    }
}

/// Valid structured-analysis JSON the summarize stage can parse
pub const SUMMARY_JSON: &str = r#"{
    "executive_summary": "A new campaign was observed.",
    "novelty": "Novel loader chain.",
    "details": ["detail one", "detail two"],
    "mitigations": ["patch affected systems"],
    "tags": ["malware", "lockbit"],
    "attack_flow": []
}"#;

/// File-backed test database (separate handles must see shared state)
pub fn temp_db(dir: &tempfile::TempDir) -> (PathBuf, Database) {
    let path = dir.path().join("test.sqlite");
    let db = Database::open(&path).unwrap();
    db.initialize().unwrap();
    (path, db)
}

/// Poll until the handle reports the wanted stage
pub async fn wait_for_stage(
    handle: &intelroot_core::PipelineHandle,
    stage: Stage,
    timeout: Duration,
) {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if handle.stage() == stage {
            return;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for stage {stage}, at {}", handle.stage());
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Poll until the run releases the lock
pub async fn wait_for_release(handle: &intelroot_core::PipelineHandle, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if !handle.is_held() {
            return;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for pipeline release");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
