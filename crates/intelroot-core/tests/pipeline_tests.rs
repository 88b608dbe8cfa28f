//! End-to-end pipeline behavior: single-flight locking, cost gate,
//! cooperative abort, per-item failure tolerance, and idempotent re-runs

mod common;

use common::*;
use intelroot_core::{
    Completion, Config, NewDocument, Orchestrator, PipelineMode, PipelineParams, Stage,
    TokenUsage, TriggerOutcome,
};
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(10);

fn orchestrator_with(
    db_path: std::path::PathBuf,
    provider: Arc<MockProvider>,
    scraper: Arc<MockScraper>,
    sink: Arc<RecordingSink>,
    config: Config,
) -> Orchestrator {
    Orchestrator::new(db_path, config, client_for(provider), scraper, sink)
}

/// Approve the cost gate as soon as the run reaches it
fn auto_approve(handle: intelroot_core::PipelineHandle) {
    tokio::spawn(async move {
        loop {
            if handle.stage() == Stage::CostGate {
                handle.approve_cost();
                return;
            }
            if !handle.is_held() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    });
}

fn seed_scraped_docs(db: &intelroot_core::Database, count: usize) -> Vec<i64> {
    (0..count)
        .map(|i| {
            db.insert_document(
                None,
                &format!("doc {i}"),
                &format!("https://example.com/{i}"),
                None,
                Some("raw article body"),
            )
            .unwrap()
            .unwrap()
        })
        .collect()
}

#[tokio::test]
async fn full_pipeline_processes_source_documents() {
    let dir = tempfile::tempdir().unwrap();
    let (db_path, db) = temp_db(&dir);

    let provider = Arc::new(MockProvider::fixed_json(SUMMARY_JSON));
    let scraper = Arc::new(MockScraper::new(Duration::ZERO));
    let sink = Arc::new(RecordingSink::default());

    let source = MockSource {
        docs: (0..3)
            .map(|i| NewDocument {
                title: format!("article {i}"),
                url: format!("https://feeds.example.com/{i}"),
                published_at: None,
                raw_text: None,
            })
            .collect(),
    };

    let orchestrator = orchestrator_with(
        db_path,
        provider.clone(),
        scraper.clone(),
        sink.clone(),
        Config::default(),
    )
    .with_source(Arc::new(source));

    let handle = orchestrator.handle();
    auto_approve(handle.clone());
    assert_eq!(
        orchestrator.trigger(PipelineMode::Full, PipelineParams::default()),
        TriggerOutcome::Started
    );
    wait_for_release(&handle, WAIT).await;

    assert_eq!(handle.stage(), Stage::Done);
    for stage in [
        Stage::Fetch,
        Stage::Scrape,
        Stage::CostGate,
        Stage::Summarize,
        Stage::Notify,
        Stage::Embed,
        Stage::Done,
    ] {
        assert!(sink.saw(stage), "sink should have seen {stage}");
    }

    let stats = db.stats().unwrap();
    assert_eq!(stats.documents, 3);
    assert_eq!(stats.artifacts, 3);
    assert_eq!(stats.embeddings, 3);
    assert_eq!(provider.calls(), 3);
    // actual cost reported after summarize
    assert!(handle.status().actual_cost.unwrap() > 0.0);
}

#[tokio::test]
async fn concurrent_triggers_exactly_one_starts() {
    let dir = tempfile::tempdir().unwrap();
    let (db_path, db) = temp_db(&dir);
    seed_scraped_docs(&db, 1);

    let provider = Arc::new(MockProvider::fixed_json(SUMMARY_JSON));
    let scraper = Arc::new(MockScraper::new(Duration::ZERO));
    let sink = Arc::new(RecordingSink::default());
    let orchestrator = orchestrator_with(
        db_path,
        provider.clone(),
        scraper,
        sink,
        Config::default(),
    );
    let handle = orchestrator.handle();

    assert_eq!(
        orchestrator.trigger(PipelineMode::ProcessPending, PipelineParams::default()),
        TriggerOutcome::Started
    );
    // run blocks at the cost gate, so the lock is definitely held
    wait_for_stage(&handle, Stage::CostGate, WAIT).await;

    assert_eq!(
        orchestrator.trigger(PipelineMode::ProcessPending, PipelineParams::default()),
        TriggerOutcome::AlreadyRunning
    );
    assert_eq!(
        orchestrator.trigger(PipelineMode::Full, PipelineParams::default()),
        TriggerOutcome::AlreadyRunning
    );

    handle.decline_cost();
    wait_for_release(&handle, WAIT).await;
    assert_eq!(handle.stage(), Stage::Aborted);
    // declined gate consumed no summarization calls
    assert_eq!(provider.calls(), 0);

    // lock is free again
    assert_eq!(
        orchestrator.trigger(PipelineMode::EmbedOnly, PipelineParams::default()),
        TriggerOutcome::Started
    );
    wait_for_release(&handle, WAIT).await;
}

#[tokio::test]
async fn abort_during_scrape_never_reaches_cost_gate() {
    let dir = tempfile::tempdir().unwrap();
    let (db_path, db) = temp_db(&dir);
    for i in 0..5 {
        db.insert_document(
            None,
            &format!("doc {i}"),
            &format!("https://example.com/{i}"),
            None,
            None,
        )
        .unwrap();
    }

    let provider = Arc::new(MockProvider::fixed_json(SUMMARY_JSON));
    let scraper = Arc::new(MockScraper::new(Duration::from_millis(100)));
    let sink = Arc::new(RecordingSink::default());
    let orchestrator = orchestrator_with(
        db_path,
        provider.clone(),
        scraper,
        sink.clone(),
        Config::default(),
    );
    let handle = orchestrator.handle();

    orchestrator.trigger(PipelineMode::ProcessPending, PipelineParams::default());
    wait_for_stage(&handle, Stage::Scrape, WAIT).await;
    handle.request_abort();
    wait_for_release(&handle, WAIT).await;

    assert_eq!(handle.stage(), Stage::Aborted);
    assert!(!sink.saw(Stage::CostGate), "cost gate must not start");
    assert!(!sink.saw(Stage::Summarize));
    assert_eq!(provider.calls(), 0);

    // documents scraped before the abort keep their content
    let stats = db.stats().unwrap();
    let scraped = stats.documents - stats.pending_scrape;
    assert!(scraped > 0, "at least one document should have been scraped");
}

#[tokio::test]
async fn one_failing_document_does_not_abort_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let (db_path, db) = temp_db(&dir);
    db.insert_document(None, "good one", "https://example.com/1", None, Some("body"))
        .unwrap();
    db.insert_document(None, "bad apple", "https://example.com/2", None, Some("body"))
        .unwrap();
    db.insert_document(None, "good two", "https://example.com/3", None, Some("body"))
        .unwrap();

    let provider = Arc::new(MockProvider::new(Box::new(|request| {
        let user = request
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<String>();
        let text = if user.contains("bad apple") {
            "this is not json at all".to_string()
        } else {
            SUMMARY_JSON.to_string()
        };
        Ok(Completion {
            text,
            usage: TokenUsage::new(1000, 500),
        })
    })));
    let scraper = Arc::new(MockScraper::new(Duration::ZERO));
    let sink = Arc::new(RecordingSink::default());
    let orchestrator = orchestrator_with(
        db_path,
        provider.clone(),
        scraper,
        sink.clone(),
        Config::default(),
    );
    let handle = orchestrator.handle();

    auto_approve(handle.clone());
    orchestrator.trigger(PipelineMode::ProcessPending, PipelineParams::default());
    wait_for_release(&handle, WAIT).await;

    // the batch completed and the pipeline reached embed, not error
    assert!(sink.saw(Stage::Embed));
    assert_eq!(handle.stage(), Stage::Done);

    let stats = db.stats().unwrap();
    assert_eq!(stats.artifacts, 2);
    assert_eq!(stats.failed_artifacts, 1);
    assert_eq!(stats.embeddings, 2);
}

#[tokio::test]
async fn rerun_after_completion_reprocesses_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let (db_path, db) = temp_db(&dir);
    seed_scraped_docs(&db, 3);

    let provider = Arc::new(MockProvider::fixed_json(SUMMARY_JSON));
    let scraper = Arc::new(MockScraper::new(Duration::ZERO));
    let sink = Arc::new(RecordingSink::default());
    let orchestrator = orchestrator_with(
        db_path,
        provider.clone(),
        scraper,
        sink,
        Config::default(),
    );
    let handle = orchestrator.handle();

    auto_approve(handle.clone());
    orchestrator.trigger(PipelineMode::ProcessPending, PipelineParams::default());
    wait_for_release(&handle, WAIT).await;
    assert_eq!(handle.stage(), Stage::Done);
    assert_eq!(provider.calls(), 3);

    // second run: nothing pending, no estimate published, zero calls
    auto_approve(handle.clone());
    orchestrator.trigger(PipelineMode::ProcessPending, PipelineParams::default());
    wait_for_release(&handle, WAIT).await;

    assert_eq!(handle.stage(), Stage::Done);
    assert_eq!(provider.calls(), 3, "no document may be summarized twice");
    assert!(handle.status().cost_estimate.is_none());
    assert_eq!(db.stats().unwrap().artifacts, 3);
}

#[tokio::test]
async fn gate_timeout_aborts_without_spending() {
    let dir = tempfile::tempdir().unwrap();
    let (db_path, db) = temp_db(&dir);
    seed_scraped_docs(&db, 1);

    let mut config = Config::default();
    config.pipeline.cost_gate_timeout_secs = 1;

    let provider = Arc::new(MockProvider::fixed_json(SUMMARY_JSON));
    let scraper = Arc::new(MockScraper::new(Duration::ZERO));
    let sink = Arc::new(RecordingSink::default());
    let orchestrator = orchestrator_with(db_path, provider.clone(), scraper, sink, config);
    let handle = orchestrator.handle();

    orchestrator.trigger(PipelineMode::ProcessPending, PipelineParams::default());
    wait_for_release(&handle, WAIT).await;

    assert_eq!(handle.stage(), Stage::Aborted);
    assert_eq!(provider.calls(), 0);
    assert!(handle.status().cost_estimate.unwrap() > 0.0);
}

#[tokio::test]
async fn refetching_same_urls_creates_no_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let (db_path, db) = temp_db(&dir);

    let source = Arc::new(MockSource {
        docs: vec![NewDocument {
            title: "repeat".to_string(),
            url: "https://example.com/repeat".to_string(),
            published_at: None,
            raw_text: Some("body".to_string()),
        }],
    });

    let provider = Arc::new(MockProvider::fixed_json(SUMMARY_JSON));
    let scraper = Arc::new(MockScraper::new(Duration::ZERO));
    let sink = Arc::new(RecordingSink::default());
    let orchestrator = orchestrator_with(
        db_path,
        provider.clone(),
        scraper,
        sink,
        Config::default(),
    )
    .with_source(source);
    let handle = orchestrator.handle();

    for _ in 0..2 {
        auto_approve(handle.clone());
        orchestrator.trigger(PipelineMode::Full, PipelineParams::default());
        wait_for_release(&handle, WAIT).await;
        assert_eq!(handle.stage(), Stage::Done);
    }

    let stats = db.stats().unwrap();
    assert_eq!(stats.documents, 1);
    assert_eq!(stats.artifacts, 1);
    assert_eq!(provider.calls(), 1);
}
