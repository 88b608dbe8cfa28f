//! Retrieval index behavior: ranking, tie-breaking, windowing, and
//! grounded Q&A over a fixture of stored embeddings

mod common;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use common::client_for_provider;
use intelroot_core::error::Result;
use intelroot_core::{
    ask, semantic_search, ChatMessage, Completion, Database, GenerateRequest, InsightConfig,
    Provider, TokenUsage,
};
use std::sync::Arc;

const EMBED_MODEL: &str = "test-embed";

/// Provider whose embeddings are always the fixed query vector
struct QueryProvider {
    query_vector: Vec<f32>,
}

#[async_trait]
impl Provider for QueryProvider {
    async fn generate(&self, _request: GenerateRequest) -> Result<Completion> {
        Ok(Completion {
            text: "Grounded answer.".to_string(),
            usage: TokenUsage::new(500, 100),
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| self.query_vector.clone()).collect())
    }

    fn model_name(&self) -> &str {
        "gpt-4o-mini"
    }

    fn embedding_model(&self) -> &str {
        EMBED_MODEL
    }

    fn dimensions(&self) -> usize {
        2
    }
}

fn seed_embedded_doc(db: &Database, i: i64, published: DateTime<Utc>, vector: &[f32]) -> i64 {
    let id = db
        .insert_document(
            None,
            &format!("doc {i}"),
            &format!("https://example.com/{i}"),
            Some(published),
            Some("raw"),
        )
        .unwrap()
        .unwrap();
    db.save_artifact(id, &format!("artifact body {i}"), &[], None, None, "m")
        .unwrap();
    db.save_embedding(id, vector, EMBED_MODEL).unwrap();
    id
}

/// Ten documents: ids 1 and 2 tie at perfect similarity, the rest fall
/// off monotonically
fn seed_fixture(db: &Database) {
    let now = Utc::now();
    for i in 1..=10i64 {
        let published = if i <= 5 {
            now - ChronoDuration::days(400)
        } else {
            now - ChronoDuration::days(1)
        };
        let vector: Vec<f32> = if i <= 2 {
            vec![1.0, 0.0]
        } else {
            vec![1.0, (i - 2) as f32 * 0.2]
        };
        seed_embedded_doc(db, i, published, &vector);
    }
}

#[tokio::test]
async fn search_returns_top_k_sorted_with_deterministic_ties() {
    let dir = tempfile::tempdir().unwrap();
    let (_path, db) = common::temp_db(&dir);
    seed_fixture(&db);

    let client = client_for_provider(Arc::new(QueryProvider {
        query_vector: vec![1.0, 0.0],
    }));

    let results = semantic_search(&db, &client, "query", 5, None).await.unwrap();
    assert_eq!(results.len(), 5);

    let ids: Vec<i64> = results.iter().map(|r| r.document_id).collect();
    // ids 1 and 2 tie at score 1.0; ascending id breaks the tie
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);

    for window in results.windows(2) {
        assert!(window[0].score >= window[1].score);
    }
    assert!((results[0].score - 1.0).abs() < 1e-5);
}

#[tokio::test]
async fn search_respects_time_window() {
    let dir = tempfile::tempdir().unwrap();
    let (_path, db) = common::temp_db(&dir);
    seed_fixture(&db);

    let client = client_for_provider(Arc::new(QueryProvider {
        query_vector: vec![1.0, 0.0],
    }));

    let results = semantic_search(&db, &client, "query", 5, Some(30))
        .await
        .unwrap();
    let ids: Vec<i64> = results.iter().map(|r| r.document_id).collect();
    // only documents published inside the window are candidates
    assert_eq!(ids, vec![6, 7, 8, 9, 10]);
}

#[tokio::test]
async fn top_k_is_capped() {
    let dir = tempfile::tempdir().unwrap();
    let (_path, db) = common::temp_db(&dir);
    seed_fixture(&db);

    let client = client_for_provider(Arc::new(QueryProvider {
        query_vector: vec![1.0, 0.0],
    }));

    // requesting more than the cap clamps to 50; only 10 exist
    let results = semantic_search(&db, &client, "query", 100, None).await.unwrap();
    assert_eq!(results.len(), 10);

    let results = semantic_search(&db, &client, "query", 0, None).await.unwrap();
    assert_eq!(results.len(), 1, "top_k clamps up to at least one");
}

#[tokio::test]
async fn search_with_no_embeddings_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let (_path, db) = common::temp_db(&dir);

    let client = client_for_provider(Arc::new(QueryProvider {
        query_vector: vec![1.0, 0.0],
    }));

    let results = semantic_search(&db, &client, "query", 5, None).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn ask_grounds_answer_in_retrieved_documents() {
    let dir = tempfile::tempdir().unwrap();
    let (_path, db) = common::temp_db(&dir);
    seed_fixture(&db);

    let client = client_for_provider(Arc::new(QueryProvider {
        query_vector: vec![1.0, 0.0],
    }));
    let options = InsightConfig::default();

    let response = ask(
        &db,
        &client,
        &options,
        &[ChatMessage::user("what is happening?")],
        Some(5),
    )
    .await
    .unwrap();

    assert_eq!(response.answer, "Grounded answer.");
    assert_eq!(response.documents.len(), 5);
    assert!(response.actual_cost > 0.0);
}
