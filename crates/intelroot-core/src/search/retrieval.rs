//! Vector similarity search over stored document embeddings

use crate::db::{cosine_similarity, Database};
use crate::error::Result;
use crate::provider::ModelClient;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

pub const DEFAULT_TOP_K: usize = 15;
pub const MAX_TOP_K: usize = 50;

/// A retrieval hit: document metadata plus its artifact body and score
#[derive(Debug, Clone, Serialize)]
pub struct RankedDocument {
    pub document_id: i64,
    pub title: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub body_text: String,
    pub tags: Vec<String>,
    pub score: f32,
}

/// Embed the query and rank stored embeddings by cosine similarity.
///
/// Results are sorted by descending score with ties broken by ascending
/// document id, then truncated to `top_k` (clamped to [1, MAX_TOP_K]).
/// `window_days` restricts candidates to documents published inside the
/// window.
pub async fn semantic_search(
    db: &Database,
    client: &ModelClient,
    query: &str,
    top_k: usize,
    window_days: Option<u32>,
) -> Result<Vec<RankedDocument>> {
    let top_k = top_k.clamp(1, MAX_TOP_K);
    let model = client.embedding_model().to_string();

    let stored = db.all_embeddings(&model)?;
    if stored.is_empty() {
        return Ok(Vec::new());
    }

    let query_vector = client.embed(query).await?;

    let allowed: Option<std::collections::HashSet<i64>> = match window_days {
        Some(days) => Some(db.embedded_ids_since(days, &model)?.into_iter().collect()),
        None => None,
    };

    let mut scored: Vec<(i64, f32)> = stored
        .iter()
        .filter(|(id, _)| allowed.as_ref().map_or(true, |ids| ids.contains(id)))
        .map(|(id, vector)| (*id, cosine_similarity(&query_vector, vector)))
        .collect();

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    scored.truncate(top_k);

    let ranked_ids: Vec<i64> = scored.iter().map(|(id, _)| *id).collect();
    let score_map: HashMap<i64, f32> = scored.into_iter().collect();

    // Fetch document + artifact data, preserving rank order
    let mut results = Vec::with_capacity(ranked_ids.len());
    for id in ranked_ids {
        let Some(doc) = db.document(id)? else { continue };
        let Some(artifact) = db.artifact(id)? else { continue };
        results.push(RankedDocument {
            document_id: id,
            title: doc.title,
            url: doc.url,
            published_at: doc.published_at,
            body_text: artifact.body_text,
            tags: artifact.tags,
            score: score_map.get(&id).copied().unwrap_or(0.0),
        });
    }

    Ok(results)
}
