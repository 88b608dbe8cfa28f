//! Embedding vector storage
//!
//! Stores vectors as f32 BLOBs and computes cosine similarity in Rust.

use super::documents::Document;
use super::Database;
use crate::error::Result;
use chrono::Utc;
use rusqlite::params;

/// Embedding dimensionality for the default model
pub const EMBEDDING_DIMS: usize = 1536;

impl Database {
    /// Store (or replace) the embedding for a document
    pub fn save_embedding(&self, document_id: i64, vector: &[f32], model: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO embeddings (document_id, vector, model, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                document_id,
                embedding_to_bytes(vector),
                model,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// All stored embeddings for a model, as (document_id, vector) pairs
    pub fn all_embeddings(&self, model: &str) -> Result<Vec<(i64, Vec<f32>)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT document_id, vector FROM embeddings WHERE model = ?1")?;
        let results = stmt
            .query_map(params![model], |row| {
                let id: i64 = row.get(0)?;
                let bytes: Vec<u8> = row.get(1)?;
                Ok((id, bytes_to_embedding(&bytes)))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(results)
    }

    /// Document ids published within the last `days`, restricted to those
    /// that have an embedding for the model (time-filtered retrieval)
    pub fn embedded_ids_since(&self, days: u32, model: &str) -> Result<Vec<i64>> {
        let cutoff = (Utc::now() - chrono::Duration::days(days as i64)).to_rfc3339();
        let mut stmt = self.conn.prepare(
            "SELECT e.document_id FROM embeddings e
             JOIN documents d ON d.id = e.document_id
             WHERE e.model = ?1 AND d.published_at >= ?2",
        )?;
        let results = stmt
            .query_map(params![model, cutoff], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(results)
    }

    /// Documents with a successful artifact but no embedding yet, in
    /// insertion order, paired with their artifact body text
    pub fn unembedded_documents(&self, limit: usize) -> Result<Vec<(Document, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT d.id, d.source_id, d.title, d.url, d.published_at, d.fetched_at, d.raw_text,
                    a.body_text
             FROM documents d
             JOIN artifacts a ON a.document_id = d.id
             WHERE a.generating_model != 'failed'
               AND d.id NOT IN (SELECT document_id FROM embeddings)
             ORDER BY d.id LIMIT ?1",
        )?;
        let results = stmt
            .query_map(params![limit as i64], |row| {
                Ok((
                    Document {
                        id: row.get(0)?,
                        source_id: row.get(1)?,
                        title: row.get(2)?,
                        url: row.get(3)?,
                        published_at: super::documents::parse_ts(row.get(4)?),
                        fetched_at: super::documents::parse_ts(row.get(5)?)
                            .unwrap_or_else(Utc::now),
                        raw_text: row.get(6)?,
                    },
                    row.get(7)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(results)
    }

    pub fn embedding_count(&self) -> Result<usize> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM embeddings", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

/// Convert f32 embedding to bytes (little-endian)
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert bytes to f32 embedding
pub fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embeddings
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
