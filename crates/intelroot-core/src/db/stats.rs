//! Corpus statistics

use super::Database;
use crate::error::Result;
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct DbStats {
    pub documents: usize,
    pub sources: usize,
    pub artifacts: usize,
    pub failed_artifacts: usize,
    pub embeddings: usize,
    pub pending_scrape: usize,
    pub pending_summarize: usize,
    pub pending_embed: usize,
}

impl Database {
    pub fn stats(&self) -> Result<DbStats> {
        let count = |sql: &str| -> Result<usize> {
            let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as usize)
        };

        Ok(DbStats {
            documents: count("SELECT COUNT(*) FROM documents")?,
            sources: count("SELECT COUNT(*) FROM sources")?,
            artifacts: count("SELECT COUNT(*) FROM artifacts WHERE generating_model != 'failed'")?,
            failed_artifacts: count(
                "SELECT COUNT(*) FROM artifacts WHERE generating_model = 'failed'",
            )?,
            embeddings: count("SELECT COUNT(*) FROM embeddings")?,
            pending_scrape: count("SELECT COUNT(*) FROM documents WHERE raw_text IS NULL")?,
            pending_summarize: count(
                "SELECT COUNT(*) FROM documents
                 WHERE raw_text IS NOT NULL AND raw_text != ''
                   AND id NOT IN (SELECT document_id FROM artifacts)",
            )?,
            pending_embed: count(
                "SELECT COUNT(*) FROM artifacts
                 WHERE generating_model != 'failed'
                   AND document_id NOT IN (SELECT document_id FROM embeddings)",
            )?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_counts() {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();

        let a = db
            .insert_document(None, "A", "https://example.com/a", None, Some("body"))
            .unwrap()
            .unwrap();
        db.insert_document(None, "B", "https://example.com/b", None, None)
            .unwrap();
        db.save_artifact(a, "summary", &[], None, None, "m").unwrap();

        let stats = db.stats().unwrap();
        assert_eq!(stats.documents, 2);
        assert_eq!(stats.artifacts, 1);
        assert_eq!(stats.pending_scrape, 1);
        assert_eq!(stats.pending_summarize, 0);
        assert_eq!(stats.pending_embed, 1);
    }
}
