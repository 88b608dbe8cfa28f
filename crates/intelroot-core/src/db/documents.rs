//! Document and source storage operations

use super::Database;
use crate::error::Result;
use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::Serialize;

/// A registered external source
#[derive(Debug, Clone, Serialize)]
pub struct Source {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub enabled: bool,
    pub last_fetched_at: Option<DateTime<Utc>>,
}

/// An ingested document. `raw_text` is None until the scrape stage fills
/// it; an empty string marks a permanently failed scrape.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: i64,
    pub source_id: Option<i64>,
    pub title: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
    pub raw_text: Option<String>,
}

pub(crate) fn parse_ts(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn document_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get(0)?,
        source_id: row.get(1)?,
        title: row.get(2)?,
        url: row.get(3)?,
        published_at: parse_ts(row.get(4)?),
        fetched_at: parse_ts(row.get(5)?).unwrap_or_else(Utc::now),
        raw_text: row.get(6)?,
    })
}

const DOCUMENT_COLUMNS: &str = "id, source_id, title, url, published_at, fetched_at, raw_text";

impl Database {
    /// Insert or update a source, returning its id
    pub fn upsert_source(&self, name: &str, url: &str, enabled: bool) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO sources (name, url, enabled) VALUES (?1, ?2, ?3)
             ON CONFLICT(url) DO UPDATE SET name = ?1, enabled = ?3",
            params![name, url, enabled],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM sources WHERE url = ?1",
            params![url],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn sources(&self) -> Result<Vec<Source>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, url, enabled, last_fetched_at FROM sources ORDER BY name",
        )?;
        let results = stmt
            .query_map([], |row| {
                Ok(Source {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    url: row.get(2)?,
                    enabled: row.get(3)?,
                    last_fetched_at: parse_ts(row.get(4)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(results)
    }

    /// Last successful fetch time for a source
    pub fn source_last_fetched(&self, source_id: i64) -> Result<Option<DateTime<Utc>>> {
        let result = self.conn.query_row(
            "SELECT last_fetched_at FROM sources WHERE id = ?1",
            params![source_id],
            |row| row.get::<_, Option<String>>(0),
        );
        match result {
            Ok(value) => Ok(parse_ts(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Record a successful fetch for a source
    pub fn touch_source(&self, source_id: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE sources SET last_fetched_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), source_id],
        )?;
        Ok(())
    }

    /// Insert a document. Returns None when the URL already exists
    /// (URL uniqueness is a hard invariant; re-ingestion is a no-op).
    pub fn insert_document(
        &self,
        source_id: Option<i64>,
        title: &str,
        url: &str,
        published_at: Option<DateTime<Utc>>,
        raw_text: Option<&str>,
    ) -> Result<Option<i64>> {
        let rows = self.conn.execute(
            "INSERT OR IGNORE INTO documents
             (source_id, title, url, published_at, fetched_at, raw_text)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                source_id,
                title,
                url,
                published_at.map(|dt| dt.to_rfc3339()),
                Utc::now().to_rfc3339(),
                raw_text,
            ],
        )?;
        if rows > 0 {
            Ok(Some(self.conn.last_insert_rowid()))
        } else {
            Ok(None)
        }
    }

    pub fn document(&self, id: i64) -> Result<Option<Document>> {
        let result = self.conn.query_row(
            &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"),
            params![id],
            document_from_row,
        );
        match result {
            Ok(doc) => Ok(Some(doc)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn document_exists(&self, url: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE url = ?1",
            params![url],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Store scraped text for a document ('' marks a permanent failure)
    pub fn update_raw_text(&self, id: i64, raw_text: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE documents SET raw_text = ?1 WHERE id = ?2",
            params![raw_text, id],
        )?;
        Ok(())
    }

    /// Documents the scrape stage still has to fill, in insertion order
    pub fn unscraped_documents(&self, limit: usize) -> Result<Vec<Document>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents
             WHERE raw_text IS NULL ORDER BY id LIMIT ?1"
        ))?;
        let results = stmt
            .query_map(params![limit as i64], document_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(results)
    }

    /// Documents with scraped text but no artifact, in insertion order
    pub fn unsummarized_documents(&self, limit: usize) -> Result<Vec<Document>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents
             WHERE raw_text IS NOT NULL AND raw_text != ''
               AND id NOT IN (SELECT document_id FROM artifacts)
             ORDER BY id LIMIT ?1"
        ))?;
        let results = stmt
            .query_map(params![limit as i64], document_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(results)
    }

    pub fn unsummarized_count(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM documents
             WHERE raw_text IS NOT NULL AND raw_text != ''
               AND id NOT IN (SELECT document_id FROM artifacts)",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Fetch documents by id; callers needing rank order re-sort themselves
    pub fn documents_by_ids(&self, ids: &[i64]) -> Result<Vec<Document>> {
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(doc) = self.document(*id)? {
                results.push(doc);
            }
        }
        Ok(results)
    }

    pub fn delete_document(&self, id: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM embeddings WHERE document_id = ?1", params![id])?;
        self.conn
            .execute("DELETE FROM artifacts WHERE document_id = ?1", params![id])?;
        self.conn
            .execute("DELETE FROM documents WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Delete documents whose URL points at a downloadable file rather
    /// than a page. Returns the number deleted.
    pub fn delete_file_url_documents(&self) -> Result<usize> {
        let mut stmt = self.conn.prepare("SELECT id, url FROM documents")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        drop(stmt);

        let mut deleted = 0;
        for (id, url) in rows {
            if crate::pipeline::is_file_url(&url) {
                self.delete_document(id)?;
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    #[test]
    fn test_insert_document_dedups_by_url() {
        let db = test_db();
        let first = db
            .insert_document(None, "Title", "https://example.com/a", None, None)
            .unwrap();
        assert!(first.is_some());

        let second = db
            .insert_document(None, "Other title", "https://example.com/a", None, None)
            .unwrap();
        assert!(second.is_none());

        let count: i64 = db
            .conn
            .query_row("SELECT COUNT(*) FROM documents", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_unscraped_and_unsummarized_selection() {
        let db = test_db();
        let a = db
            .insert_document(None, "A", "https://example.com/a", None, None)
            .unwrap()
            .unwrap();
        let b = db
            .insert_document(None, "B", "https://example.com/b", None, Some("body"))
            .unwrap()
            .unwrap();
        // failed scrape sentinel: not unscraped, not summarizable
        let c = db
            .insert_document(None, "C", "https://example.com/c", None, Some(""))
            .unwrap()
            .unwrap();

        let unscraped: Vec<i64> = db
            .unscraped_documents(10)
            .unwrap()
            .iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(unscraped, vec![a]);

        let unsummarized: Vec<i64> = db
            .unsummarized_documents(10)
            .unwrap()
            .iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(unsummarized, vec![b]);
        assert!(!unsummarized.contains(&c));
    }

    #[test]
    fn test_source_last_fetched_roundtrip() {
        let db = test_db();
        let id = db.upsert_source("Feed", "https://feed.example.com", true).unwrap();
        assert!(db.source_last_fetched(id).unwrap().is_none());

        db.touch_source(id).unwrap();
        assert!(db.source_last_fetched(id).unwrap().is_some());
    }

    #[test]
    fn test_delete_file_url_documents() {
        let db = test_db();
        db.insert_document(None, "PDF", "https://example.com/report.pdf", None, None)
            .unwrap();
        db.insert_document(None, "Page", "https://example.com/post", None, None)
            .unwrap();

        assert_eq!(db.delete_file_url_documents().unwrap(), 1);
        let count: i64 = db
            .conn
            .query_row("SELECT COUNT(*) FROM documents", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
