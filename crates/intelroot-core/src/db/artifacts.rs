//! Artifact storage operations

use super::documents::{parse_ts, Document};
use super::Database;
use crate::error::Result;
use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::Serialize;

/// Sentinel `generating_model` marking a document that failed analysis
/// and will not be retried automatically
pub const FAILED_MODEL: &str = "failed";

/// Derived analysis for a single document
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    pub document_id: i64,
    pub body_text: String,
    pub tags: Vec<String>,
    pub phases: Option<serde_json::Value>,
    pub novelty: Option<String>,
    pub generating_model: String,
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    pub fn is_failed(&self) -> bool {
        self.generating_model == FAILED_MODEL
    }
}

fn artifact_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Artifact> {
    let tags_json: String = row.get(2)?;
    let phases_json: Option<String> = row.get(3)?;
    Ok(Artifact {
        document_id: row.get(0)?,
        body_text: row.get(1)?,
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        phases: phases_json.and_then(|j| serde_json::from_str(&j).ok()),
        novelty: row.get(4)?,
        generating_model: row.get(5)?,
        created_at: parse_ts(row.get(6)?).unwrap_or_else(Utc::now),
    })
}

const ARTIFACT_COLUMNS: &str =
    "document_id, body_text, tags, phases, novelty, generating_model, created_at";

impl Database {
    /// Persist a derived artifact (replaces an existing one for the same
    /// document, so re-running a failed item can overwrite its sentinel)
    pub fn save_artifact(
        &self,
        document_id: i64,
        body_text: &str,
        tags: &[String],
        phases: Option<&serde_json::Value>,
        novelty: Option<&str>,
        generating_model: &str,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO artifacts
             (document_id, body_text, tags, phases, novelty, generating_model, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                document_id,
                body_text,
                serde_json::to_string(tags)?,
                phases.map(serde_json::to_string).transpose()?,
                novelty,
                generating_model,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Mark a document as permanently failed so it is skipped on future runs
    pub fn save_failed_artifact(&self, document_id: i64) -> Result<()> {
        self.save_artifact(document_id, "", &[], None, None, FAILED_MODEL)
    }

    pub fn artifact(&self, document_id: i64) -> Result<Option<Artifact>> {
        let result = self.conn.query_row(
            &format!("SELECT {ARTIFACT_COLUMNS} FROM artifacts WHERE document_id = ?1"),
            params![document_id],
            artifact_from_row,
        );
        match result {
            Ok(artifact) => Ok(Some(artifact)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Documents contributing to a category, newest first.
    ///
    /// A document contributes when its (non-failed) artifact carries the
    /// category as a tag; `entity` narrows by an additional tag match.
    /// `since_days` restricts to documents published inside the window.
    pub fn documents_for_category(
        &self,
        category: &str,
        entity: Option<&str>,
        since_days: Option<u32>,
    ) -> Result<Vec<(Document, Artifact)>> {
        let cutoff = since_days
            .map(|days| (Utc::now() - chrono::Duration::days(days as i64)).to_rfc3339());

        let mut sql = format!(
            "SELECT d.id, d.source_id, d.title, d.url, d.published_at, d.fetched_at, d.raw_text,
                    a.document_id, a.body_text, a.tags, a.phases, a.novelty,
                    a.generating_model, a.created_at
             FROM documents d
             JOIN artifacts a ON a.document_id = d.id
             WHERE a.generating_model != '{FAILED_MODEL}'
               AND lower(a.tags) LIKE '%\"' || lower(?1) || '\"%'"
        );
        if entity.is_some() {
            sql.push_str(" AND lower(a.tags) LIKE '%\"' || lower(?2) || '\"%'");
        }
        if cutoff.is_some() {
            let idx = if entity.is_some() { 3 } else { 2 };
            sql.push_str(&format!(" AND d.published_at >= ?{idx}"));
        }
        sql.push_str(" ORDER BY d.published_at DESC, d.id DESC");

        let mut stmt = self.conn.prepare(&sql)?;

        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<(Document, Artifact)> {
            let tags_json: String = row.get(9)?;
            let phases_json: Option<String> = row.get(10)?;
            Ok((
                Document {
                    id: row.get(0)?,
                    source_id: row.get(1)?,
                    title: row.get(2)?,
                    url: row.get(3)?,
                    published_at: parse_ts(row.get(4)?),
                    fetched_at: parse_ts(row.get(5)?).unwrap_or_else(Utc::now),
                    raw_text: row.get(6)?,
                },
                Artifact {
                    document_id: row.get(7)?,
                    body_text: row.get(8)?,
                    tags: serde_json::from_str(&tags_json).unwrap_or_default(),
                    phases: phases_json.and_then(|j| serde_json::from_str(&j).ok()),
                    novelty: row.get(11)?,
                    generating_model: row.get(12)?,
                    created_at: parse_ts(row.get(13)?).unwrap_or_else(Utc::now),
                },
            ))
        };

        let results = match (entity, cutoff) {
            (Some(e), Some(c)) => stmt
                .query_map(params![category, e, c], map_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?,
            (Some(e), None) => stmt
                .query_map(params![category, e], map_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?,
            (None, Some(c)) => stmt
                .query_map(params![category, c], map_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?,
            (None, None) => stmt
                .query_map(params![category], map_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?,
        };

        Ok(results)
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

    fn insert_doc(db: &Database, url: &str, published: &str) -> i64 {
        let published = DateTime::parse_from_rfc3339(published)
            .unwrap()
            .with_timezone(&Utc);
        db.insert_document(None, "Doc", url, Some(published), Some("body"))
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_artifact_roundtrip() {
        let db = test_db();
        let id = insert_doc(&db, "https://example.com/a", "2025-01-10T00:00:00Z");
        db.save_artifact(
            id,
            "# Executive Summary\nThings happened.",
            &["ransomware".to_string(), "lockbit".to_string()],
            None,
            Some("new loader observed"),
            "gpt-4o-mini",
        )
        .unwrap();

        let artifact = db.artifact(id).unwrap().unwrap();
        assert_eq!(artifact.tags, vec!["ransomware", "lockbit"]);
        assert!(!artifact.is_failed());
        assert_eq!(artifact.novelty.as_deref(), Some("new loader observed"));
    }

    #[test]
    fn test_failed_sentinel() {
        let db = test_db();
        let id = insert_doc(&db, "https://example.com/a", "2025-01-10T00:00:00Z");
        db.save_failed_artifact(id).unwrap();

        let artifact = db.artifact(id).unwrap().unwrap();
        assert!(artifact.is_failed());

        // failed artifacts never contribute to a category
        let docs = db.documents_for_category("ransomware", None, None).unwrap();
        assert!(docs.is_empty());
    }

    #[test]
    fn test_documents_for_category_filters() {
        let db = test_db();
        let a = insert_doc(&db, "https://example.com/a", "2025-01-10T00:00:00Z");
        let b = insert_doc(&db, "https://example.com/b", "2025-06-10T00:00:00Z");
        db.save_artifact(a, "s", &["ransomware".into(), "lockbit".into()], None, None, "m")
            .unwrap();
        db.save_artifact(b, "s", &["phishing".into()], None, None, "m")
            .unwrap();

        let docs = db.documents_for_category("ransomware", None, None).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].0.id, a);

        let docs = db
            .documents_for_category("ransomware", Some("lockbit"), None)
            .unwrap();
        assert_eq!(docs.len(), 1);

        let docs = db
            .documents_for_category("ransomware", Some("conti"), None)
            .unwrap();
        assert!(docs.is_empty());
    }

    #[test]
    fn test_newest_first_ordering() {
        let db = test_db();
        let old = insert_doc(&db, "https://example.com/old", "2024-01-01T00:00:00Z");
        let new = insert_doc(&db, "https://example.com/new", "2025-06-01T00:00:00Z");
        db.save_artifact(old, "s", &["malware".into()], None, None, "m")
            .unwrap();
        db.save_artifact(new, "s", &["malware".into()], None, None, "m")
            .unwrap();

        let docs = db.documents_for_category("malware", None, None).unwrap();
        assert_eq!(docs[0].0.id, new);
        assert_eq!(docs[1].0.id, old);
    }
}
