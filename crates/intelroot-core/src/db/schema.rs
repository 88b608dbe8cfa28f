//! Database schema and initialization

use crate::error::Result;
use rusqlite::{params, Connection};
use std::path::Path;

/// Main database handle.
///
/// Each execution context (pipeline task, control-surface reader, CLI
/// command) opens its own handle; WAL mode lets readers proceed while the
/// single pipeline writer commits.
pub struct Database {
    pub(crate) conn: Connection,
}

const SCHEMA_VERSION: i32 = 2;

const CREATE_TABLES: &str = r#"
-- External feed bookkeeping
CREATE TABLE IF NOT EXISTS sources (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    url TEXT NOT NULL UNIQUE,
    enabled INTEGER NOT NULL DEFAULT 1,
    last_fetched_at TEXT
);

-- Ingested documents; raw_text NULL = unscraped, '' = scrape failed
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id INTEGER REFERENCES sources(id),
    title TEXT NOT NULL,
    url TEXT NOT NULL UNIQUE,
    published_at TEXT,
    fetched_at TEXT NOT NULL,
    raw_text TEXT
);

-- Derived analysis, at most one per document;
-- generating_model = 'failed' marks a permanent per-item failure
CREATE TABLE IF NOT EXISTS artifacts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    document_id INTEGER NOT NULL UNIQUE REFERENCES documents(id),
    body_text TEXT NOT NULL,
    tags TEXT NOT NULL DEFAULT '[]',
    phases TEXT,
    novelty TEXT,
    generating_model TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Embedding vectors, independent lifecycle from artifacts
CREATE TABLE IF NOT EXISTS embeddings (
    document_id INTEGER PRIMARY KEY REFERENCES documents(id),
    vector BLOB NOT NULL,
    model TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Read-through insight cache, keyed by category[::entity]
CREATE TABLE IF NOT EXISTS category_insights (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    key TEXT NOT NULL UNIQUE,
    trend_text TEXT NOT NULL,
    forecast_text TEXT NOT NULL,
    contributing_count INTEGER NOT NULL,
    content_hash TEXT NOT NULL,
    model TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Historical period trends; validity is hash-only, no TTL
CREATE TABLE IF NOT EXISTS period_trends (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    category TEXT NOT NULL,
    period_type TEXT NOT NULL,
    period_label TEXT NOT NULL,
    trend_text TEXT NOT NULL,
    contributing_count INTEGER NOT NULL,
    content_hash TEXT NOT NULL,
    model TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(category, period_type, period_label)
);

-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_documents_source ON documents(source_id);
CREATE INDEX IF NOT EXISTS idx_documents_published ON documents(published_at DESC);
CREATE INDEX IF NOT EXISTS idx_artifacts_document ON artifacts(document_id);
CREATE INDEX IF NOT EXISTS idx_period_trends_category ON period_trends(category);
"#;

impl Database {
    /// Open database at path, creating if necessary
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    /// Open in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Initialize database schema
    pub fn initialize(&self) -> Result<()> {
        // Set PRAGMAs for performance and reader/writer concurrency
        self.conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;

        self.conn.execute_batch(CREATE_TABLES)?;

        // Run migrations to upgrade existing databases (BEFORE setting version)
        self.migrate()?;

        self.conn.execute(
            "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
            params![SCHEMA_VERSION],
        )?;

        Ok(())
    }

    /// Get current schema version
    pub fn schema_version(&self) -> Result<Option<i32>> {
        let version = self
            .conn
            .query_row(
                "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .ok();
        Ok(version)
    }

    /// Run migrations to upgrade schema to current version
    pub fn migrate(&self) -> Result<()> {
        let current = self.schema_version()?.unwrap_or(0);

        if current > 0 && current < 2 {
            self.migrate_to_v2()?;
        }

        Ok(())
    }

    fn migrate_to_v2(&self) -> Result<()> {
        // v1 artifacts had no novelty column
        let has_novelty: bool = self
            .conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM pragma_table_info('artifacts') WHERE name = 'novelty'",
                [],
                |row| row.get(0),
            )
            .unwrap_or(false);

        if !has_novelty {
            self.conn
                .execute("ALTER TABLE artifacts ADD COLUMN novelty TEXT", [])?;
        }

        // v1 sources had no last_fetched_at column
        let has_last_fetched: bool = self
            .conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM pragma_table_info('sources') WHERE name = 'last_fetched_at'",
                [],
                |row| row.get(0),
            )
            .unwrap_or(false);

        if !has_last_fetched {
            self.conn
                .execute("ALTER TABLE sources ADD COLUMN last_fetched_at TEXT", [])?;
        }

        self.conn.execute(
            "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
            params![2],
        )?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        assert_eq!(db.schema_version().unwrap(), Some(SCHEMA_VERSION));
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        db.initialize().unwrap();
        assert_eq!(db.schema_version().unwrap(), Some(SCHEMA_VERSION));
    }

    #[test]
    fn test_migration_v1_to_v2() {
        let db = Database::open_in_memory().unwrap();

        db.conn
            .execute_batch(
                "CREATE TABLE sources (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    url TEXT NOT NULL UNIQUE,
                    enabled INTEGER NOT NULL DEFAULT 1
                );
                CREATE TABLE artifacts (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    document_id INTEGER NOT NULL UNIQUE,
                    body_text TEXT NOT NULL,
                    tags TEXT NOT NULL DEFAULT '[]',
                    phases TEXT,
                    generating_model TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );
                CREATE TABLE schema_version (version INTEGER PRIMARY KEY);
                INSERT INTO schema_version VALUES (1);",
            )
            .unwrap();

        assert_eq!(db.schema_version().unwrap(), Some(1));

        db.initialize().unwrap();

        assert_eq!(db.schema_version().unwrap(), Some(2));

        let has_novelty: bool = db
            .conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM pragma_table_info('artifacts') WHERE name = 'novelty'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(has_novelty, "artifacts should have novelty column");

        let has_last_fetched: bool = db
            .conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM pragma_table_info('sources') WHERE name = 'last_fetched_at'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(has_last_fetched, "sources should have last_fetched_at column");
    }
}
