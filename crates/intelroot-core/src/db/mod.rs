//! Database layer for intelroot
//!
//! SQLite-backed storage for documents, derived artifacts, embedding
//! vectors, and the two insight caches. One writer (the pipeline) runs
//! concurrently with many readers; every execution context opens its own
//! handle and WAL mode keeps them from blocking each other.

mod artifacts;
mod documents;
mod insights;
mod schema;
mod stats;
pub mod vectors;

pub use artifacts::{Artifact, FAILED_MODEL};
pub use documents::{Document, Source};
pub use insights::{CategoryInsight, PeriodTrend};
pub use schema::Database;
pub use stats::DbStats;
pub use vectors::{bytes_to_embedding, cosine_similarity, embedding_to_bytes, EMBEDDING_DIMS};

use std::path::PathBuf;

impl Database {
    /// Get the default database path
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::DATA_DIR_NAME)
            .join("intelroot.sqlite")
    }
}
