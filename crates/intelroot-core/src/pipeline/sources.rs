//! Document source seam
//!
//! Feed discovery and parsing belong to external collaborators; the
//! pipeline only consumes `NewDocument` batches from whatever sources
//! were injected at construction time.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A document offered by a source, before ingestion
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub title: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    /// Sources that already carry full text let the scrape stage skip
    /// the document entirely
    pub raw_text: Option<String>,
}

/// An external provider of documents (RSS collaborator, API fetcher,
/// file loader). `since` is the source's last successful fetch time when
/// the caller asked for incremental mode.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    fn name(&self) -> &str;

    fn url(&self) -> &str;

    async fn fetch(
        &self,
        since: Option<DateTime<Utc>>,
        lookback_days: u32,
    ) -> Result<Vec<NewDocument>>;
}

/// URL extensions that point at downloadable files rather than pages
const SKIP_EXTENSIONS: &[&str] = &[
    ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".zip", ".rar", ".7z", ".gz",
    ".tar", ".tgz", ".exe", ".msi", ".dmg", ".apk", ".iso",
];

/// Check whether a URL points to a downloadable file
pub fn is_file_url(url: &str) -> bool {
    // Strip query string and fragment before inspecting the path
    let path = url
        .split(['?', '#'])
        .next()
        .unwrap_or(url)
        .to_lowercase();
    SKIP_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}
