//! Status event sink
//!
//! The pipeline publishes into this seam; delivery (email, chat,
//! webhooks) is an external collaborator's concern. Sink failures are
//! logged and never fail a run.

use super::state::Stage;
use crate::db::{Artifact, Document};

/// Consumer of pipeline status events
pub trait StatusSink: Send + Sync {
    fn stage_changed(&self, stage: Stage);

    fn artifact_created(&self, document: &Document, artifact: &Artifact);
}

/// Default sink: structured log lines only
pub struct LogSink;

impl StatusSink for LogSink {
    fn stage_changed(&self, stage: Stage) {
        tracing::info!("pipeline stage: {stage}");
    }

    fn artifact_created(&self, document: &Document, artifact: &Artifact) {
        tracing::info!(
            "artifact created for document {} ({}) by {}",
            document.id,
            document.title,
            artifact.generating_model
        );
    }
}
