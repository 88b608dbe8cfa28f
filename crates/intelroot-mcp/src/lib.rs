//! Intelroot control surface
//!
//! Exposes pipeline control (trigger/abort/status/cost gate) and the
//! read paths (insight, period trends, estimate, search, ask) to UI and
//! CLI collaborators as JSON-RPC tools over stdio.

pub mod protocol;
mod server;
pub mod tools;

pub use server::{start_server, McpServer};

use anyhow::Result;
use intelroot_core::{
    Config, CostTracker, Database, HttpScraper, LogSink, ModelClient, Orchestrator,
    PipelineHandle, RegenLocks,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Everything the tool handlers need. The database handle is this
/// context's own; pipeline runs open theirs on the background task.
pub struct ServerState {
    pub db: Database,
    pub config: Config,
    pub client: ModelClient,
    pub orchestrator: Orchestrator,
    pub handle: PipelineHandle,
    pub locks: RegenLocks,
}

impl ServerState {
    pub fn build(db_path: PathBuf, config: Config) -> Result<Self> {
        let db = Database::open(&db_path)?;
        db.initialize()?;

        let tracker = Arc::new(CostTracker::new());
        let client = ModelClient::from_config(&config, tracker)?;
        let scraper = Arc::new(HttpScraper::new(config.pipeline.request_timeout_secs)?);
        let orchestrator = Orchestrator::new(
            db_path,
            config.clone(),
            client.clone(),
            scraper,
            Arc::new(LogSink),
        );
        let handle = orchestrator.handle();

        Ok(Self {
            db,
            config,
            client,
            orchestrator,
            handle,
            locks: RegenLocks::new(),
        })
    }
}
