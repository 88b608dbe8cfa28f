//! Staged processing pipeline
//!
//! One orchestrator owns the single-flight state handle and drives the
//! stage machine on a background task; sources, the scraper, and the
//! status sink are injected collaborator seams.

mod notify;
mod orchestrator;
mod scraper;
mod sources;
mod state;

pub use notify::{LogSink, StatusSink};
pub use orchestrator::{Orchestrator, PipelineMode, PipelineParams, TriggerOutcome};
pub use scraper::{HttpScraper, Scraper};
pub use sources::{is_file_url, DocumentSource, NewDocument};
pub use state::{GateDecision, PipelineHandle, PipelineStatus, Stage};
