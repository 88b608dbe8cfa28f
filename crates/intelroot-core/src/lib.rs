//! Intelroot Core Library
//!
//! Core functionality for the intelroot document intelligence engine.
//!
//! # Features
//! - Staged processing pipeline (fetch, scrape, cost gate, summarize,
//!   notify, embed) under a single-flight lock with cooperative abort
//! - Interchangeable text-generation/embedding backends with bounded
//!   retry/backoff and session cost tracking
//! - Hash-validated insight caching (24h TTL for category insights,
//!   hash-only for historical period trends)
//! - Cosine-similarity retrieval with character-budgeted grounding

pub mod config;
pub mod cost;
pub mod db;
pub mod error;
pub mod insight;
pub mod pipeline;
pub mod provider;
pub mod search;

pub use config::{Config, EmbeddingConfig, InsightConfig, PipelineConfig, RetryConfig};
pub use cost::{CostTracker, TokenUsage};
pub use db::{Artifact, CategoryInsight, Database, DbStats, Document, PeriodTrend, Source};
pub use error::{Error, IntelrootError, Result};
pub use insight::{
    category_insight, estimate, trend_analysis, Estimate, EstimateKind, InsightQuery,
    InsightResponse, PeriodEntry, RegenLocks, TrendResponse,
};
pub use pipeline::{
    DocumentSource, GateDecision, HttpScraper, LogSink, NewDocument, Orchestrator, PipelineHandle,
    PipelineMode, PipelineParams, PipelineStatus, Scraper, Stage, StatusSink, TriggerOutcome,
};
pub use provider::{
    build_provider, AnthropicProvider, ChatMessage, Completion, GenerateRequest, ModelClient,
    OpenAiProvider, Provider, ProviderKind, RetryPolicy,
};
pub use search::{ask, build_context, semantic_search, AskResponse, RankedDocument};

/// Default data directory name
pub const DATA_DIR_NAME: &str = "intelroot";

/// Default config directory name
pub const CONFIG_DIR_NAME: &str = "intelroot";
