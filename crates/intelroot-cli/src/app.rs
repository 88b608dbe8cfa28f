//! CLI argument definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "intelroot", version, about = "Document intelligence pipeline")]
pub struct Cli {
    /// Output format for data commands
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub format: Format,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ingest documents from a JSONL file (or stdin)
    Ingest(IngestArgs),
    /// Run the processing pipeline and wait for it to finish
    Refresh(RefreshArgs),
    /// Show corpus statistics
    Status,
    /// Semantic search over document artifacts
    Search(SearchArgs),
    /// Ask a question grounded in retrieved artifacts
    Ask(AskArgs),
    /// Trend + forecast insight for a category
    Insight(CategoryArgs),
    /// Quarterly and yearly historical trends for a category
    Trend(CategoryArgs),
    /// Pre-flight cost estimate for an insight or trend request
    Estimate(EstimateArgs),
    /// Run the JSON-RPC control surface on stdio
    Serve,
}

#[derive(Args)]
pub struct IngestArgs {
    /// JSONL file with one document per line; stdin when omitted
    pub file: Option<PathBuf>,

    /// Source name to register the documents under
    #[arg(long)]
    pub source: Option<String>,
}

#[derive(Args)]
pub struct RefreshArgs {
    /// Pipeline mode: full, embed_only, or process_pending
    #[arg(long, default_value = "process_pending")]
    pub mode: String,

    /// Fetch lookback window in days (full mode)
    #[arg(long, default_value_t = 1)]
    pub days: u32,

    /// Only fetch documents newer than each source's last fetch
    #[arg(long)]
    pub since_last_fetch: bool,

    /// Approve the cost gate without prompting
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(Args)]
pub struct SearchArgs {
    pub query: String,

    #[arg(long, default_value_t = 15)]
    pub top_k: usize,

    /// Restrict to documents published within the last N days
    #[arg(long)]
    pub days: Option<u32>,
}

#[derive(Args)]
pub struct AskArgs {
    pub question: String,

    #[arg(long)]
    pub top_k: Option<usize>,
}

#[derive(Args)]
pub struct CategoryArgs {
    pub category: String,

    /// Entity tag to narrow the focus (e.g. a malware family)
    #[arg(long)]
    pub entity: Option<String>,

    /// Restrict to documents published within the last N days
    /// (bypasses the insight cache)
    #[arg(long)]
    pub days: Option<u32>,
}

#[derive(Args)]
pub struct EstimateArgs {
    #[command(flatten)]
    pub category: CategoryArgs,

    /// What to estimate: insight or trend
    #[arg(long, default_value = "insight")]
    pub kind: String,
}
