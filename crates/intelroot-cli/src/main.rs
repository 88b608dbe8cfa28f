//! Intelroot CLI
//!
//! Ingest, process, and query the document intelligence store.

use anyhow::Result;
use clap::Parser;
use intelroot_core::{Config, Database};

mod app;
mod commands;

use app::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    // Database path: INTELROOT_DB env var, else the default data dir
    let db_path = std::env::var("INTELROOT_DB")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| Database::default_path());
    let config = Config::load()?;

    match cli.command {
        Commands::Ingest(args) => commands::ingest::run(args, &db_path).await,
        Commands::Refresh(args) => commands::refresh::run(args, db_path, config).await,
        Commands::Status => commands::status::run(&db_path, cli.format).await,
        Commands::Search(args) => commands::search::run(args, db_path, config, cli.format).await,
        Commands::Ask(args) => commands::search::run_ask(args, db_path, config, cli.format).await,
        Commands::Insight(args) => {
            commands::insight::run_insight(args, db_path, config, cli.format).await
        }
        Commands::Trend(args) => {
            commands::insight::run_trend(args, db_path, config, cli.format).await
        }
        Commands::Estimate(args) => {
            commands::insight::run_estimate(args, db_path, config, cli.format).await
        }
        Commands::Serve => commands::serve::run(db_path, config).await,
    }
}
