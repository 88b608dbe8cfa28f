//! Semantic search and grounded Q&A

use crate::app::{AskArgs, Format, SearchArgs};
use anyhow::Result;
use intelroot_core::{ask, semantic_search, ChatMessage, Config};
use intelroot_mcp::ServerState;
use std::path::PathBuf;

pub async fn run(args: SearchArgs, db_path: PathBuf, config: Config, format: Format) -> Result<()> {
    let state = ServerState::build(db_path, config)?;
    let results = semantic_search(
        &state.db,
        &state.client,
        &args.query,
        args.top_k,
        args.days,
    )
    .await?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&results)?),
        Format::Text => {
            if results.is_empty() {
                println!("No results.");
            }
            for (i, hit) in results.iter().enumerate() {
                let date = hit
                    .published_at
                    .map(|dt| dt.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "unknown".into());
                println!("{}. [{:.4}] {} ({date})", i + 1, hit.score, hit.title);
                println!("   {}", hit.url);
            }
        }
    }
    Ok(())
}

pub async fn run_ask(args: AskArgs, db_path: PathBuf, config: Config, format: Format) -> Result<()> {
    let state = ServerState::build(db_path, config)?;
    let response = ask(
        &state.db,
        &state.client,
        &state.config.insight,
        &[ChatMessage::user(args.question)],
        args.top_k,
    )
    .await?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&response)?),
        Format::Text => {
            println!("{}", response.answer);
            println!();
            println!(
                "({} documents retrieved, cost ${:.4})",
                response.documents.len(),
                response.actual_cost
            );
        }
    }
    Ok(())
}
