//! Category insight, historical trends, and estimates

use crate::app::{CategoryArgs, EstimateArgs, Format};
use anyhow::Result;
use intelroot_core::{
    category_insight, estimate, trend_analysis, EstimateKind, InsightQuery,
};
use intelroot_core::Config;
use intelroot_mcp::ServerState;
use std::path::PathBuf;

fn query_from(args: &CategoryArgs) -> InsightQuery {
    let mut query = InsightQuery::new(args.category.clone());
    query.entity = args.entity.clone();
    query.window_days = args.days.filter(|d| *d > 0);
    query
}

pub async fn run_insight(
    args: CategoryArgs,
    db_path: PathBuf,
    config: Config,
    format: Format,
) -> Result<()> {
    let state = ServerState::build(db_path, config)?;
    let response = category_insight(
        &state.db,
        &state.client,
        &state.config.insight,
        &state.locks,
        &query_from(&args),
    )
    .await?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&response)?),
        Format::Text => {
            println!("## Trend\n\n{}\n", response.trend);
            println!("## Forecast\n\n{}\n", response.forecast);
            println!(
                "({} documents, {}, cost ${:.4})",
                response.contributing_count,
                if response.cached { "cached" } else { "generated" },
                response.actual_cost
            );
        }
    }
    Ok(())
}

pub async fn run_trend(
    args: CategoryArgs,
    db_path: PathBuf,
    config: Config,
    format: Format,
) -> Result<()> {
    let state = ServerState::build(db_path, config)?;
    let response = trend_analysis(
        &state.db,
        &state.client,
        &state.config.insight,
        &state.locks,
        &query_from(&args),
    )
    .await?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&response)?),
        Format::Text => {
            for entry in &response.quarterly {
                println!(
                    "## {} ({} documents)\n\n{}\n",
                    entry.period, entry.contributing_count, entry.trend_text
                );
            }
            for entry in &response.yearly {
                println!(
                    "## Year {} ({} documents)\n\n{}\n",
                    entry.period, entry.contributing_count, entry.trend_text
                );
            }
            println!("(cost ${:.4})", response.actual_cost);
        }
    }
    Ok(())
}

pub async fn run_estimate(
    args: EstimateArgs,
    db_path: PathBuf,
    config: Config,
    format: Format,
) -> Result<()> {
    let state = ServerState::build(db_path, config)?;
    let kind = match args.kind.as_str() {
        "trend" => EstimateKind::Trend,
        _ => EstimateKind::Insight,
    };
    let query = query_from(&args.category);
    let response = estimate(
        &state.db,
        state.client.model_name(),
        kind,
        &query.category,
        query.entity.as_deref(),
        query.window_days,
        state.config.insight.trend_batch_size,
    )?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&response)?),
        Format::Text => {
            println!(
                "{} documents, estimated cost ${:.4} ({})",
                response.contributing_count, response.estimated_cost, response.model
            );
            if let Some((quarters, years)) = response.periods {
                println!("{quarters} quarters, {years} years");
            }
        }
    }
    Ok(())
}
