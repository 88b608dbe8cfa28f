//! Run the pipeline and wait for it to finish
//!
//! Triggers a background run, then polls the shared state handle. The
//! cost gate is approved automatically with --yes, otherwise the user
//! is prompted with the estimate.

use crate::app::RefreshArgs;
use anyhow::Result;
use intelroot_core::{Config, PipelineMode, PipelineParams, Stage, TriggerOutcome};
use intelroot_mcp::ServerState;
use std::path::PathBuf;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub async fn run(args: RefreshArgs, db_path: PathBuf, config: Config) -> Result<()> {
    let mode: PipelineMode = args.mode.parse()?;
    let state = ServerState::build(db_path, config)?;

    let params = PipelineParams {
        lookback_days: args.days,
        since_last_fetch: args.since_last_fetch,
    };

    if state.orchestrator.trigger(mode, params) == TriggerOutcome::AlreadyRunning {
        println!("A pipeline run is already in progress.");
        return Ok(());
    }

    let mut gate_answered = false;
    let mut last_stage = Stage::Idle;

    loop {
        let status = state.handle.status();

        if status.stage != last_stage {
            println!("stage: {}", status.stage);
            last_stage = status.stage;
        }

        if status.stage == Stage::CostGate && !gate_answered {
            let estimate = status.cost_estimate.unwrap_or(0.0);
            if args.yes {
                println!("Estimated summarization cost ${estimate:.4}, approving (--yes)");
                state.handle.approve_cost();
            } else if prompt_approval(estimate).await? {
                state.handle.approve_cost();
            } else {
                state.handle.decline_cost();
            }
            gate_answered = true;
        }

        if !state.handle.is_held() {
            break;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }

    let final_status = state.handle.status();
    match final_status.stage {
        Stage::Done => {
            if let Some(cost) = final_status.actual_cost {
                println!("Pipeline finished (actual cost ${cost:.4})");
            } else {
                println!("Pipeline finished");
            }
        }
        Stage::Aborted => println!("Pipeline aborted"),
        Stage::Error => {
            anyhow::bail!(
                "pipeline failed: {}",
                final_status.error.unwrap_or_else(|| "unknown error".into())
            );
        }
        other => println!("Pipeline ended in stage {other}"),
    }
    Ok(())
}

async fn prompt_approval(estimate: f64) -> Result<bool> {
    let answer = tokio::task::spawn_blocking(move || {
        use std::io::Write;
        print!("Estimated summarization cost ${estimate:.4}. Proceed? [y/N] ");
        std::io::stdout().flush().ok();
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).ok();
        line
    })
    .await?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
