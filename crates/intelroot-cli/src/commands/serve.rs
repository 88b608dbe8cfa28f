//! Run the JSON-RPC control surface on stdio

use anyhow::Result;
use intelroot_core::Config;
use intelroot_mcp::ServerState;
use std::path::PathBuf;

pub async fn run(db_path: PathBuf, config: Config) -> Result<()> {
    let state = ServerState::build(db_path, config)?;
    intelroot_mcp::start_server(state).await
}
