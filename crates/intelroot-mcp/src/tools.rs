//! Control-surface tools: pipeline control, insight, trend, and search

use crate::protocol::{ToolDefinition, ToolResult};
use crate::ServerState;
use anyhow::anyhow;
use intelroot_core::{
    ask, category_insight, estimate, semantic_search, trend_analysis, ChatMessage, EstimateKind,
    InsightQuery, PipelineMode, PipelineParams, TriggerOutcome,
};
use serde_json::{json, Value};

fn str_arg(args: &Value, key: &str) -> Option<String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn u32_arg(args: &Value, key: &str) -> Option<u32> {
    args.get(key).and_then(|v| v.as_u64()).map(|v| v as u32)
}

fn insight_query(args: &Value) -> anyhow::Result<InsightQuery> {
    let category = str_arg(args, "category").ok_or_else(|| anyhow!("category is required"))?;
    let mut query = InsightQuery::new(category);
    query.entity = str_arg(args, "entity");
    query.window_days = u32_arg(args, "window_days").filter(|d| *d > 0);
    Ok(query)
}

pub fn trigger_tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: "trigger".to_string(),
        description: "Start a pipeline run. Returns immediately with started or already_running."
            .to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "mode": {
                    "type": "string",
                    "enum": ["full", "embed_only", "process_pending"],
                    "description": "Which stages to run (default full)"
                },
                "lookback_days": {"type": "integer", "description": "Fetch lookback window, 1-365"},
                "since_last_fetch": {"type": "boolean", "description": "Incremental fetch from each source's last fetch time"}
            }
        }),
    }
}

pub fn abort_tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: "abort".to_string(),
        description: "Request cooperative cancellation of the running pipeline. No-op when idle."
            .to_string(),
        input_schema: json!({"type": "object", "properties": {}}),
    }
}

pub fn status_tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: "status".to_string(),
        description: "Pipeline status: lock state, current stage, cost estimate and actual cost."
            .to_string(),
        input_schema: json!({"type": "object", "properties": {}}),
    }
}

pub fn cost_approve_tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: "cost_approve".to_string(),
        description: "Approve the pending cost estimate so the pipeline proceeds to summarize."
            .to_string(),
        input_schema: json!({"type": "object", "properties": {}}),
    }
}

pub fn cost_decline_tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: "cost_decline".to_string(),
        description: "Decline the pending cost estimate; the pipeline aborts without spending."
            .to_string(),
        input_schema: json!({"type": "object", "properties": {}}),
    }
}

pub fn insight_tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: "insight".to_string(),
        description: "Trend + forecast for a category, cached by content hash with a 24h TTL. \
                      Windowed requests always compute fresh."
            .to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "category": {"type": "string"},
                "entity": {"type": "string", "description": "Optional entity tag to narrow the focus"},
                "window_days": {"type": "integer", "description": "Restrict to documents from the last N days"}
            },
            "required": ["category"]
        }),
    }
}

pub fn period_trend_tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: "period_trend".to_string(),
        description: "Quarterly and yearly historical trends for a category; cached per period, \
                      regenerated only when the period's documents change."
            .to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "category": {"type": "string"},
                "entity": {"type": "string"},
                "window_days": {"type": "integer"}
            },
            "required": ["category"]
        }),
    }
}

pub fn estimate_tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: "estimate".to_string(),
        description: "Pre-flight cost estimate for an insight or trend request; makes no provider calls."
            .to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "category": {"type": "string"},
                "entity": {"type": "string"},
                "window_days": {"type": "integer"},
                "kind": {"type": "string", "enum": ["insight", "trend"]}
            },
            "required": ["category", "kind"]
        }),
    }
}

pub fn search_tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: "search".to_string(),
        description: "Semantic search over document artifacts by cosine similarity.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "query": {"type": "string"},
                "top_k": {"type": "integer", "description": "Results to return (default 15, max 50)"},
                "window_days": {"type": "integer"}
            },
            "required": ["query"]
        }),
    }
}

pub fn ask_tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: "ask".to_string(),
        description: "Answer a question grounded in retrieved document artifacts.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "question": {"type": "string"},
                "messages": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "role": {"type": "string"},
                            "content": {"type": "string"}
                        }
                    },
                    "description": "Full conversation; overrides question when present"
                },
                "top_k": {"type": "integer"}
            }
        }),
    }
}

pub async fn handle_trigger(state: &ServerState, args: Value) -> anyhow::Result<ToolResult> {
    let mode: PipelineMode = str_arg(&args, "mode")
        .as_deref()
        .unwrap_or("full")
        .parse()?;
    let params = PipelineParams {
        lookback_days: u32_arg(&args, "lookback_days").unwrap_or(1),
        since_last_fetch: args
            .get("since_last_fetch")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
    };

    let status = match state.orchestrator.trigger(mode, params) {
        TriggerOutcome::Started => "started",
        TriggerOutcome::AlreadyRunning => "already_running",
    };
    ToolResult::json(&json!({"status": status}))
}

pub async fn handle_abort(state: &ServerState) -> anyhow::Result<ToolResult> {
    state.handle.request_abort();
    ToolResult::json(&json!({"status": "ok"}))
}

pub async fn handle_status(state: &ServerState) -> anyhow::Result<ToolResult> {
    ToolResult::json(&state.handle.status())
}

pub async fn handle_cost_approve(state: &ServerState) -> anyhow::Result<ToolResult> {
    state.handle.approve_cost();
    ToolResult::json(&json!({"status": "ok"}))
}

pub async fn handle_cost_decline(state: &ServerState) -> anyhow::Result<ToolResult> {
    state.handle.decline_cost();
    ToolResult::json(&json!({"status": "ok"}))
}

pub async fn handle_insight(state: &ServerState, args: Value) -> anyhow::Result<ToolResult> {
    let query = insight_query(&args)?;
    let response = category_insight(
        &state.db,
        &state.client,
        &state.config.insight,
        &state.locks,
        &query,
    )
    .await?;
    ToolResult::json(&response)
}

pub async fn handle_period_trend(state: &ServerState, args: Value) -> anyhow::Result<ToolResult> {
    let query = insight_query(&args)?;
    let response = trend_analysis(
        &state.db,
        &state.client,
        &state.config.insight,
        &state.locks,
        &query,
    )
    .await?;
    ToolResult::json(&response)
}

pub async fn handle_estimate(state: &ServerState, args: Value) -> anyhow::Result<ToolResult> {
    let query = insight_query(&args)?;
    let kind = match str_arg(&args, "kind").as_deref() {
        Some("trend") => EstimateKind::Trend,
        Some("insight") | None => EstimateKind::Insight,
        Some(other) => return Err(anyhow!("unknown estimate kind: {other}")),
    };
    let response = estimate(
        &state.db,
        state.client.model_name(),
        kind,
        &query.category,
        query.entity.as_deref(),
        query.window_days,
        state.config.insight.trend_batch_size,
    )?;
    ToolResult::json(&response)
}

pub async fn handle_search(state: &ServerState, args: Value) -> anyhow::Result<ToolResult> {
    let query = str_arg(&args, "query").ok_or_else(|| anyhow!("query is required"))?;
    let top_k = args
        .get("top_k")
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .unwrap_or(intelroot_core::search::DEFAULT_TOP_K);
    let window_days = u32_arg(&args, "window_days").filter(|d| *d > 0);

    let results =
        semantic_search(&state.db, &state.client, &query, top_k, window_days).await?;
    ToolResult::json(&json!({"results": results}))
}

pub async fn handle_ask(state: &ServerState, args: Value) -> anyhow::Result<ToolResult> {
    let messages: Vec<ChatMessage> = match args.get("messages") {
        Some(value) => serde_json::from_value(value.clone())?,
        None => {
            let question =
                str_arg(&args, "question").ok_or_else(|| anyhow!("question or messages required"))?;
            vec![ChatMessage::user(question)]
        }
    };
    let top_k = args
        .get("top_k")
        .and_then(|v| v.as_u64())
        .map(|v| v as usize);

    let response = ask(
        &state.db,
        &state.client,
        &state.config.insight,
        &messages,
        top_k,
    )
    .await?;
    ToolResult::json(&response)
}
