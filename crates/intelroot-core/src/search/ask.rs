//! Retrieval-grounded question answering

use super::context::build_context;
use super::retrieval::{semantic_search, RankedDocument, DEFAULT_TOP_K};
use crate::config::InsightConfig;
use crate::db::Database;
use crate::error::{IntelrootError, Result};
use crate::insight::prompts::ANALYST_SYSTEM_PROMPT;
use crate::provider::{ChatMessage, GenerateRequest, ModelClient};
use serde::Serialize;

/// Only the trailing turns of a long conversation are forwarded
const MAX_CONVERSATION_MESSAGES: usize = 6;

#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub documents: Vec<RankedDocument>,
    pub model: String,
    pub actual_cost: f64,
}

/// Answer a conversation grounded in retrieved documents.
///
/// The latest user turn drives retrieval; the ranked artifacts are
/// packed into the system prompt under the context budget, and the last
/// few turns are forwarded for follow-up continuity.
pub async fn ask(
    db: &Database,
    client: &ModelClient,
    options: &InsightConfig,
    messages: &[ChatMessage],
    top_k: Option<usize>,
) -> Result<AskResponse> {
    let query = messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map(|m| m.content.clone())
        .ok_or_else(|| IntelrootError::Config("no user message in conversation".into()))?;

    let documents = semantic_search(
        db,
        client,
        &query,
        top_k.unwrap_or(DEFAULT_TOP_K),
        None,
    )
    .await?;

    let context = build_context(&documents, options.context_budget_chars);
    let system = format!("{ANALYST_SYSTEM_PROMPT}\n\nRETRIEVED ARTICLES:\n\n{context}");

    let filtered: Vec<&ChatMessage> = messages
        .iter()
        .filter(|m| m.role == "user" || m.role == "assistant")
        .collect();
    let recent: Vec<ChatMessage> = filtered
        .into_iter()
        .rev()
        .take(MAX_CONVERSATION_MESSAGES)
        .rev()
        .cloned()
        .collect();

    let before = client.tracker().tokens();
    let completion = client
        .generate(
            GenerateRequest::new(Some(system), recent)
                .temperature(0.3)
                .max_tokens(2000),
        )
        .await?;
    let usage = client.tracker().tokens().since(before);

    let model = client.model_name().to_string();
    Ok(AskResponse {
        answer: completion.text,
        documents,
        actual_cost: usage.cost(&model),
        model,
    })
}
