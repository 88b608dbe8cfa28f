//! Anthropic backend (messages API for generation; embeddings go through
//! the configured OpenAI-compatible embeddings endpoint)

use super::{
    error_for_status, http_client, retry_after_secs, ChatMessage, Completion, EmbeddingsClient,
    GenerateRequest, Provider,
};
use crate::config::Config;
use crate::cost::TokenUsage;
use crate::error::{IntelrootError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const ANTHROPIC_VERSION: &str = "2023-06-01";

const JSON_INSTRUCTION: &str =
    "IMPORTANT: You must respond with valid JSON only. No text before or after the JSON.";

pub struct AnthropicProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    embeddings: EmbeddingsClient,
}

impl AnthropicProvider {
    pub fn new(config: &Config) -> Result<Self> {
        if config.anthropic.api_key.trim().is_empty() {
            return Err(IntelrootError::Config("anthropic api key not set".into()));
        }
        Ok(Self {
            http: http_client(config.pipeline.request_timeout_secs)?,
            base_url: config.anthropic.base_url.clone(),
            api_key: config.anthropic.api_key.clone(),
            model: config.anthropic.model.clone(),
            embeddings: EmbeddingsClient::from_config(config)?,
        })
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

/// Merge consecutive same-role messages and ensure the first is from the
/// user; the messages API requires strictly alternating roles.
fn merge_consecutive(messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
    let mut result: Vec<ChatMessage> = Vec::with_capacity(messages.len());
    for msg in messages {
        match result.last_mut() {
            Some(last) if last.role == msg.role => {
                last.content.push_str("\n\n");
                last.content.push_str(&msg.content);
            }
            _ => result.push(msg),
        }
    }
    if result.first().map(|m| m.role.as_str()) != Some("user") {
        result.insert(
            0,
            ChatMessage::user("Please proceed with the following context."),
        );
    }
    result
}

#[async_trait]
impl Provider for AnthropicProvider {
    async fn generate(&self, request: GenerateRequest) -> Result<Completion> {
        // Fold system-role turns into the system string
        let mut system_parts: Vec<String> = request.system.into_iter().collect();
        let mut turns = Vec::new();
        for msg in request.messages {
            if msg.role == "system" {
                system_parts.push(msg.content);
            } else {
                turns.push(msg);
            }
        }

        if request.json_mode {
            system_parts.push(JSON_INSTRUCTION.to_string());
        }
        let system = (!system_parts.is_empty()).then(|| system_parts.join("\n\n"));

        if turns.is_empty() {
            turns.push(ChatMessage::user("Please proceed."));
        }
        let messages = merge_consecutive(turns);

        let body = MessagesRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            messages,
            temperature: request.temperature,
            system,
        };

        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let retry_after = retry_after_secs(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, retry_after, body));
        }

        let parsed: MessagesResponse = response.json().await?;
        let text = parsed
            .content
            .iter()
            .find(|block| block.kind == "text")
            .map(|block| block.text.clone())
            .ok_or_else(|| IntelrootError::MalformedResponse("no text block in response".into()))?;

        let usage = parsed
            .usage
            .map(|u| TokenUsage::new(u.input_tokens, u.output_tokens))
            .unwrap_or_default();

        Ok(Completion { text, usage })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embeddings.embed_batch(texts).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn embedding_model(&self) -> &str {
        self.embeddings.model()
    }

    fn dimensions(&self) -> usize {
        self.embeddings.dimensions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_consecutive_same_role() {
        let merged = merge_consecutive(vec![
            ChatMessage::user("first"),
            ChatMessage::user("second"),
            ChatMessage::assistant("reply"),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].content, "first\n\nsecond");
        assert_eq!(merged[1].role, "assistant");
    }

    #[test]
    fn test_merge_inserts_leading_user_turn() {
        let merged = merge_consecutive(vec![ChatMessage::assistant("reply")]);
        assert_eq!(merged[0].role, "user");
        assert_eq!(merged[1].role, "assistant");
    }

    #[test]
    fn test_merge_alternating_starts_with_user() {
        let merged = merge_consecutive(vec![
            ChatMessage::assistant("a"),
            ChatMessage::assistant("b"),
            ChatMessage::user("q"),
        ]);
        assert_eq!(merged[0].role, "user");
        let roles: Vec<&str> = merged.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "assistant", "user"]);
    }
}
