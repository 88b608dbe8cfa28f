//! OpenAI backend (chat completions + embeddings)

use super::{
    error_for_status, http_client, retry_after_secs, ChatMessage, Completion, EmbeddingsClient,
    GenerateRequest, Provider,
};
use crate::config::Config;
use crate::cost::TokenUsage;
use crate::error::{IntelrootError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub struct OpenAiProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    embeddings: EmbeddingsClient,
}

impl OpenAiProvider {
    pub fn new(config: &Config) -> Result<Self> {
        if config.openai.api_key.trim().is_empty() {
            return Err(IntelrootError::Config("openai api key not set".into()));
        }
        let http = http_client(config.pipeline.request_timeout_secs)?;
        Ok(Self {
            http: http.clone(),
            base_url: config.openai.base_url.clone(),
            api_key: config.openai.api_key.clone(),
            model: config.openai.model.clone(),
            embeddings: EmbeddingsClient::new(
                http,
                config.embeddings_url().to_string(),
                config.embeddings_api_key().to_string(),
                config.embedding.model.clone(),
                config.embedding.dimensions,
            ),
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn generate(&self, request: GenerateRequest) -> Result<Completion> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system {
            messages.push(ChatMessage::system(system.clone()));
        }
        messages.extend(request.messages);

        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request
                .json_mode
                .then_some(ResponseFormat { kind: "json_object" }),
        };

        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let retry_after = retry_after_secs(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, retry_after, body));
        }

        let parsed: ChatResponse = response.json().await?;
        let text = parsed
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| IntelrootError::MalformedResponse("empty completion".into()))?;

        let usage = parsed
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
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
