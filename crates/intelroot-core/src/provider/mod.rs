//! Provider client layer
//!
//! A closed set of text-generation/embedding backends behind one trait.
//! The backend is a runtime configuration choice; retry/backoff and cost
//! reporting live in [`ModelClient`], not in the backends themselves.

mod anthropic;
mod client;
mod openai;
mod retry;

pub use anthropic::AnthropicProvider;
pub use client::ModelClient;
pub use openai::OpenAiProvider;
pub use retry::RetryPolicy;

use crate::config::Config;
use crate::cost::TokenUsage;
use crate::error::{IntelrootError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Which backend serves generation calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Anthropic,
}

impl std::str::FromStr for ProviderKind {
    type Err = IntelrootError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            other => Err(IntelrootError::Config(format!(
                "unknown provider: {other}"
            ))),
        }
    }
}

/// Chat message for generation requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// A single generation request
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub system: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Instruct the model to respond with valid JSON only
    pub json_mode: bool,
}

impl GenerateRequest {
    pub fn new(system: Option<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            system,
            messages,
            temperature: 0.3,
            max_tokens: 2000,
            json_mode: false,
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn json_mode(mut self, json_mode: bool) -> Self {
        self.json_mode = json_mode;
        self
    }
}

/// Result of a generation call
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

/// A text-generation/embedding backend
#[async_trait]
pub trait Provider: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<Completion>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn model_name(&self) -> &str;

    fn embedding_model(&self) -> &str;

    fn dimensions(&self) -> usize;
}

/// Build the configured backend. The set is closed and known at build
/// time; selection is a runtime parameter.
pub fn build_provider(config: &Config) -> Result<Arc<dyn Provider>> {
    match config.provider {
        ProviderKind::OpenAi => Ok(Arc::new(OpenAiProvider::new(config)?)),
        ProviderKind::Anthropic => Ok(Arc::new(AnthropicProvider::new(config)?)),
    }
}

/// Map a non-success HTTP response to the error taxonomy: 429 (and
/// Anthropic's 529) are rate limits, 5xx is transient unavailability,
/// everything else is a terminal provider error.
pub(crate) fn error_for_status(
    status: reqwest::StatusCode,
    retry_after: Option<u64>,
    body: String,
) -> IntelrootError {
    match status.as_u16() {
        429 | 529 => IntelrootError::RateLimited { retry_after },
        s if s >= 500 => IntelrootError::Unavailable(format!("HTTP {status}: {body}")),
        _ => IntelrootError::Provider(format!("HTTP {status}: {body}")),
    }
}

/// Parse a Retry-After header value as whole seconds
pub(crate) fn retry_after_secs(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}

pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Shared OpenAI-compatible embeddings endpoint. Both backends use this:
/// OpenAI against its own base URL, Anthropic against the configured
/// embeddings service.
pub(crate) struct EmbeddingsClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    dimensions: usize,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

impl EmbeddingsClient {
    pub(crate) fn new(
        http: reqwest::Client,
        url: String,
        api_key: String,
        model: String,
        dimensions: usize,
    ) -> Self {
        Self {
            http,
            url,
            api_key,
            model,
            dimensions,
        }
    }

    pub(crate) fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            http_client(config.pipeline.request_timeout_secs)?,
            config.embeddings_url().to_string(),
            config.embeddings_api_key().to_string(),
            config.embedding.model.clone(),
            config.embedding.dimensions,
        ))
    }

    pub(crate) fn model(&self) -> &str {
        &self.model
    }

    pub(crate) fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub(crate) async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/v1/embeddings", self.url.trim_end_matches('/'));
        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let retry_after = retry_after_secs(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, retry_after, body));
        }

        let parsed: EmbedResponse = response.json().await?;
        if parsed.data.len() != texts.len() {
            return Err(IntelrootError::MalformedResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }

        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!("openai".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!(
            "Anthropic".parse::<ProviderKind>().unwrap(),
            ProviderKind::Anthropic
        );
        assert!("mistral".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_error_for_status_taxonomy() {
        let err = error_for_status(reqwest::StatusCode::TOO_MANY_REQUESTS, Some(30), String::new());
        assert!(matches!(
            err,
            IntelrootError::RateLimited {
                retry_after: Some(30)
            }
        ));

        let err = error_for_status(
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            None,
            "oops".into(),
        );
        assert!(err.is_transient());

        let err = error_for_status(reqwest::StatusCode::UNAUTHORIZED, None, "bad key".into());
        assert!(!err.is_transient());
    }
}
