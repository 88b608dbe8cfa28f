//! Configuration management

use crate::error::Result;
use crate::provider::ProviderKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Which generation backend to use
    #[serde(default)]
    pub provider: ProviderKind,

    #[serde(default)]
    pub openai: OpenAiConfig,

    #[serde(default)]
    pub anthropic: AnthropicConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub insight: InsightConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_openai_model")]
    pub model: String,

    #[serde(default = "default_openai_url")]
    pub base_url: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            model: default_openai_model(),
            base_url: default_openai_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_anthropic_model")]
    pub model: String,

    #[serde(default = "default_anthropic_url")]
    pub base_url: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
            model: default_anthropic_model(),
            base_url: default_anthropic_url(),
        }
    }
}

/// Embedding service configuration. Defaults to the OpenAI embeddings
/// endpoint; any OpenAI-compatible service works (set `url` and `api_key`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Base URL override for the embeddings service
    #[serde(default)]
    pub url: Option<String>,

    /// API key override (falls back to the OpenAI key)
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_embedding_dims")]
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("INTELROOT_EMBEDDING_URL").ok(),
            api_key: None,
            model: default_embedding_model(),
            dimensions: default_embedding_dims(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay")]
    pub base_delay_secs: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay(),
            max_delay_secs: default_max_delay(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Bounded fan-out for the scrape stage
    #[serde(default = "default_scrape_concurrency")]
    pub scrape_concurrency: usize,

    /// Hard per-document timeout for the scrape stage, in seconds
    #[serde(default = "default_scrape_timeout")]
    pub scrape_timeout_secs: u64,

    /// HTTP request timeout for provider and scrape calls, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// How long the cost gate waits for approve/decline before aborting
    #[serde(default = "default_cost_gate_timeout")]
    pub cost_gate_timeout_secs: u64,

    #[serde(default = "default_summarize_batch")]
    pub summarize_batch: usize,

    #[serde(default = "default_embed_batch")]
    pub embed_batch: usize,

    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    #[serde(default = "default_fetch_interval")]
    pub fetch_interval_minutes: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scrape_concurrency: default_scrape_concurrency(),
            scrape_timeout_secs: default_scrape_timeout(),
            request_timeout_secs: default_request_timeout(),
            cost_gate_timeout_secs: default_cost_gate_timeout(),
            summarize_batch: default_summarize_batch(),
            embed_batch: default_embed_batch(),
            lookback_days: default_lookback_days(),
            fetch_interval_minutes: default_fetch_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightConfig {
    /// Minimum contributing documents before any insight call is made
    #[serde(default = "default_min_documents")]
    pub min_documents: usize,

    /// Newest-first cap on contributors to a single insight prompt
    #[serde(default = "default_max_contributors")]
    pub max_contributors: usize,

    /// Character budget for retrieval-grounded generation context
    #[serde(default = "default_context_budget")]
    pub context_budget_chars: usize,

    /// Periods larger than this are condensed in batches of the same size
    #[serde(default = "default_trend_batch")]
    pub trend_batch_size: usize,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            min_documents: default_min_documents(),
            max_contributors: default_max_contributors(),
            context_budget_chars: default_context_budget(),
            trend_batch_size: default_trend_batch(),
        }
    }
}

fn default_openai_model() -> String {
    std::env::var("INTELROOT_OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string())
}

fn default_openai_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_anthropic_model() -> String {
    std::env::var("INTELROOT_ANTHROPIC_MODEL")
        .unwrap_or_else(|_| "claude-3-5-haiku-20241022".to_string())
}

fn default_anthropic_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_embedding_model() -> String {
    std::env::var("INTELROOT_EMBEDDING_MODEL")
        .unwrap_or_else(|_| "text-embedding-3-small".to_string())
}

fn default_embedding_dims() -> usize {
    1536
}

fn default_max_attempts() -> u32 {
    4
}

fn default_base_delay() -> u64 {
    10
}

fn default_max_delay() -> u64 {
    120
}

fn default_scrape_concurrency() -> usize {
    5
}

fn default_scrape_timeout() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    20
}

fn default_cost_gate_timeout() -> u64 {
    300
}

fn default_summarize_batch() -> usize {
    10
}

fn default_embed_batch() -> usize {
    50
}

fn default_lookback_days() -> u32 {
    1
}

fn default_fetch_interval() -> u64 {
    30
}

fn default_min_documents() -> usize {
    3
}

fn default_max_contributors() -> usize {
    500
}

fn default_context_budget() -> usize {
    30_000
}

fn default_trend_batch() -> usize {
    50
}

impl Config {
    /// Load config from default path, falling back to defaults if absent
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path())
    }

    /// Load config from an explicit path
    pub fn load_from(path: PathBuf) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = serde_yaml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save config to default path
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::CONFIG_DIR_NAME)
            .join("config.yml")
    }

    /// Active generation model for the configured provider
    pub fn model_name(&self) -> &str {
        match self.provider {
            ProviderKind::OpenAi => &self.openai.model,
            ProviderKind::Anthropic => &self.anthropic.model,
        }
    }

    /// True if the configured provider has an API key set
    pub fn api_key_configured(&self) -> bool {
        match self.provider {
            ProviderKind::OpenAi => !self.openai.api_key.trim().is_empty(),
            ProviderKind::Anthropic => !self.anthropic.api_key.trim().is_empty(),
        }
    }

    /// Effective embeddings endpoint (falls back to the OpenAI base URL)
    pub fn embeddings_url(&self) -> &str {
        self.embedding.url.as_deref().unwrap_or(&self.openai.base_url)
    }

    /// Effective embeddings API key (falls back to the OpenAI key)
    pub fn embeddings_api_key(&self) -> &str {
        self.embedding.api_key.as_deref().unwrap_or(&self.openai.api_key)
    }
}
