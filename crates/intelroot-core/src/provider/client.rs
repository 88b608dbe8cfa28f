//! Metered provider client
//!
//! Wraps the configured backend with retry/backoff and reports token
//! usage to the cost tracker exactly once per successful call, no matter
//! how many retries preceded success.

use super::retry::{with_backoff, RetryPolicy};
use super::{build_provider, Completion, GenerateRequest, Provider};
use crate::config::Config;
use crate::cost::CostTracker;
use crate::error::Result;
use std::sync::Arc;

#[derive(Clone)]
pub struct ModelClient {
    provider: Arc<dyn Provider>,
    tracker: Arc<CostTracker>,
    retry: RetryPolicy,
}

impl ModelClient {
    pub fn new(provider: Arc<dyn Provider>, tracker: Arc<CostTracker>, retry: RetryPolicy) -> Self {
        Self {
            provider,
            tracker,
            retry,
        }
    }

    /// Build from configuration with the closed backend set
    pub fn from_config(config: &Config, tracker: Arc<CostTracker>) -> Result<Self> {
        let provider = build_provider(config)?;
        Ok(Self::new(provider, tracker, RetryPolicy::from(&config.retry)))
    }

    pub fn tracker(&self) -> &Arc<CostTracker> {
        &self.tracker
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    pub fn embedding_model(&self) -> &str {
        self.provider.embedding_model()
    }

    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    /// Generate text with retries; usage is reported once on success
    pub async fn generate(&self, request: GenerateRequest) -> Result<Completion> {
        let completion = with_backoff(self.retry, "generate", || {
            self.provider.generate(request.clone())
        })
        .await?;
        self.tracker.add(completion.usage);
        Ok(completion)
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        Ok(vectors.pop().unwrap_or_default())
    }

    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        with_backoff(self.retry, "embed", || self.provider.embed_batch(texts)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::TokenUsage;
    use crate::error::IntelrootError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Provider that rate-limits a configurable number of times first
    struct FlakyProvider {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Provider for FlakyProvider {
        async fn generate(&self, _request: GenerateRequest) -> Result<Completion> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(IntelrootError::RateLimited { retry_after: None });
            }
            Ok(Completion {
                text: "ok".into(),
                usage: TokenUsage::new(100, 20),
            })
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.0; 4]).collect())
        }

        fn model_name(&self) -> &str {
            "flaky-model"
        }

        fn embedding_model(&self) -> &str {
            "flaky-embed"
        }

        fn dimensions(&self) -> usize {
            4
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn test_usage_reported_once_despite_retries() {
        let provider = Arc::new(FlakyProvider {
            failures: 2,
            calls: AtomicU32::new(0),
        });
        let tracker = Arc::new(CostTracker::new());
        let client = ModelClient::new(provider.clone(), tracker.clone(), fast_retry());

        let request = GenerateRequest::new(None, vec![super::super::ChatMessage::user("hi")]);
        let completion = client.generate(request).await.unwrap();

        assert_eq!(completion.text, "ok");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
        // two rate-limited attempts must not double-report usage
        assert_eq!(tracker.tokens(), TokenUsage::new(100, 20));
    }

    #[tokio::test]
    async fn test_no_usage_reported_on_terminal_failure() {
        let provider = Arc::new(FlakyProvider {
            failures: u32::MAX,
            calls: AtomicU32::new(0),
        });
        let tracker = Arc::new(CostTracker::new());
        let client = ModelClient::new(provider, tracker.clone(), fast_retry());

        let request = GenerateRequest::new(None, vec![super::super::ChatMessage::user("hi")]);
        assert!(client.generate(request).await.is_err());
        assert_eq!(tracker.tokens(), TokenUsage::default());
    }
}
