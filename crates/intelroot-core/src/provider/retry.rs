//! Exponential backoff for transient provider failures

use crate::config::RetryConfig;
use crate::error::{IntelrootError, Result};
use std::future::Future;
use std::time::Duration;

/// Bounded retry with exponential backoff. Rate-limit hints from the
/// server take precedence over the computed delay.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(120),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_secs(config.base_delay_secs),
            max_delay: Duration::from_secs(config.max_delay_secs),
        }
    }
}

impl RetryPolicy {
    /// Delay before the given retry (attempt is 0-based): base doubling
    /// up to the ceiling, unless the server supplied a minimum wait.
    pub fn delay_for(&self, attempt: u32, error: &IntelrootError) -> Duration {
        if let IntelrootError::RateLimited {
            retry_after: Some(secs),
        } = error
        {
            return Duration::from_secs(*secs).min(self.max_delay);
        }
        let backoff = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        backoff.min(self.max_delay)
    }
}

/// Run `op` with bounded retries. Only transient errors (rate limits,
/// timeouts, 5xx) are retried; terminal errors surface immediately.
pub async fn with_backoff<T, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt + 1 < policy.max_attempts => {
                let delay = policy.delay_for(attempt, &e);
                tracing::warn!(
                    "{label}: transient failure (attempt {}/{}), retrying in {}s: {e}",
                    attempt + 1,
                    policy.max_attempts,
                    delay.as_secs()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
