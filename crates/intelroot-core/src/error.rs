//! Error types for intelroot

use thiserror::Error;

/// Result type alias using IntelrootError
pub type Result<T> = std::result::Result<T, IntelrootError>;

/// Error type alias for convenience
pub type Error = IntelrootError;

/// Exit codes for CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const NOT_FOUND: i32 = 2;
    pub const INVALID_INPUT: i32 = 3;
    pub const BUSY: i32 = 4;
}

/// Main error type for intelroot
#[derive(Debug, Error)]
pub enum IntelrootError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Rate limited by provider")]
    RateLimited {
        /// Server-supplied minimum wait, in seconds
        retry_after: Option<u64>,
    },

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(i64),

    #[error("Insufficient data: {count} contributing documents")]
    InsufficientData { count: usize },

    #[error("Pipeline already running")]
    PipelineBusy,

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("Scrape error: {0}")]
    Scrape(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl IntelrootError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::DocumentNotFound(_) => exit_codes::NOT_FOUND,
            Self::Config(_) | Self::InsufficientData { .. } => exit_codes::INVALID_INPUT,
            Self::PipelineBusy => exit_codes::BUSY,
            _ => exit_codes::GENERAL_ERROR,
        }
    }

    /// True for failures worth retrying with backoff (rate limits, timeouts,
    /// transient server trouble). Auth and malformed-request failures are
    /// terminal and must not be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Unavailable(_) => true,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_is_transient() {
        let err = IntelrootError::RateLimited { retry_after: None };
        assert!(err.is_transient());
    }

    #[test]
    fn test_provider_error_is_terminal() {
        let err = IntelrootError::Provider("invalid api key".into());
        assert!(!err.is_transient());
        let err = IntelrootError::MalformedResponse("not json".into());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(IntelrootError::PipelineBusy.exit_code(), exit_codes::BUSY);
        assert_eq!(
            IntelrootError::DocumentNotFound(7).exit_code(),
            exit_codes::NOT_FOUND
        );
    }
}
