//! Crate-wide error types.

use thiserror::Error;

/// Top-level error for all fallible operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success API response. 5xx and 429 are retried by the HTTP
    /// layer; anything else propagates immediately.
    #[error("API error: status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Research(#[from] ResearchError),

    #[error("a scan is already in progress")]
    ScanInProgress,

    #[error("Execution error: {0}")]
    Execution(String),
}

/// Configuration loading and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required configuration: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(std::io::Error),
}

/// Failures of the blind estimation pipeline.
///
/// These are data errors: the offending market is logged and skipped,
/// the scan continues.
#[derive(Error, Debug)]
pub enum ResearchError {
    #[error("no JSON object found in model response: {snippet}")]
    NoJson { snippet: String },

    #[error("model returned no text content")]
    EmptyResponse,

    #[error("batch did not finish within {timeout_secs}s (cancelled)")]
    BatchTimeout { timeout_secs: u64 },

    #[error("batch failed: {0}")]
    BatchFailed(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True when the operation may succeed if retried (connection
    /// failures, timeouts, 5xx and 429 responses).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_connect() || e.is_timeout(),
            Self::Api { status, .. } => *status >= 500 || *status == 429,
            Self::Connection(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_5xx_is_transient() {
        let err = Error::Api {
            status: 503,
            body: "unavailable".to_string(),
        };
        assert!(err.is_transient());
    }

    #[test]
    fn api_429_is_transient() {
        let err = Error::Api {
            status: 429,
            body: "rate limited".to_string(),
        };
        assert!(err.is_transient());
    }

    #[test]
    fn api_4xx_is_not_transient() {
        for status in [400, 401, 403, 404, 422] {
            let err = Error::Api {
                status,
                body: String::new(),
            };
            assert!(!err.is_transient(), "status {status} must not retry");
        }
    }

    #[test]
    fn research_errors_are_not_transient() {
        let err = Error::Research(ResearchError::EmptyResponse);
        assert!(!err.is_transient());
    }
}
