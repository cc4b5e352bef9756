//! Error types for the relay pipeline.
//!
//! Each pipeline stage has its own error enum so callers can branch on the
//! failure kind: the orchestrator logs and skips any [`FetchError`], while the
//! delivery engine treats [`SendError::SizeExceeded`] and
//! [`SendError::FormatInvalid`] as recoverable with a shortened message.
//! [`ConfigError`] is the only category that stops the process, and only
//! before the pipeline starts.

use std::time::Duration;
use thiserror::Error;

/// Failure to retrieve a source page.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("unexpected content type {0:?}")]
    ContentType(String),

    #[error("browser endpoint error (status {status}): {message}")]
    Browser { status: u16, message: String },

    #[error("request failed: {0}")]
    Other(String),
}

impl FetchError {
    /// Map a transport error from reqwest onto the fetch taxonomy.
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(timeout)
        } else if err.is_connect() {
            FetchError::Connect(err.to_string())
        } else {
            FetchError::Other(err.to_string())
        }
    }
}

/// Failure reported by the output channel for a single message.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SendError {
    #[error("message too long: {0}")]
    SizeExceeded(String),

    #[error("message formatting rejected: {0}")]
    FormatInvalid(String),

    #[error("rate limited (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },

    #[error("delivery failed: {0}")]
    Other(String),
}

/// A CSS selector that could not be compiled.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("invalid selector {selector:?}: {reason}")]
pub struct SelectorError {
    pub selector: String,
    pub reason: String,
}

/// Bootstrap errors: bad settings file, missing credentials, invalid sources.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("source {source_name:?}: {reason}")]
    Source { source_name: String, reason: String },

    #[error(transparent)]
    Selector(#[from] SelectorError),

    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse settings file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_messages() {
        assert_eq!(
            FetchError::Timeout(Duration::from_secs(15)).to_string(),
            "request timed out after 15s"
        );
        assert_eq!(
            FetchError::Status(503).to_string(),
            "unexpected HTTP status 503"
        );
        assert_eq!(
            FetchError::ContentType("application/json".into()).to_string(),
            "unexpected content type \"application/json\""
        );
    }

    #[test]
    fn test_selector_error_message() {
        let err = SelectorError {
            selector: "div[".into(),
            reason: "unexpected end of input".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid selector \"div[\": unexpected end of input"
        );
    }

    #[test]
    fn test_config_error_from_selector() {
        let err: ConfigError = SelectorError {
            selector: "::".into(),
            reason: "bad".into(),
        }
        .into();
        assert!(matches!(err, ConfigError::Selector(_)));
    }
}
