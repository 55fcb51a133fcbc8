// src/error/mod.rs
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum EnrichError {
    /// Token endpoint answered with a non-success status
    #[error("Authentication failed with status code: {status}")]
    Auth { status: u16, body: String },

    /// Upstream answered 429; the row is abandoned without retry
    #[error("Rate limit exceeded for {endpoint} API call")]
    RateLimitExceeded { endpoint: &'static str },

    /// Connection, TLS or protocol failure
    #[error("Transport Error: {0}")]
    Transport(String),

    /// A single HTTP call exceeded its timeout
    #[error("Timeout Error: {0}")]
    Timeout(String),

    /// Response body did not have the expected structure
    #[error("Malformed {endpoint} response: {detail}")]
    MalformedResponse {
        endpoint: &'static str,
        detail: String,
    },

    /// Configuration errors
    #[error("Config Error: {0}")]
    Config(String),

    #[error("IO Error: {0}")]
    Io(String),

    #[error("CSV Error: {0}")]
    Csv(String),
}

impl From<serde_json::Error> for EnrichError {
    fn from(err: serde_json::Error) -> Self {
        EnrichError::MalformedResponse {
            endpoint: "json",
            detail: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for EnrichError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            EnrichError::Timeout(err.to_string())
        } else {
            EnrichError::Transport(err.to_string())
        }
    }
}

impl From<csv::Error> for EnrichError {
    fn from(err: csv::Error) -> Self {
        EnrichError::Csv(err.to_string())
    }
}

impl From<std::io::Error> for EnrichError {
    fn from(err: std::io::Error) -> Self {
        EnrichError::Io(err.to_string())
    }
}

impl EnrichError {
    /// Attaches the endpoint name to a JSON decoding failure.
    pub fn malformed(endpoint: &'static str, detail: impl std::fmt::Display) -> Self {
        EnrichError::MalformedResponse {
            endpoint,
            detail: detail.to_string(),
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, EnrichError::MalformedResponse { .. })
    }

    /// Short label for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            EnrichError::Auth { .. } => "auth_failure",
            EnrichError::RateLimitExceeded { .. } => "rate_limit_exceeded",
            EnrichError::Transport(_) => "transport",
            EnrichError::Timeout(_) => "timeout",
            EnrichError::MalformedResponse { .. } => "malformed_response",
            EnrichError::Config(_) => "config",
            EnrichError::Io(_) => "io",
            EnrichError::Csv(_) => "csv",
        }
    }
}
