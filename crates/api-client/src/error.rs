// In crates/api-client/src/error.rs

use thiserror::Error;

/// Why a request to the market-data source did not produce bars.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("Failed to build the API client: {0}")]
    ClientBuild(String),
    #[error("Request failed: {0}")]
    Transport(String),
    #[error("Request timed out")]
    Timeout,
    #[error("Rate limited by the exchange (HTTP {status})")]
    RateLimited { status: u16 },
    #[error("Server error: HTTP {status}")]
    Server { status: u16 },
    #[error("Malformed response: {0}")]
    Malformed(String),
    #[error("API error: code {code}, msg: {msg}")]
    Api { code: i64, msg: String },
}

impl SourceError {
    /// Transient failures are worth another attempt; a rejected request is not.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SourceError::Api { .. } | SourceError::ClientBuild(_))
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout
        } else if err.is_decode() {
            SourceError::Malformed(err.to_string())
        } else {
            SourceError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Malformed(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SourceError>;
