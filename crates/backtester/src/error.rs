// In crates/backtester/src/error.rs

use core_types::ValidationError;
use data_loader::LoaderError;
use thiserror::Error;

/// Why a single run produced no metrics.
///
/// Carried inside its `RunResult`; one run failing never stops the others.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RunError {
    /// Unknown strategy, bad parameters or bad cost overrides. Raised before any fetch.
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    SourceUnavailable(LoaderError),

    /// Malformed bars or signals that do not line up with them.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Strategy failed: {0}")]
    Strategy(strategies::Error),

    #[error("Run aborted: {0}")]
    Internal(String),
}

impl RunError {
    /// Short tag for summaries and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RunError::Config(_) => "config",
            RunError::SourceUnavailable(_) => "source_unavailable",
            RunError::Validation(_) => "validation",
            RunError::Strategy(_) => "strategy",
            RunError::Internal(_) => "internal",
        }
    }
}

impl From<LoaderError> for RunError {
    fn from(err: LoaderError) -> Self {
        match err {
            LoaderError::Validation(e) => RunError::Validation(e),
            other => RunError::SourceUnavailable(other),
        }
    }
}

impl From<strategies::Error> for RunError {
    fn from(err: strategies::Error) -> Self {
        match err {
            strategies::Error::InvalidSignals(e) => RunError::Validation(e),
            e if e.is_config_error() => RunError::Config(e.to_string()),
            e => RunError::Strategy(e),
        }
    }
}

impl From<analytics::Error> for RunError {
    fn from(err: analytics::Error) -> Self {
        match err {
            analytics::Error::Misaligned(e) => RunError::Validation(e),
            analytics::Error::InvalidCosts(reason) => RunError::Config(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::Pair;

    #[test]
    fn errors_are_classified_by_cause() {
        let unknown: RunError = strategies::Error::UnknownStrategy("nope".to_string()).into();
        assert_eq!(unknown.kind(), "config");

        let short: RunError = strategies::Error::InsufficientHistory {
            strategy: "crossover",
            required: 200,
            available: 10,
        }
        .into();
        assert_eq!(short.kind(), "strategy");

        let empty: RunError = LoaderError::Validation(ValidationError::Empty { pair: Pair::new("BTCUSDT") }).into();
        assert_eq!(empty.kind(), "validation");

        let costs: RunError = analytics::Error::InvalidCosts("fee_rate".to_string()).into();
        assert_eq!(costs.kind(), "config");
    }
}
