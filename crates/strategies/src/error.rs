// In crates/strategies/src/error.rs

use core_types::ValidationError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("Invalid parameters for {strategy}: {reason}")]
    InvalidParams { strategy: &'static str, reason: String },

    #[error("{strategy} needs at least {required} bars, series has {available}")]
    InsufficientHistory {
        strategy: &'static str,
        required: usize,
        available: usize,
    },

    #[error("Strategy produced invalid signals: {0}")]
    InvalidSignals(#[from] ValidationError),
}

impl Error {
    /// True for problems with the configuration itself, as opposed to the data it met.
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::UnknownStrategy(_) | Error::InvalidParams { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
