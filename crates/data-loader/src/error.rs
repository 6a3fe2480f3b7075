// In crates/data-loader/src/error.rs

use core_types::{CacheKey, ValidationError};
use thiserror::Error;

/// Why a series could not be produced for one key.
///
/// Cloneable so every caller sharing an in-flight load receives the same outcome.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoaderError {
    #[error("Source unavailable for {key} after {attempts} attempt(s): {reason}")]
    SourceUnavailable {
        key: CacheKey,
        attempts: u32,
        reason: String,
    },
    #[error("Invalid market data: {0}")]
    Validation(#[from] ValidationError),
}

pub type Result<T> = std::result::Result<T, LoaderError>;
