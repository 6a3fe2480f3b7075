// In crates/analytics/src/error.rs

use core_types::ValidationError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Signals do not line up with the price series: {0}")]
    Misaligned(#[from] ValidationError),
    #[error("Invalid cost model: {0}")]
    InvalidCosts(String),
}

pub type Result<T> = std::result::Result<T, Error>;
