// In crates/cache-store/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Cache I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to encode cache record: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
