// In crates/app-config/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to load configuration")]
    LoadError(#[from] config::ConfigError),

    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Invalid run file: {0}")]
    InvalidRun(#[from] core_types::Error),

    #[error("Invalid parameter grid for `{param}`: {reason}")]
    InvalidGrid { param: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
