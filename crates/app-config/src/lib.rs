// In crates/app-config/src/lib.rs

use std::path::Path;

use config::{Config, Environment, File};

pub mod error;
pub mod grid;
pub mod types;

// Re-export the most important types for easy access.
pub use error::{Error, Result};
pub use grid::expand_params;
pub use types::{
    AppSettings, AutoSelectSettings, BinanceSettings, CacheSettings, CostSettings, FillPolicy,
    LiquiditySettings, LoaderSettings, RunConfig, Settings, VolumeMeasure,
};

/// Loads the application settings from various sources.
///
/// This function orchestrates the layered configuration loading:
/// 1. Reads from a default `base.toml` file.
/// 2. Merges settings from an environment-specific file (e.g., `development.toml`).
/// 3. Merges settings from environment variables.
///
/// The result is validated before it is handed out and never mutated afterwards.
pub fn load_settings() -> Result<Settings> {
    // Get the current environment. Default to "development" if not set.
    let environment = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "development".into());

    let settings = Config::builder()
        // 1. Load the base configuration file.
        .add_source(File::with_name("config/base"))
        // 2. Load the environment-specific configuration file.
        .add_source(File::with_name(&format!("config/{}", environment)).required(false))
        // 3. Load settings from environment variables (e.g., `APP__CACHE__DIR=...`).
        // The prefix is `APP`, separator is `__`.
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let settings: Settings = settings.try_deserialize()?;
    settings.validate()?;

    Ok(settings)
}

/// Loads a run description (pairs, dates, strategies) from a TOML file.
pub fn load_run_config(path: impl AsRef<Path>) -> Result<RunConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_run_config(&content)
}

pub fn parse_run_config(content: &str) -> Result<RunConfig> {
    let config: RunConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn run_file_is_read_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            timeframe = "15m"
            start_date = "2025-01-01"
            end_date = "2025-01-07"
            pairs = ["SOLUSDT"]

            [[strategies]]
            name = "multi_horizon"
            "#
        )
        .unwrap();

        let run = load_run_config(file.path()).unwrap();
        assert_eq!(run.timeframe.to_string(), "15m");
        assert_eq!(run.strategies[0].name, "multi_horizon");
        assert!(run.range().unwrap().end > run.range().unwrap().start);
    }

    #[test]
    fn missing_run_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_run_config(dir.path().join("nope.toml"));
        assert!(matches!(result, Err(Error::IoError(_))));
    }
}
