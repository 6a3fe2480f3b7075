// In crates/strategies/src/lib.rs

use core_types::{Series, SignalKind, SignalSeries, StrategyConfig, Timeframe};
use serde::de::DeserializeOwned;

pub mod crossover;
pub mod error;
pub mod factory;
pub mod indicators;
pub mod mean_reversion;
pub mod multi_horizon;
pub mod schema;
pub mod types;

// Re-export the most important types for easy access.
pub use crossover::Crossover;
pub use error::{Error, Result};
pub use factory::{STRATEGY_NAMES, strategy_for};
pub use mean_reversion::MeanReversionBand;
pub use multi_horizon::MultiHorizon;
pub use schema::{ParamKind, ParamSpec};

/// The universal interface for a signal-generating strategy.
///
/// Strategies are stateless: every call to `generate_signals` depends only on
/// its arguments, so one instance can serve many runs on many threads.
pub trait Strategy: Send + Sync {
    /// The name the strategy is registered under.
    fn name(&self) -> &'static str;

    /// Declared parameters with their types and valid ranges.
    fn schema(&self) -> &'static [ParamSpec];

    fn signal_kind(&self) -> SignalKind {
        SignalKind::Discrete
    }

    /// Bars needed before the first non-flat signal can appear.
    ///
    /// Also the full validation of `config`: an invalid config has no answer.
    fn min_history(&self, config: &StrategyConfig, timeframe: Timeframe) -> Result<usize>;

    /// Rejects a config before any data is fetched for it.
    fn validate(&self, config: &StrategyConfig, timeframe: Timeframe) -> Result<()> {
        self.min_history(config, timeframe).map(|_| ())
    }

    fn generate_signals(&self, series: &Series, config: &StrategyConfig) -> Result<SignalSeries>;
}

/// Checks `config.params` against the schema and decodes it into typed settings.
pub(crate) fn parse_settings<T: DeserializeOwned>(
    strategy: &'static str,
    schema: &[ParamSpec],
    config: &StrategyConfig,
) -> Result<T> {
    let invalid = |reason: String| Error::InvalidParams { strategy, reason };
    schema::check(&config.params, schema).map_err(invalid)?;
    config.params.clone().try_into().map_err(|e: toml::de::Error| invalid(e.message().to_string()))
}

pub(crate) fn ensure_history(strategy: &'static str, series: &Series, required: usize) -> Result<()> {
    if series.len() < required {
        return Err(Error::InsufficientHistory {
            strategy,
            required,
            available: series.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use core_types::{Bar, DateRange, Pair, Series, Timeframe};
    use rust_decimal::Decimal;
    use rust_decimal::prelude::FromPrimitive;

    /// A gap-free series with the given closes; high/low hug the close.
    pub fn series_from_closes(timeframe: &str, closes: &[f64]) -> Series {
        let tf: Timeframe = timeframe.parse().unwrap();
        let step = tf.duration_ms();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, close)| {
                let c = Decimal::from_f64(*close).unwrap();
                Bar {
                    open_time: i as i64 * step,
                    open: c,
                    high: c,
                    low: c,
                    close: c,
                    volume: Decimal::ONE,
                }
            })
            .collect();
        let range = DateRange::new(0, closes.len() as i64 * step).unwrap();
        Series::new(Pair::new("BTCUSDT"), tf, range, bars, vec![]).unwrap()
    }
}
