// In crates/strategies/src/crossover.rs

use core_types::{Series, Signal, SignalKind, SignalSeries, StrategyConfig, Timeframe};

use crate::error::{Error, Result};
use crate::indicators::sma;
use crate::schema::ParamSpec;
use crate::types::CrossoverSettings;
use crate::{Strategy, ensure_history, parse_settings};

const NAME: &str = "crossover";

const SCHEMA: &[ParamSpec] = &[
    ParamSpec::integer("short_window", 1),
    ParamSpec::integer("long_window", 2),
    ParamSpec::flag("allow_short"),
];

/// Dual moving-average crossover.
///
/// Long while the short average is above the long one; short (or flat when
/// shorting is disabled) while it is below. An exact tie keeps the previous
/// signal.
#[derive(Debug, Default, Clone, Copy)]
pub struct Crossover;

impl Crossover {
    fn settings(&self, config: &StrategyConfig) -> Result<CrossoverSettings> {
        let settings: CrossoverSettings = parse_settings(NAME, SCHEMA, config)?;
        if settings.short_window >= settings.long_window {
            return Err(Error::InvalidParams {
                strategy: NAME,
                reason: format!(
                    "short_window ({}) must be less than long_window ({})",
                    settings.short_window, settings.long_window
                ),
            });
        }
        Ok(settings)
    }
}

impl Strategy for Crossover {
    fn name(&self) -> &'static str {
        NAME
    }

    fn schema(&self) -> &'static [ParamSpec] {
        SCHEMA
    }

    fn min_history(&self, config: &StrategyConfig, _timeframe: Timeframe) -> Result<usize> {
        Ok(self.settings(config)?.long_window)
    }

    fn generate_signals(&self, series: &Series, config: &StrategyConfig) -> Result<SignalSeries> {
        let settings = self.settings(config)?;
        let required = settings.long_window;
        ensure_history(NAME, series, required)?;

        let closes = series.closes();
        let invalid = |reason: String| Error::InvalidParams { strategy: NAME, reason };
        let short = sma(&closes, settings.short_window).map_err(invalid)?;
        let long = sma(&closes, settings.long_window).map_err(invalid)?;

        let bearish = if settings.allow_short { Signal::Short } else { Signal::Flat };
        let mut current = Signal::Flat;
        let signals = short
            .iter()
            .zip(&long)
            .enumerate()
            .map(|(i, (s, l))| {
                if i + 1 < required {
                    return Signal::Flat;
                }
                if s > l {
                    current = Signal::Long;
                } else if s < l {
                    current = bearish;
                }
                current
            })
            .collect();

        Ok(SignalSeries::new(series, SignalKind::Discrete, signals, required)?)
    }
}
