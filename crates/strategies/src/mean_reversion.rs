// In crates/strategies/src/mean_reversion.rs

use core_types::{Series, Signal, SignalKind, SignalSeries, StrategyConfig, Timeframe};

use crate::error::{Error, Result};
use crate::indicators::{rolling_std, rolling_vwap};
use crate::schema::ParamSpec;
use crate::types::MeanReversionSettings;
use crate::{Strategy, ensure_history, parse_settings};

const NAME: &str = "mean_reversion_band";

const SCHEMA: &[ParamSpec] = &[
    ParamSpec::integer("lookback_window", 2),
    ParamSpec::float("deviation_threshold", 0.0, None),
    ParamSpec::float("take_profit_multiple", 0.0, None),
    ParamSpec::float("stop_loss_multiple", 0.0, None),
    ParamSpec::flag("allow_short"),
];

/// Fades moves away from a rolling VWAP.
///
/// Enters long when the close sits more than `deviation_threshold` sample standard
/// deviations below the VWAP (short when above, if allowed). A position is
/// closed when price returns to the VWAP or moves `take_profit_multiple` /
/// `stop_loss_multiple` entry deviations from the entry price.
#[derive(Debug, Default, Clone, Copy)]
pub struct MeanReversionBand;

/// An open position: direction, entry close and the deviation at entry.
#[derive(Debug, Clone, Copy)]
struct Position {
    side: Signal,
    entry: f64,
    band: f64,
}

impl MeanReversionBand {
    fn settings(&self, config: &StrategyConfig) -> Result<MeanReversionSettings> {
        let settings: MeanReversionSettings = parse_settings(NAME, SCHEMA, config)?;
        for (name, value) in [
            ("deviation_threshold", settings.deviation_threshold),
            ("take_profit_multiple", settings.take_profit_multiple),
            ("stop_loss_multiple", settings.stop_loss_multiple),
        ] {
            if value <= 0.0 {
                return Err(Error::InvalidParams {
                    strategy: NAME,
                    reason: format!("{name} must be positive"),
                });
            }
        }
        Ok(settings)
    }
}

impl Position {
    fn should_exit(&self, close: f64, vwap: f64, settings: &MeanReversionSettings) -> bool {
        let take_profit = settings.take_profit_multiple * self.band;
        let stop_loss = settings.stop_loss_multiple * self.band;
        match self.side {
            Signal::Long => close >= vwap || close >= self.entry + take_profit || close <= self.entry - stop_loss,
            _ => close <= vwap || close <= self.entry - take_profit || close >= self.entry + stop_loss,
        }
    }
}

impl Strategy for MeanReversionBand {
    fn name(&self) -> &'static str {
        NAME
    }

    fn schema(&self) -> &'static [ParamSpec] {
        SCHEMA
    }

    fn min_history(&self, config: &StrategyConfig, _timeframe: Timeframe) -> Result<usize> {
        Ok(self.settings(config)?.lookback_window)
    }

    fn generate_signals(&self, series: &Series, config: &StrategyConfig) -> Result<SignalSeries> {
        let settings = self.settings(config)?;
        let required = settings.lookback_window;
        ensure_history(NAME, series, required)?;

        let closes = series.closes();
        let vwap = rolling_vwap(series.bars(), required);
        let deviation = rolling_std(&closes, required)
            .map_err(|reason| Error::InvalidParams { strategy: NAME, reason })?;

        let mut position: Option<Position> = None;
        let mut signals = Vec::with_capacity(closes.len());
        for i in 0..closes.len() {
            if i + 1 < required {
                signals.push(Signal::Flat);
                continue;
            }
            let (close, reference) = (closes[i], vwap[i]);
            // Float noise can push the variance below zero.
            let band = if deviation[i].is_finite() { deviation[i].max(0.0) } else { 0.0 };

            if let Some(open) = position {
                if open.should_exit(close, reference, &settings) {
                    position = None;
                    signals.push(Signal::Flat);
                } else {
                    signals.push(open.side);
                }
                continue;
            }

            let threshold = settings.deviation_threshold * band;
            let side = if band <= 0.0 {
                None
            } else if close < reference - threshold {
                Some(Signal::Long)
            } else if settings.allow_short && close > reference + threshold {
                Some(Signal::Short)
            } else {
                None
            };

            match side {
                Some(side) => {
                    position = Some(Position { side, entry: close, band });
                    signals.push(side);
                }
                None => signals.push(Signal::Flat),
            }
        }

        Ok(SignalSeries::new(series, SignalKind::Discrete, signals, required)?)
    }
}
