// In crates/strategies/src/multi_horizon.rs

use core_types::{Series, Signal, SignalKind, SignalSeries, StrategyConfig, Timeframe};

use crate::error::{Error, Result};
use crate::indicators::sma;
use crate::schema::ParamSpec;
use crate::types::MultiHorizonSettings;
use crate::{Strategy, ensure_history, parse_settings};

const NAME: &str = "multi_horizon";

const SCHEMA: &[ParamSpec] = &[
    ParamSpec::integer("fast_period", 1),
    ParamSpec::integer("slow_period", 2),
    ParamSpec::timeframes("horizons"),
    ParamSpec::flag("allow_short"),
];

/// Momentum confirmed across several higher timeframes.
///
/// The base series is resampled to every horizon (last close per bucket) and
/// each horizon votes `sign(fast SMA - slow SMA)`. A base bar only sees a
/// horizon bucket once that bucket has closed, so no signal depends on data
/// from its own future. Long when every horizon votes up; short (if allowed)
/// when every horizon votes down; flat otherwise.
#[derive(Debug, Default, Clone, Copy)]
pub struct MultiHorizon;

impl MultiHorizon {
    fn settings(&self, config: &StrategyConfig, base: Timeframe) -> Result<MultiHorizonSettings> {
        let settings: MultiHorizonSettings = parse_settings(NAME, SCHEMA, config)?;
        let invalid = |reason: String| Error::InvalidParams { strategy: NAME, reason };

        if settings.fast_period >= settings.slow_period {
            return Err(invalid(format!(
                "fast_period ({}) must be less than slow_period ({})",
                settings.fast_period, settings.slow_period
            )));
        }
        if settings.horizons.len() < 2 {
            return Err(invalid("at least two horizons are required".to_string()));
        }
        if let Some(bad) = settings.horizons.iter().find(|h| !h.is_multiple_of(&base)) {
            return Err(invalid(format!("horizon {bad} is not a whole multiple of the base timeframe {base}")));
        }
        Ok(settings)
    }

    fn required_bars(settings: &MultiHorizonSettings, base: Timeframe) -> usize {
        let widest = settings
            .horizons
            .iter()
            .map(|h| (h.duration_ms() / base.duration_ms()) as usize)
            .max()
            .unwrap_or(1);
        settings.slow_period * widest + 1
    }
}

/// Per-bar vote of one horizon: `Some(+1 | -1 | 0)` once a decision is visible.
fn horizon_votes(series: &Series, horizon: Timeframe, fast: usize, slow: usize) -> Result<Vec<Option<i8>>> {
    let width = horizon.duration_ms();

    // Resample: one (bucket start, last close) per horizon bucket.
    let mut buckets: Vec<(i64, f64)> = Vec::new();
    for bar in series.bars() {
        let start = horizon.bucket_start(bar.open_time);
        match buckets.last_mut() {
            Some((last_start, close)) if *last_start == start => *close = bar.close_f64(),
            _ => buckets.push((start, bar.close_f64())),
        }
    }

    let closes: Vec<f64> = buckets.iter().map(|(_, close)| *close).collect();
    let invalid = |reason: String| Error::InvalidParams { strategy: NAME, reason };
    let fast_ma = sma(&closes, fast).map_err(invalid)?;
    let slow_ma = sma(&closes, slow).map_err(invalid)?;
    let decisions: Vec<Option<i8>> = (0..buckets.len())
        .map(|j| {
            (j + 1 >= slow).then(|| match fast_ma[j].partial_cmp(&slow_ma[j]) {
                Some(std::cmp::Ordering::Greater) => 1,
                Some(std::cmp::Ordering::Less) => -1,
                _ => 0,
            })
        })
        .collect();

    // Walk the base bars, advancing through buckets that have closed by each bar's open.
    let mut votes = Vec::with_capacity(series.len());
    let mut next_bucket = 0;
    let mut visible: Option<i8> = None;
    for bar in series.bars() {
        while next_bucket < buckets.len() && buckets[next_bucket].0 + width <= bar.open_time {
            visible = decisions[next_bucket];
            next_bucket += 1;
        }
        votes.push(visible);
    }
    Ok(votes)
}

impl Strategy for MultiHorizon {
    fn name(&self) -> &'static str {
        NAME
    }

    fn schema(&self) -> &'static [ParamSpec] {
        SCHEMA
    }

    fn min_history(&self, config: &StrategyConfig, timeframe: Timeframe) -> Result<usize> {
        let settings = self.settings(config, timeframe)?;
        Ok(Self::required_bars(&settings, timeframe))
    }

    fn generate_signals(&self, series: &Series, config: &StrategyConfig) -> Result<SignalSeries> {
        let base = series.timeframe();
        let settings = self.settings(config, base)?;
        let required = Self::required_bars(&settings, base);
        ensure_history(NAME, series, required)?;

        let per_horizon = settings
            .horizons
            .iter()
            .map(|h| horizon_votes(series, *h, settings.fast_period, settings.slow_period))
            .collect::<Result<Vec<_>>>()?;

        let signals = (0..series.len())
            .map(|i| {
                let votes: Vec<Option<i8>> = per_horizon.iter().map(|v| v[i]).collect();
                if votes.iter().all(|v| *v == Some(1)) {
                    Signal::Long
                } else if settings.allow_short && votes.iter().all(|v| *v == Some(-1)) {
                    Signal::Short
                } else {
                    Signal::Flat
                }
            })
            .collect();

        Ok(SignalSeries::new(series, SignalKind::Discrete, signals, required)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::series_from_closes;

    fn config(params: &str) -> StrategyConfig {
        StrategyConfig::new(NAME, toml::from_str(params).unwrap())
    }

    const PARAMS: &str = "fast_period = 2\nslow_period = 3\nhorizons = [\"2m\", \"4m\"]";

    #[test]
    fn uptrend_is_confirmed_only_after_the_widest_horizon_closes() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let series = series_from_closes("1m", &closes);
        let signals = MultiHorizon.generate_signals(&series, &config(PARAMS)).unwrap();

        // Third 4m bucket closes at minute 12.
        assert_eq!(signals.first_active(), Some(12));
        assert!(signals.signals().skip(12).all(|s| s == Signal::Long));
        assert_eq!(MultiHorizon.min_history(&config(PARAMS), "1m".parse().unwrap()), Ok(13));
    }

    #[test]
    fn downturn_without_shorting_is_flat() {
        // Long rise, then a sharp drop that both horizons see.
        let mut closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        closes.extend([110.0, 105.0, 100.0, 95.0, 90.0, 85.0]);
        let series = series_from_closes("1m", &closes);
        let signals: Vec<Signal> = MultiHorizon
            .generate_signals(&series, &config(PARAMS))
            .unwrap()
            .signals()
            .collect();

        assert_eq!(signals[29], Signal::Long);
        assert_eq!(signals[35], Signal::Flat);
    }

    #[test]
    fn unclosed_bucket_cannot_leak_into_earlier_bars() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + (i % 7) as f64).collect();
        let mut perturbed = closes.clone();
        // Bucket [32, 36) of the 4m horizon, and [34, 36) of the 2m one.
        perturbed[34] = 500.0;
        perturbed[35] = 1.0;

        let params = config(&format!("{PARAMS}\nallow_short = true"));
        let a: Vec<Signal> = MultiHorizon
            .generate_signals(&series_from_closes("1m", &closes), &params)
            .unwrap()
            .signals()
            .collect();
        let b: Vec<Signal> = MultiHorizon
            .generate_signals(&series_from_closes("1m", &perturbed), &params)
            .unwrap()
            .signals()
            .collect();

        assert_eq!(a[..36], b[..36]);
    }

    #[test]
    fn horizons_must_divide_by_the_base() {
        let err = MultiHorizon.validate(&config("horizons = [\"90m\", \"1h\"]"), "1h".parse().unwrap());
        assert!(matches!(err, Err(Error::InvalidParams { .. })));

        let err = MultiHorizon.validate(&config("horizons = [\"4h\"]"), "1h".parse().unwrap());
        assert!(matches!(err, Err(Error::InvalidParams { .. })));

        assert!(MultiHorizon.validate(&config("horizons = [\"4h\", \"1d\"]"), "1h".parse().unwrap()).is_ok());
    }
}
