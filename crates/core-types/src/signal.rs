// In crates/core-types/src/signal.rs

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::types::Series;

/// A strategy's position decision for one bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Signal {
    Long,
    Short,
    Flat,
    /// A sized position in `[-1, 1]`, used by strategies with continuous output.
    Weight(f64),
}

impl Signal {
    /// Position exposure implied by this signal.
    pub fn weight(self) -> f64 {
        match self {
            Signal::Long => 1.0,
            Signal::Short => -1.0,
            Signal::Flat => 0.0,
            Signal::Weight(w) => w,
        }
    }

    pub fn is_flat(self) -> bool {
        self.weight() == 0.0
    }
}

/// How a strategy expresses its signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalKind {
    /// Only `Long`, `Short` and `Flat`.
    Discrete,
    /// Any weight in `[-1, 1]`.
    Continuous,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalPoint {
    pub open_time: i64,
    pub signal: Signal,
}

/// Signals aligned 1:1 with the bars of a [`Series`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSeries {
    kind: SignalKind,
    points: Vec<SignalPoint>,
}

impl SignalSeries {
    /// Pairs `signals` with the bars of `series`.
    ///
    /// The first `min_history - 1` entries are forced to `Flat` (insufficient history).
    pub fn new(
        series: &Series,
        kind: SignalKind,
        mut signals: Vec<Signal>,
        min_history: usize,
    ) -> Result<Self, ValidationError> {
        if signals.len() != series.len() {
            return Err(ValidationError::SignalLength {
                expected: series.len(),
                actual: signals.len(),
            });
        }

        for (index, signal) in signals.iter().enumerate() {
            if let Signal::Weight(w) = signal {
                if kind == SignalKind::Discrete {
                    return Err(ValidationError::InvalidSignal {
                        index,
                        reason: "weighted signal from a discrete strategy".to_string(),
                    });
                }
                if !w.is_finite() || !(-1.0..=1.0).contains(w) {
                    return Err(ValidationError::InvalidSignal {
                        index,
                        reason: format!("weight {w} outside [-1, 1]"),
                    });
                }
            }
        }

        let warmup = min_history.saturating_sub(1).min(signals.len());
        signals[..warmup].fill(Signal::Flat);

        let points = series
            .timestamps()
            .zip(signals)
            .map(|(open_time, signal)| SignalPoint { open_time, signal })
            .collect();

        Ok(Self { kind, points })
    }

    /// Re-checks that these signals line up with `series`, bar for bar.
    pub fn check_alignment(&self, series: &Series) -> Result<(), ValidationError> {
        if self.points.len() != series.len() {
            return Err(ValidationError::SignalLength {
                expected: series.len(),
                actual: self.points.len(),
            });
        }
        for (index, (point, open_time)) in self.points.iter().zip(series.timestamps()).enumerate() {
            if point.open_time != open_time {
                return Err(ValidationError::SignalMisaligned { index });
            }
        }
        Ok(())
    }

    pub fn kind(&self) -> SignalKind {
        self.kind
    }

    pub fn points(&self) -> &[SignalPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn signals(&self) -> impl Iterator<Item = Signal> + '_ {
        self.points.iter().map(|p| p.signal)
    }

    pub fn weights(&self) -> Vec<f64> {
        self.signals().map(Signal::weight).collect()
    }

    /// Index of the first non-flat entry, if any.
    pub fn first_active(&self) -> Option<usize> {
        self.points.iter().position(|p| !p.signal.is_flat())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Bar, DateRange, Pair, Timeframe};
    use rust_decimal_macros::dec;

    fn series(len: usize) -> Series {
        let tf: Timeframe = "1m".parse().unwrap();
        let step = tf.duration_ms();
        let bars = (0..len as i64)
            .map(|i| Bar {
                open_time: i * step,
                open: dec!(100),
                high: dec!(101),
                low: dec!(99),
                close: dec!(100),
                volume: dec!(1),
            })
            .collect();
        let range = DateRange::new(0, len as i64 * step).unwrap();
        Series::new(Pair::new("BTCUSDT"), tf, range, bars, vec![]).unwrap()
    }

    #[test]
    fn warmup_entries_are_forced_flat() {
        let s = series(5);
        let signals = SignalSeries::new(&s, SignalKind::Discrete, vec![Signal::Long; 5], 3).unwrap();
        let got: Vec<Signal> = signals.signals().collect();
        assert_eq!(got, vec![Signal::Flat, Signal::Flat, Signal::Long, Signal::Long, Signal::Long]);
        assert_eq!(signals.first_active(), Some(2));
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let s = series(4);
        let err = SignalSeries::new(&s, SignalKind::Discrete, vec![Signal::Flat; 3], 1).unwrap_err();
        assert_eq!(err, ValidationError::SignalLength { expected: 4, actual: 3 });
    }

    #[test]
    fn weights_are_range_checked() {
        let s = series(2);
        assert!(SignalSeries::new(&s, SignalKind::Continuous, vec![Signal::Weight(0.5), Signal::Weight(-1.0)], 1).is_ok());
        assert!(SignalSeries::new(&s, SignalKind::Continuous, vec![Signal::Weight(1.5), Signal::Flat], 1).is_err());
        assert!(SignalSeries::new(&s, SignalKind::Continuous, vec![Signal::Weight(f64::NAN), Signal::Flat], 1).is_err());
        assert!(SignalSeries::new(&s, SignalKind::Discrete, vec![Signal::Weight(0.5), Signal::Flat], 1).is_err());
    }

    #[test]
    fn alignment_detects_foreign_series() {
        let signals = SignalSeries::new(&series(3), SignalKind::Discrete, vec![Signal::Flat; 3], 1).unwrap();
        assert!(signals.check_alignment(&series(3)).is_ok());
        assert!(matches!(
            signals.check_alignment(&series(4)),
            Err(ValidationError::SignalLength { .. })
        ));
    }
}
