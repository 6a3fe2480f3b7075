// In crates/core-types/src/error.rs

use thiserror::Error;

use crate::types::Pair;

/// Errors raised while parsing the primitive domain values (timeframes, dates, ranges).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid timeframe '{0}' (expected e.g. 1m, 15m, 4h, 1d, 1w)")]
    InvalidTimeframe(String),

    #[error("Invalid date '{0}' (expected YYYY-MM-DD)")]
    InvalidDate(String),

    #[error("Invalid date range: start {start} must be before end {end}")]
    InvalidRange { start: i64, end: i64 },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Malformed bar data or a signal that does not line up with its series.
///
/// Never retried: the caller gets it back with the offending pair identified.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("No bars received for {pair}")]
    Empty { pair: Pair },

    #[error("{pair}: bar at {open_time} has a non-positive {field} price")]
    NonPositivePrice {
        pair: Pair,
        open_time: i64,
        field: &'static str,
    },

    #[error("{pair}: bar at {open_time} has negative volume")]
    NegativeVolume { pair: Pair, open_time: i64 },

    #[error("{pair}: bar at {open_time} has high/low inconsistent with open/close")]
    InconsistentRange { pair: Pair, open_time: i64 },

    #[error("{pair}: duplicate timestamp {open_time}")]
    Duplicate { pair: Pair, open_time: i64 },

    #[error("{pair}: timestamp {open_time} is earlier than the previous bar")]
    NonMonotonic { pair: Pair, open_time: i64 },

    #[error("{pair}: bar at {open_time} lies outside the requested range")]
    OutOfRange { pair: Pair, open_time: i64 },

    #[error("{pair}: bar at {open_time} is not aligned to the series interval")]
    IrregularSpacing { pair: Pair, open_time: i64 },

    #[error("{pair}: {missing} bar(s) missing after {after}")]
    Gap { pair: Pair, after: i64, missing: u32 },

    #[error("{pair}: {missing} bar(s) missing from {start} at the edge of the requested range")]
    EdgeGap { pair: Pair, start: i64, missing: u32 },

    #[error("Signal series has {actual} entries but the price series has {expected}")]
    SignalLength { expected: usize, actual: usize },

    #[error("Signal at index {index} does not match the price series timestamp")]
    SignalMisaligned { index: usize },

    #[error("Signal at index {index} is invalid: {reason}")]
    InvalidSignal { index: usize, reason: String },
}
