// In crates/core-types/src/lib.rs

pub mod error;
pub mod signal;
pub mod strategy;
pub mod types;

// Re-export the most important types for easy access from other crates.
pub use error::{Error, Result, ValidationError};
pub use signal::{Signal, SignalKind, SignalPoint, SignalSeries};
pub use strategy::StrategyConfig;
pub use types::{Bar, CacheKey, DateRange, Gap, GapResolution, Pair, Series, TimeUnit, Timeframe};
