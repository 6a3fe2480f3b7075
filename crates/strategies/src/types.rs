// In crates/strategies/src/types.rs

use core_types::Timeframe;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CrossoverSettings {
    #[serde(default = "default_short_window")]
    pub short_window: usize,
    #[serde(default = "default_long_window")]
    pub long_window: usize,
    /// Go short on a bearish cross instead of standing aside.
    #[serde(default)]
    pub allow_short: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MeanReversionSettings {
    #[serde(default = "default_lookback_window")]
    pub lookback_window: usize,
    /// Entry distance from the reference, in standard deviations.
    #[serde(default = "default_deviation_threshold")]
    pub deviation_threshold: f64,
    #[serde(default = "default_take_profit_multiple")]
    pub take_profit_multiple: f64,
    #[serde(default = "default_stop_loss_multiple")]
    pub stop_loss_multiple: f64,
    #[serde(default = "default_true")]
    pub allow_short: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MultiHorizonSettings {
    #[serde(default = "default_fast_period")]
    pub fast_period: usize,
    #[serde(default = "default_slow_period")]
    pub slow_period: usize,
    #[serde(default = "default_horizons")]
    pub horizons: Vec<Timeframe>,
    #[serde(default)]
    pub allow_short: bool,
}

fn default_short_window() -> usize { 50 }
fn default_long_window() -> usize { 200 }
fn default_lookback_window() -> usize { 50 }
fn default_deviation_threshold() -> f64 { 1.5 }
fn default_take_profit_multiple() -> f64 { 1.0 }
fn default_stop_loss_multiple() -> f64 { 1.5 }
fn default_fast_period() -> usize { 14 }
fn default_slow_period() -> usize { 50 }
fn default_true() -> bool { true }

fn default_horizons() -> Vec<Timeframe> {
    ["5m", "15m"].iter().filter_map(|s| s.parse().ok()).collect()
}
