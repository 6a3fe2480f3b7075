// In crates/app-config/src/types.rs

use serde::Deserialize;

use core_types::{DateRange, Pair, StrategyConfig, Timeframe};

use crate::error::{Error, Result};

/// Process-wide settings, built once at startup and shared read-only.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct Settings {
    /// The application's general settings.
    #[serde(default)]
    pub app: AppSettings,
    /// Settings for the Binance API.
    #[serde(default)]
    pub binance: BinanceSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub loader: LoaderSettings,
    #[serde(default)]
    pub liquidity: LiquiditySettings,
    #[serde(default)]
    pub costs: CostSettings,
}

impl Settings {
    /// Rejects global values no run could succeed with.
    pub fn validate(&self) -> Result<()> {
        if self.cache.dir.trim().is_empty() {
            return Err(invalid("cache.dir", "must not be empty"));
        }
        if self.loader.max_attempts == 0 {
            return Err(invalid("loader.max_attempts", "must be at least 1"));
        }
        if self.loader.max_concurrent_fetches == 0 {
            return Err(invalid("loader.max_concurrent_fetches", "must be at least 1"));
        }
        if self.loader.initial_backoff_ms > self.loader.max_backoff_ms {
            return Err(invalid("loader.initial_backoff_ms", "must not exceed loader.max_backoff_ms"));
        }
        if self.loader.fetch_timeout_secs == 0 {
            return Err(invalid("loader.fetch_timeout_secs", "must be at least 1"));
        }
        if self.binance.page_limit == 0 || self.binance.page_limit > 1000 {
            return Err(invalid("binance.page_limit", "must be within 1..=1000"));
        }
        if self.liquidity.window == 0 {
            return Err(invalid("liquidity.window", "must be at least 1"));
        }
        if !self.liquidity.volume_floor.is_finite() || self.liquidity.volume_floor < 0.0 {
            return Err(invalid("liquidity.volume_floor", "must be a non-negative number"));
        }
        check_rate("costs.fee_rate", self.costs.fee_rate)?;
        check_rate("costs.slippage_rate", self.costs.slippage_rate)?;
        if !(self.costs.initial_cash > 0.0) {
            return Err(invalid("costs.initial_cash", "must be positive"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> Error {
    Error::Invalid { field, reason: reason.to_string() }
}

fn check_rate(field: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() || !(0.0..1.0).contains(&value) {
        return Err(invalid(field, "must be within [0, 1)"));
    }
    Ok(())
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppSettings {
    /// The environment the application is running in (e.g., "development", "production").
    #[serde(default = "default_environment")]
    pub environment: String,
    /// The log level for the application.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Worker threads for signal generation and evaluation. 0 uses every core.
    #[serde(default)]
    pub worker_threads: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            log_level: default_log_level(),
            worker_threads: 0,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct BinanceSettings {
    /// The REST API base URL for Binance.
    #[serde(default = "default_rest_base_url")]
    pub rest_base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Bars per kline request (the exchange caps this at 1000).
    #[serde(default = "default_page_limit")]
    pub page_limit: u16,
}

impl Default for BinanceSettings {
    fn default() -> Self {
        Self {
            rest_base_url: default_rest_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            page_limit: default_page_limit(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct CacheSettings {
    /// Directory holding one record file per cached series.
    #[serde(default = "default_cache_dir")]
    pub dir: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { dir: default_cache_dir() }
    }
}

/// What the loader does with a hole wider than one bar interval.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FillPolicy {
    /// Fail validation for the series.
    #[default]
    Reject,
    /// Insert flat, zero-volume bars carrying the previous close.
    ForwardFill,
    /// Keep the hole and record it on the series.
    DropAndFlag,
}

#[derive(Deserialize, Debug, Clone)]
pub struct LoaderSettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Upper bound on a single source request.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
    #[serde(default)]
    pub fill_policy: FillPolicy,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            fill_policy: FillPolicy::default(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum VolumeMeasure {
    /// Volume in the base asset, as reported on the bar.
    Base,
    /// Base volume multiplied by the close price.
    #[default]
    Quote,
}

/// Liquidity floor used to decide which pairs are eligible for evaluation.
#[derive(Deserialize, Debug, Clone)]
pub struct LiquiditySettings {
    /// Number of trailing bars averaged.
    #[serde(default = "default_liquidity_window")]
    pub window: usize,
    /// The trailing average must be strictly greater than this.
    #[serde(default)]
    pub volume_floor: f64,
    #[serde(default)]
    pub measure: VolumeMeasure,
}

impl Default for LiquiditySettings {
    fn default() -> Self {
        Self {
            window: default_liquidity_window(),
            volume_floor: 0.0,
            measure: VolumeMeasure::default(),
        }
    }
}

/// Default cost assumptions; strategies may override fee and slippage.
#[derive(Deserialize, Debug, Clone)]
pub struct CostSettings {
    #[serde(default = "default_fee_rate")]
    pub fee_rate: f64,
    #[serde(default = "default_slippage_rate")]
    pub slippage_rate: f64,
    #[serde(default = "default_initial_cash")]
    pub initial_cash: f64,
}

impl Default for CostSettings {
    fn default() -> Self {
        Self {
            fee_rate: default_fee_rate(),
            slippage_rate: default_slippage_rate(),
            initial_cash: default_initial_cash(),
        }
    }
}

// --- Structs for run files ---

/// Automatic pair discovery used when a run file lists no pairs.
#[derive(Deserialize, Debug, Clone)]
pub struct AutoSelectSettings {
    pub quote_asset: String,
    #[serde(default = "default_auto_select_limit")]
    pub limit: usize,
}

/// The top-level description of a backtest job.
#[derive(Deserialize, Debug, Clone)]
pub struct RunConfig {
    pub timeframe: Timeframe,
    pub start_date: String,
    pub end_date: String,
    #[serde(default)]
    pub pairs: Vec<String>,
    #[serde(default)]
    pub auto_select: Option<AutoSelectSettings>,
    pub strategies: Vec<StrategyConfig>,
}

impl RunConfig {
    /// Checks the job-wide fields. Strategy parameters are checked per run.
    pub fn validate(&self) -> Result<()> {
        self.range()?;
        if self.pairs.is_empty() && self.auto_select.is_none() {
            return Err(invalid("pairs", "list pairs or configure [auto_select]"));
        }
        if self.strategies.is_empty() {
            return Err(invalid("strategies", "at least one [[strategies]] entry is required"));
        }
        if let Some(auto) = &self.auto_select {
            if auto.limit == 0 {
                return Err(invalid("auto_select.limit", "must be at least 1"));
            }
        }
        Ok(())
    }

    pub fn range(&self) -> Result<DateRange> {
        Ok(DateRange::from_dates(&self.start_date, &self.end_date)?)
    }

    pub fn pairs(&self) -> Vec<Pair> {
        self.pairs.iter().map(Pair::new).collect()
    }
}

/// Helper functions for serde defaults
fn default_environment() -> String { "development".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_rest_base_url() -> String { "https://api.binance.com".to_string() }
fn default_request_timeout_secs() -> u64 { 10 }
fn default_page_limit() -> u16 { 1000 }
fn default_cache_dir() -> String { "data".to_string() }
fn default_max_attempts() -> u32 { 4 }
fn default_initial_backoff_ms() -> u64 { 500 }
fn default_max_backoff_ms() -> u64 { 8_000 }
fn default_fetch_timeout_secs() -> u64 { 30 }
fn default_max_concurrent_fetches() -> usize { 8 }
fn default_liquidity_window() -> usize { 24 }
fn default_fee_rate() -> f64 { 0.001 }
fn default_slippage_rate() -> f64 { 0.0005 }
fn default_initial_cash() -> f64 { 10_000.0 }
fn default_auto_select_limit() -> usize { 100 }
