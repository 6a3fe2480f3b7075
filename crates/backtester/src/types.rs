// In crates/backtester/src/types.rs

use std::sync::Arc;

use analytics::PerformanceReport;
use core_types::{DateRange, Pair, SignalSeries, StrategyConfig, Timeframe};

use crate::error::RunError;

/// One (pair, strategy, parameter set) tuple to backtest.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSpec {
    pub pair: Pair,
    pub timeframe: Timeframe,
    pub range: DateRange,
    pub strategy: StrategyConfig,
}

impl RunSpec {
    pub fn new(pair: Pair, timeframe: Timeframe, range: DateRange, strategy: StrategyConfig) -> Self {
        Self { pair, timeframe, range, strategy }
    }
}

#[derive(Debug, Clone)]
pub struct RunSuccess {
    pub report: PerformanceReport,
    pub signals: SignalSeries,
}

/// The outcome of one `RunSpec`. Never modified once the coordinator returns it.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub pair: Pair,
    pub timeframe: Timeframe,
    pub range: DateRange,
    pub strategy: String,
    pub config: Arc<StrategyConfig>,
    pub outcome: Result<RunSuccess, RunError>,
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn report(&self) -> Option<&PerformanceReport> {
        self.outcome.as_ref().ok().map(|s| &s.report)
    }

    pub fn error(&self) -> Option<&RunError> {
        self.outcome.as_ref().err()
    }
}

/// Every result of a coordinator run, in the order the specs were given.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    results: Vec<RunResult>,
}

impl RunReport {
    pub(crate) fn new(results: Vec<RunResult>) -> Self {
        Self { results }
    }

    pub fn results(&self) -> &[RunResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<RunResult> {
        self.results
    }

    pub fn successes(&self) -> impl Iterator<Item = &RunResult> + '_ {
        self.results.iter().filter(|r| r.is_success())
    }

    pub fn failures(&self) -> impl Iterator<Item = &RunResult> + '_ {
        self.results.iter().filter(|r| !r.is_success())
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
