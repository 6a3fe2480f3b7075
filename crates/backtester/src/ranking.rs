// In crates/backtester/src/ranking.rs

use analytics::PerformanceReport;

use crate::types::{RunReport, RunResult};

#[derive(Debug, Clone, Copy)]
pub struct RankedRun<'a> {
    pub score: f64,
    pub result: &'a RunResult,
    pub report: &'a PerformanceReport,
}

/// Scores the successful runs and orders them best first.
///
/// Runs with fewer than `min_trades` closed trades are left out.
pub fn rank_runs(report: &RunReport, min_trades: u32) -> Vec<RankedRun<'_>> {
    let mut ranked: Vec<RankedRun<'_>> = report
        .successes()
        .filter_map(|result| {
            let report = result.report()?;
            if report.total_trades < min_trades {
                return None;
            }
            Some(RankedRun {
                score: calculate_score(report),
                result,
                report,
            })
        })
        .collect();

    tracing::debug!(
        successful = report.successes().count(),
        ranked = ranked.len(),
        "Finished scoring runs."
    );

    // Higher is better.
    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    ranked
}

/// The multi-objective scoring function. Higher scores are better.
pub fn calculate_score(report: &PerformanceReport) -> f64 {
    const PROFIT_FACTOR_WEIGHT: f64 = 40.0;
    const SHARPE_RATIO_WEIGHT: f64 = 30.0;
    const MAX_DRAWDOWN_WEIGHT: f64 = -35.0;
    const RETURN_WEIGHT: f64 = 15.0;

    // Cap values so one outlier metric cannot dominate.
    let capped_profit_factor = sanitize(report.profit_factor).min(5.0);
    let capped_sharpe = sanitize(report.sharpe_ratio).clamp(-5.0, 5.0);
    let normalized_drawdown = sanitize(report.max_drawdown_percentage) / 100.0;
    let normalized_return = sanitize(report.net_pnl_percentage).clamp(-100.0, 100.0) / 100.0;

    (capped_profit_factor * PROFIT_FACTOR_WEIGHT)
        + (capped_sharpe * SHARPE_RATIO_WEIGHT)
        + (normalized_drawdown * MAX_DRAWDOWN_WEIGHT)
        + (normalized_return * RETURN_WEIGHT)
}

// Profit factor is infinite when there are no losing trades.
fn sanitize(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else if value.is_infinite() {
        value.signum() * f64::MAX
    } else {
        value
    }
}
