// In crates/analytics/src/engine.rs

use crate::types::{EquityPoint, PerformanceReport, Trade};
use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;

/// The engine responsible for calculating performance metrics from trade data.
#[derive(Default)]
pub struct AnalyticsEngine;

impl AnalyticsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculates a full performance report from a set of trades and an equity curve.
    ///
    /// `periods_per_year` annualizes the Sharpe and Sortino ratios; `exposed_bars`
    /// is the number of equity points with an open position.
    pub fn calculate(
        &self,
        initial_capital: Decimal,
        trades: &[Trade],
        equity_curve: &[EquityPoint],
        periods_per_year: f64,
        exposed_bars: usize,
    ) -> PerformanceReport {
        let mut report = PerformanceReport::new();

        // 1. Final equity and net P&L (absolute & percentage)
        report.final_equity = equity_curve.last().map_or(initial_capital, |p| p.value);
        report.net_pnl_absolute = report.final_equity - initial_capital;
        if initial_capital > dec!(0) {
            report.net_pnl_percentage = (report.net_pnl_absolute / initial_capital)
                .to_f64()
                .unwrap_or(0.0)
                * 100.0;
        }

        // 2. Exposure
        if !equity_curve.is_empty() {
            report.exposure = exposed_bars as f64 / equity_curve.len() as f64 * 100.0;
        }

        // 3. Max drawdown (absolute & percentage) and its longest duration
        let mut peak_equity = initial_capital;
        let mut max_drawdown = dec!(0);
        let mut max_drawdown_pct = 0.0_f64;
        let mut peak_time = equity_curve.first().map(|p| p.timestamp);
        let mut drawdown_start = None;
        let mut longest_drawdown = chrono::Duration::zero();
        for point in equity_curve {
            if point.value >= peak_equity {
                if let Some(start) = drawdown_start.take() {
                    longest_drawdown = longest_drawdown.max(point.timestamp - start);
                }
                peak_equity = point.value;
                peak_time = Some(point.timestamp);
                continue;
            }
            // A drawdown lasts from the peak it fell from until equity recovers.
            if drawdown_start.is_none() {
                drawdown_start = peak_time;
            }
            let drawdown = peak_equity - point.value;
            max_drawdown = max_drawdown.max(drawdown);
            if peak_equity > dec!(0) {
                let pct = (drawdown / peak_equity).to_f64().unwrap_or(0.0) * 100.0;
                max_drawdown_pct = max_drawdown_pct.max(pct);
            }
        }
        if let (Some(start), Some(last)) = (drawdown_start, equity_curve.last()) {
            longest_drawdown = longest_drawdown.max(last.timestamp - start);
        }
        report.max_drawdown_absolute = max_drawdown;
        report.max_drawdown_percentage = max_drawdown_pct;
        report.drawdown_duration_secs = longest_drawdown.num_seconds();

        // 4. Sharpe & Sortino ratios from per-bar equity returns
        if equity_curve.len() > 1 {
            let returns: Vec<f64> = equity_curve
                .windows(2)
                .map(|w| {
                    if w[0].value > dec!(0) {
                        (w[1].value / w[0].value - dec!(1)).to_f64().unwrap_or(0.0)
                    } else {
                        0.0
                    }
                })
                .collect();
            let n = returns.len() as f64;
            let mean_return = returns.iter().sum::<f64>() / n;
            let annualize = periods_per_year.max(0.0).sqrt();

            let std_dev = (returns.iter().map(|r| (r - mean_return).powi(2)).sum::<f64>() / n).sqrt();
            report.sharpe_ratio = if std_dev > 0.0 { mean_return / std_dev * annualize } else { 0.0 };

            // Downside deviation: root mean square of the negative returns only.
            let negative: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
            let downside = if negative.is_empty() {
                0.0
            } else {
                (negative.iter().map(|r| r.powi(2)).sum::<f64>() / negative.len() as f64).sqrt()
            };
            report.sortino_ratio = if downside > 0.0 {
                mean_return / downside * annualize
            } else if mean_return > 0.0 {
                f64::INFINITY // No downside risk
            } else {
                0.0
            };
        }

        if trades.is_empty() {
            return report;
        }

        // 5. Trade statistics: count, win rate, profit factor, expectancy, duration
        report.total_trades = trades.len() as u32;

        let gross_profit: Decimal = trades.iter().map(|t| t.pnl).filter(|p| *p > dec!(0)).sum();
        let gross_loss: Decimal = trades.iter().map(|t| t.pnl).filter(|p| *p < dec!(0)).sum::<Decimal>().abs();
        let wins = trades.iter().filter(|t| t.pnl > dec!(0)).count();
        report.win_rate = wins as f64 / trades.len() as f64 * 100.0;
        report.profit_factor = if gross_loss > dec!(0) {
            (gross_profit / gross_loss).to_f64().unwrap_or(0.0)
        } else if gross_profit > dec!(0) {
            f64::INFINITY // Pure profit
        } else {
            0.0
        };

        let total_pnl: Decimal = trades.iter().map(|t| t.pnl).sum();
        report.expectancy = total_pnl / Decimal::from(trades.len());

        let total_duration_secs: i64 = trades.iter().map(|t| (t.exit_time - t.entry_time).num_seconds()).sum();
        report.avg_trade_duration_secs = total_duration_secs as f64 / trades.len() as f64;

        report
    }
}
