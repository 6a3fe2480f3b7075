// In app/src/report.rs

use analytics::PerformanceReport;
use backtester::{RankedRun, RunReport, RunResult};
use data_loader::LiquiditySelection;

/// How many ranked runs the summary shows.
const TOP_RUNS: usize = 5;

/// Prints every run in the order it was requested, failures included.
pub fn print_run_report(report: &RunReport) {
    println!("\n--- Backtest Results ---");
    println!("-----------------------------------");
    for result in report.results() {
        print_header(result);
        match &result.outcome {
            Ok(success) => print_metrics(&success.report),
            Err(e) => println!("  FAILED [{}]: {}", e.kind(), e),
        }
    }
    println!("-----------------------------------");
    println!(
        "{} run(s): {} succeeded, {} failed",
        report.len(),
        report.successes().count(),
        report.failures().count()
    );
}

fn print_header(result: &RunResult) {
    println!("\n[{} {} {}] {}", result.pair, result.timeframe, result.range, result.config.label());
}

fn print_metrics(report: &PerformanceReport) {
    println!("  Net P&L:             ${:.2} ({:.2}%)", report.net_pnl_absolute, report.net_pnl_percentage);
    println!("  Max Drawdown:        ${:.2} ({:.2}%)", report.max_drawdown_absolute, report.max_drawdown_percentage);
    println!("  Sharpe Ratio:        {:.3}", report.sharpe_ratio);
    println!("  Sortino Ratio:       {:.3}", report.sortino_ratio);
    println!("  Profit Factor:       {:.2}", report.profit_factor);
    println!("  Win Rate:            {:.2}%", report.win_rate);
    println!("  Total Trades:        {}", report.total_trades);
    println!("  Expectancy:          ${:.2}", report.expectancy);
    println!("  Exposure:            {:.1}%", report.exposure);
    println!("  Avg. Trade Duration: {:.1}s", report.avg_trade_duration_secs);
    println!("  Max DD Duration:     {}s", report.drawdown_duration_secs);
}

/// Helper function to print the ranked summary of successful runs.
pub fn print_ranking(ranked: &[RankedRun<'_>]) {
    println!("\n--- Ranked Summary ---");
    println!("-----------------------------------");
    println!("Top {} Runs by Score:", TOP_RUNS);

    for (i, run) in ranked.iter().take(TOP_RUNS).enumerate() {
        println!("\n[Rank {} | Score: {:.2}]", i + 1, run.score);
        println!("  - {} {}: {}", run.result.pair, run.result.timeframe, run.result.config.label());
        println!(
            "  - P&L: ${:.2} ({:.2}%) | Max Drawdown: {:.2}% | Sharpe: {:.2} | Trades: {}",
            run.report.net_pnl_absolute,
            run.report.net_pnl_percentage,
            run.report.max_drawdown_percentage,
            run.report.sharpe_ratio,
            run.report.total_trades
        );
    }
    println!("\n-----------------------------------");

    match ranked.first() {
        Some(best) => println!(
            "Best run: {} {}",
            best.result.pair,
            best.result.config.label()
        ),
        None => println!("No run passed the minimum trade threshold."),
    }
}

pub fn print_selection(selection: &LiquiditySelection) {
    println!("\n--- Liquid Pairs ---");
    for (pair, average) in &selection.eligible {
        println!("  {:<12} avg volume {:.2}", pair.to_string(), average);
    }
    if !selection.rejected.is_empty() {
        println!("Rejected:");
        for (pair, reason) in &selection.rejected {
            println!("  {:<12} {:?}", pair.to_string(), reason);
        }
    }
    println!("{} eligible, {} rejected", selection.eligible.len(), selection.rejected.len());
}
