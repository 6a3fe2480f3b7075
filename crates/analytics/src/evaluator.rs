// In crates/analytics/src/evaluator.rs

use chrono::{DateTime, TimeZone, Utc};
use core_types::{Series, Signal, SignalSeries};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

use crate::engine::AnalyticsEngine;
use crate::error::Result;
use crate::types::{CostModel, EquityPoint, PerformanceReport, Trade};

const MS_PER_YEAR: f64 = 365.0 * 24.0 * 3600.0 * 1000.0;

/// Turns a price series and its aligned signals into performance metrics.
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, series: &Series, signals: &SignalSeries, costs: &CostModel) -> Result<PerformanceReport>;
}

/// Close-to-close vectorized evaluation.
///
/// The position held after bar `i` is that bar's signal weight and earns the
/// close-to-close return from `i` to `i + 1`. Every change of position pays
/// `|Δposition| × (fee + slippage)` of current equity. A position still open
/// on the last bar is marked to market, not liquidated.
#[derive(Debug, Default, Clone, Copy)]
pub struct VectorizedEvaluator;

struct OpenTrade {
    side: Signal,
    entry_index: usize,
    start_equity: Decimal,
    fees: Decimal,
}

impl Evaluator for VectorizedEvaluator {
    fn evaluate(&self, series: &Series, signals: &SignalSeries, costs: &CostModel) -> Result<PerformanceReport> {
        signals.check_alignment(series)?;

        let (trades, curve, exposed) = simulate(series, signals, costs);
        let periods_per_year = MS_PER_YEAR / series.timeframe().duration_ms() as f64;

        Ok(AnalyticsEngine::new().calculate(costs.initial_cash, &trades, &curve, periods_per_year, exposed))
    }
}

fn direction(weight: Decimal) -> i8 {
    if weight > Decimal::ZERO {
        1
    } else if weight < Decimal::ZERO {
        -1
    } else {
        0
    }
}

fn to_time(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

fn simulate(series: &Series, signals: &SignalSeries, costs: &CostModel) -> (Vec<Trade>, Vec<EquityPoint>, usize) {
    let bars = series.bars();
    let rate = costs.rate();
    let weights: Vec<Decimal> = signals
        .signals()
        .map(|s| Decimal::from_f64(s.weight()).unwrap_or_default())
        .collect();

    let mut trades = Vec::new();
    let mut curve = Vec::with_capacity(bars.len());
    let mut exposed = 0;
    let mut equity = costs.initial_cash;
    let mut held = Decimal::ZERO;
    let mut open: Option<OpenTrade> = None;

    let close_trade = |open: OpenTrade, exit_index: usize, equity: Decimal, trades: &mut Vec<Trade>| {
        trades.push(Trade {
            pair: series.pair().clone(),
            side: open.side,
            entry_time: to_time(bars[open.entry_index].open_time),
            exit_time: to_time(bars[exit_index].open_time),
            entry_price: bars[open.entry_index].close,
            exit_price: bars[exit_index].close,
            pnl: equity - open.start_equity,
            fees: open.fees,
        });
    };

    for (i, bar) in bars.iter().enumerate() {
        // Mark to market over the previous bar.
        if i > 0 && !held.is_zero() {
            let previous = bars[i - 1].close;
            equity += equity * held * (bar.close - previous) / previous;
        }

        let target = weights[i];
        if target != held {
            let reverses = !held.is_zero() && direction(target) != direction(held);
            let mut remaining = (target - held).abs();

            if reverses {
                if let Some(mut trade) = open.take() {
                    let exit_cost = equity * held.abs() * rate;
                    equity -= exit_cost;
                    trade.fees += exit_cost;
                    close_trade(trade, i, equity, &mut trades);
                }
                remaining = target.abs();
            }

            let cost = equity * remaining * rate;
            equity -= cost;
            if !target.is_zero() {
                match open.as_mut() {
                    Some(trade) => trade.fees += cost,
                    None => {
                        open = Some(OpenTrade {
                            side: if target > Decimal::ZERO { Signal::Long } else { Signal::Short },
                            entry_index: i,
                            start_equity: equity + cost,
                            fees: cost,
                        })
                    }
                }
            }
        }

        if !target.is_zero() {
            exposed += 1;
        }
        held = target;
        curve.push(EquityPoint { timestamp: to_time(bar.open_time), value: equity });
    }

    if let Some(trade) = open.take() {
        close_trade(trade, bars.len() - 1, equity, &mut trades);
    }

    (trades, curve, exposed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{Bar, DateRange, Pair, SignalKind, ValidationError};
    use rust_decimal::prelude::ToPrimitive;
    use rust_decimal_macros::dec;

    fn series(closes: &[Decimal]) -> Series {
        let tf: core_types::Timeframe = "1h".parse().unwrap();
        let step = tf.duration_ms();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, c)| Bar { open_time: i as i64 * step, open: *c, high: *c, low: *c, close: *c, volume: dec!(1) })
            .collect();
        let range = DateRange::new(0, closes.len() as i64 * step).unwrap();
        Series::new(Pair::new("BTCUSDT"), tf, range, bars, vec![]).unwrap()
    }

    fn signals(series: &Series, raw: Vec<Signal>) -> SignalSeries {
        SignalSeries::new(series, SignalKind::Discrete, raw, 1).unwrap()
    }

    fn free() -> CostModel {
        CostModel::new(0.0, 0.0, dec!(1000)).unwrap()
    }

    #[test]
    fn long_position_earns_the_next_bar_return() {
        let s = series(&[dec!(100), dec!(110), dec!(121)]);
        let sig = signals(&s, vec![Signal::Long, Signal::Long, Signal::Flat]);
        let report = VectorizedEvaluator.evaluate(&s, &sig, &free()).unwrap();

        assert_eq!(report.final_equity, dec!(1210));
        assert_eq!(report.total_trades, 1);
        assert!((report.net_pnl_percentage - 21.0).abs() < 1e-9);
        assert_eq!(report.win_rate, 100.0);
    }

    #[test]
    fn short_position_profits_from_a_fall() {
        let s = series(&[dec!(100), dec!(90), dec!(90)]);
        let sig = signals(&s, vec![Signal::Short, Signal::Flat, Signal::Flat]);
        let report = VectorizedEvaluator.evaluate(&s, &sig, &free()).unwrap();
        assert_eq!(report.final_equity, dec!(1100));
    }

    #[test]
    fn costs_are_charged_per_unit_of_position_change() {
        let s = series(&[dec!(100), dec!(100), dec!(100), dec!(100)]);
        let sig = signals(&s, vec![Signal::Long, Signal::Short, Signal::Flat, Signal::Flat]);
        let costs = CostModel::new(0.001, 0.0, dec!(1000)).unwrap();
        let report = VectorizedEvaluator.evaluate(&s, &sig, &costs).unwrap();

        // Changes: 0→1, 1→-1, -1→0 = 4 units of turnover, each costing 0.1%.
        let expected = 1000.0 * 0.999_f64.powi(4);
        assert!((report.final_equity.to_f64().unwrap() - expected).abs() < 1e-9);
        assert_eq!(report.total_trades, 2);
        assert!(report.net_pnl_absolute < Decimal::ZERO);
    }

    #[test]
    fn flat_signals_leave_equity_untouched() {
        let s = series(&[dec!(100), dec!(150), dec!(50)]);
        let sig = signals(&s, vec![Signal::Flat; 3]);
        let report = VectorizedEvaluator.evaluate(&s, &sig, &free()).unwrap();
        assert_eq!(report.final_equity, dec!(1000));
        assert_eq!(report.total_trades, 0);
        assert_eq!(report.exposure, 0.0);
    }

    #[test]
    fn misaligned_signals_are_rejected() {
        let short = series(&[dec!(100), dec!(101)]);
        let long = series(&[dec!(100), dec!(101), dec!(102)]);
        let sig = signals(&short, vec![Signal::Long, Signal::Long]);
        let err = VectorizedEvaluator.evaluate(&long, &sig, &free()).unwrap_err();
        assert_eq!(err, crate::Error::Misaligned(ValidationError::SignalLength { expected: 3, actual: 2 }));
    }
}
