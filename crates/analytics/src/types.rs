// In crates/analytics/src/types.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use core_types::{Pair, Signal};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Execution cost assumptions applied to every change of position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    /// Fraction of traded notional paid as exchange fee.
    pub fee_rate: f64,
    /// Fraction of traded notional lost to slippage.
    pub slippage_rate: f64,
    pub initial_cash: Decimal,
}

impl CostModel {
    pub fn new(fee_rate: f64, slippage_rate: f64, initial_cash: Decimal) -> Result<Self> {
        for (name, rate) in [("fee_rate", fee_rate), ("slippage_rate", slippage_rate)] {
            if !rate.is_finite() || !(0.0..1.0).contains(&rate) {
                return Err(Error::InvalidCosts(format!("{name} {rate} is outside [0, 1)")));
            }
        }
        if initial_cash <= Decimal::ZERO {
            return Err(Error::InvalidCosts(format!("initial cash {initial_cash} must be positive")));
        }
        Ok(Self { fee_rate, slippage_rate, initial_cash })
    }

    /// Combined cost per unit of position change.
    pub fn rate(&self) -> Decimal {
        Decimal::from_f64(self.fee_rate + self.slippage_rate).unwrap_or_default()
    }
}

/// A comprehensive record of a single closed trade, from entry to exit.
#[derive(Debug, Clone, Serialize)]
pub struct Trade {
    pub pair: Pair,
    pub side: Signal,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    /// Equity gained or lost over the trade, costs included.
    pub pnl: Decimal,
    pub fees: Decimal,
}

/// A struct to hold a point in the portfolio's equity curve.
#[derive(Debug, Clone, Serialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub value: Decimal,
}

/// A comprehensive report of a strategy's performance over a backtest period.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PerformanceReport {
    pub final_equity: Decimal,
    pub net_pnl_absolute: Decimal,
    /// Total return in percent.
    pub net_pnl_percentage: f64,
    pub max_drawdown_absolute: Decimal,
    /// Deepest peak-to-trough fall of the equity curve, in percent.
    pub max_drawdown_percentage: f64,
    /// Annualized from per-bar equity returns.
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    /// Share of winning trades, in percent.
    pub win_rate: f64,
    pub profit_factor: f64,
    pub total_trades: u32,
    /// Average P&L per trade.
    pub expectancy: Decimal,
    /// Share of bars with an open position, in percent.
    pub exposure: f64,
    pub avg_trade_duration_secs: f64,
    pub drawdown_duration_secs: i64,
}

impl PerformanceReport {
    /// Creates a new, empty report with default zero values.
    pub fn new() -> Self {
        Self::default()
    }

    /// The headline metrics as a flat name → value map.
    pub fn metrics(&self) -> BTreeMap<&'static str, f64> {
        let money = |d: Decimal| d.to_f64().unwrap_or(0.0);
        BTreeMap::from([
            ("total_return", self.net_pnl_percentage),
            ("sharpe_ratio", self.sharpe_ratio),
            ("max_drawdown", self.max_drawdown_percentage),
            ("win_rate", self.win_rate),
            ("expectancy", money(self.expectancy)),
            ("trade_count", self.total_trades as f64),
            ("profit_factor", self.profit_factor),
            ("exposure", self.exposure),
            ("final_equity", money(self.final_equity)),
        ])
    }
}
