// In crates/strategies/src/indicators.rs

use core_types::Bar;
use ta::Next;
use ta::indicators::{SimpleMovingAverage as Sma, StandardDeviation};

/// Simple moving average of `values`, one output per input.
///
/// Entries before the window fills average over what has been seen so far;
/// callers mask them through their minimum history.
pub fn sma(values: &[f64], period: usize) -> Result<Vec<f64>, String> {
    let mut indicator = Sma::new(period).map_err(|e| format!("moving average of {period}: {e:?}"))?;
    Ok(values.iter().map(|v| indicator.next(*v)).collect())
}

/// Rolling sample standard deviation (n - 1 denominator) of `values`.
///
/// Entries with a single observation in the window are zero.
pub fn rolling_std(values: &[f64], period: usize) -> Result<Vec<f64>, String> {
    let mut indicator =
        StandardDeviation::new(period).map_err(|e| format!("standard deviation of {period}: {e:?}"))?;
    Ok(values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let population = indicator.next(*v);
            let n = (i + 1).min(period) as f64;
            if n > 1.0 { population * (n / (n - 1.0)).sqrt() } else { 0.0 }
        })
        .collect())
}

/// Rolling volume-weighted average of the typical price.
///
/// A window without any volume (e.g. all forward-filled) falls back to the
/// plain mean of the typical price.
pub fn rolling_vwap(bars: &[Bar], period: usize) -> Vec<f64> {
    let typical: Vec<f64> = bars.iter().map(Bar::typical_price).collect();
    let volume: Vec<f64> = bars.iter().map(Bar::volume_f64).collect();

    let mut out = Vec::with_capacity(bars.len());
    let (mut pv_sum, mut v_sum, mut p_sum) = (0.0, 0.0, 0.0);
    for i in 0..bars.len() {
        pv_sum += typical[i] * volume[i];
        v_sum += volume[i];
        p_sum += typical[i];
        if i >= period {
            let j = i - period;
            pv_sum -= typical[j] * volume[j];
            v_sum -= volume[j];
            p_sum -= typical[j];
        }
        let count = (i + 1).min(period) as f64;
        out.push(if v_sum > f64::EPSILON { pv_sum / v_sum } else { p_sum / count });
    }
    out
}
