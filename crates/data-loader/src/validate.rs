// In crates/data-loader/src/validate.rs

use core_types::{Bar, DateRange, Gap, GapResolution, Pair, Series, Timeframe, ValidationError};
use rust_decimal::Decimal;

pub use app_config::types::FillPolicy;

/// Turns raw bars into a [`Series`], applying `policy` to holes in the data.
///
/// Bars must already be in ascending order: duplicates, reordering, bad prices
/// and bars outside `range` are rejected, never dropped. Holes at either edge of
/// `range` count like holes between bars, except for periods that have not
/// closed by `now` (epoch ms), which the exchange cannot have yet.
pub fn validate_bars(
    pair: &Pair,
    timeframe: Timeframe,
    range: DateRange,
    bars: Vec<Bar>,
    policy: FillPolicy,
    now: i64,
) -> Result<Series, ValidationError> {
    if bars.is_empty() {
        return Err(ValidationError::Empty { pair: pair.clone() });
    }

    let step = timeframe.duration_ms();
    let mut out: Vec<Bar> = Vec::with_capacity(bars.len());
    let mut gaps = Vec::new();

    for bar in bars {
        bar.validate(pair)?;
        if !range.contains(bar.open_time) {
            return Err(ValidationError::OutOfRange { pair: pair.clone(), open_time: bar.open_time });
        }

        if let Some((prev_time, prev_close)) = out.last().map(|b| (b.open_time, b.close)) {
            let delta = bar.open_time - prev_time;
            if delta == 0 {
                return Err(ValidationError::Duplicate { pair: pair.clone(), open_time: bar.open_time });
            }
            if delta < 0 {
                return Err(ValidationError::NonMonotonic { pair: pair.clone(), open_time: bar.open_time });
            }
            if delta % step != 0 {
                return Err(ValidationError::IrregularSpacing { pair: pair.clone(), open_time: bar.open_time });
            }
            if delta > step {
                let missing = (delta / step - 1) as u32;
                let start = prev_time + step;
                match policy {
                    FillPolicy::Reject => {
                        return Err(ValidationError::Gap { pair: pair.clone(), after: prev_time, missing });
                    }
                    FillPolicy::ForwardFill => {
                        out.extend((0..missing as i64).map(|i| flat_bar(start + i * step, prev_close)));
                        gaps.push(Gap { start, missing, resolution: GapResolution::Filled });
                    }
                    FillPolicy::DropAndFlag => {
                        gaps.push(Gap { start, missing, resolution: GapResolution::Flagged });
                    }
                }
            }
        }
        out.push(bar);
    }

    // Open times in [expected_start, expected_end) must be present.
    let expected_start = range.start.div_euclid(step) * step + if range.start.rem_euclid(step) == 0 { 0 } else { step };
    let expected_end = range.end.min(now - step + 1);

    if let Some(first) = out.first().filter(|b| b.open_time > expected_start) {
        let delta = first.open_time - expected_start;
        if delta % step != 0 {
            return Err(ValidationError::IrregularSpacing { pair: pair.clone(), open_time: first.open_time });
        }
        // No earlier close to carry forward, so the first observed open is used.
        let (filled, gap) = edge_gap(pair, expected_start, (delta / step) as u32, first.open, step, policy)?;
        out.splice(0..0, filled);
        gaps.insert(0, gap);
    }
    if let Some(last) = out.last().filter(|b| b.open_time + step < expected_end) {
        let missing = ((expected_end - 1 - last.open_time) / step) as u32;
        let (filled, gap) = edge_gap(pair, last.open_time + step, missing, last.close, step, policy)?;
        out.extend(filled);
        gaps.push(gap);
    }

    Series::new(pair.clone(), timeframe, range, out, gaps)
}

/// Applies `policy` to `missing` bars from `start` at the edge of the range.
fn edge_gap(
    pair: &Pair,
    start: i64,
    missing: u32,
    price: Decimal,
    step: i64,
    policy: FillPolicy,
) -> Result<(Vec<Bar>, Gap), ValidationError> {
    match policy {
        FillPolicy::Reject => Err(ValidationError::EdgeGap { pair: pair.clone(), start, missing }),
        FillPolicy::ForwardFill => Ok((
            (0..missing as i64).map(|i| flat_bar(start + i * step, price)).collect(),
            Gap { start, missing, resolution: GapResolution::Filled },
        )),
        FillPolicy::DropAndFlag => Ok((Vec::new(), Gap { start, missing, resolution: GapResolution::Flagged })),
    }
}

// Synthetic bar for a filled gap: no trading, price carried forward.
fn flat_bar(open_time: i64, close: Decimal) -> Bar {
    Bar {
        open_time,
        open: close,
        high: close,
        low: close,
        close,
        volume: Decimal::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const STEP: i64 = 60_000;
    /// Long after every test range has closed.
    const LATER: i64 = i64::MAX / 2;

    fn bar(i: i64, close: Decimal) -> Bar {
        Bar {
            open_time: i * STEP,
            open: close,
            high: close + dec!(1),
            low: close - dec!(1),
            close,
            volume: dec!(2),
        }
    }

    /// Bars at the given minute indices, all closing at 10.
    fn bars_at(indices: impl IntoIterator<Item = i64>) -> Vec<Bar> {
        indices.into_iter().map(|i| bar(i, dec!(10))).collect()
    }

    fn check_at(bars: Vec<Bar>, policy: FillPolicy, now: i64) -> Result<Series, ValidationError> {
        let range = DateRange::new(0, 10 * STEP).unwrap();
        validate_bars(&Pair::new("ETHUSDT"), "1m".parse().unwrap(), range, bars, policy, now)
    }

    fn check(bars: Vec<Bar>, policy: FillPolicy) -> Result<Series, ValidationError> {
        check_at(bars, policy, LATER)
    }

    /// Minutes 0..10 with 1 and 2 missing, closes 10 then 11.
    fn holed() -> Vec<Bar> {
        let mut bars = vec![bar(0, dec!(10))];
        bars.extend((3..10).map(|i| bar(i, dec!(11))));
        bars
    }

    #[test]
    fn gap_is_rejected_by_default() {
        let err = check(holed(), FillPolicy::Reject).unwrap_err();
        assert_eq!(err, ValidationError::Gap { pair: Pair::new("ETHUSDT"), after: 0, missing: 2 });
    }

    #[test]
    fn forward_fill_carries_the_previous_close() {
        let series = check(holed(), FillPolicy::ForwardFill).unwrap();
        assert_eq!(series.len(), 10);
        let filled = &series.bars()[1];
        assert_eq!(filled.open_time, STEP);
        assert_eq!((filled.open, filled.high, filled.low, filled.close), (dec!(10), dec!(10), dec!(10), dec!(10)));
        assert_eq!(filled.volume, Decimal::ZERO);
        assert_eq!(series.gaps()[0].resolution, GapResolution::Filled);
        assert_eq!(series.observed_bars().count(), 8);
    }

    #[test]
    fn drop_and_flag_keeps_the_hole() {
        let series = check(holed(), FillPolicy::DropAndFlag).unwrap();
        assert_eq!(series.len(), 8);
        assert_eq!(series.gaps(), &[Gap { start: STEP, missing: 2, resolution: GapResolution::Flagged }]);
    }

    #[test]
    fn leading_hole_follows_the_policy() {
        let err = check(bars_at(3..10), FillPolicy::Reject).unwrap_err();
        assert_eq!(err, ValidationError::EdgeGap { pair: Pair::new("ETHUSDT"), start: 0, missing: 3 });

        let filled = check(bars_at(3..10), FillPolicy::ForwardFill).unwrap();
        assert_eq!(filled.len(), 10);
        assert_eq!(filled.bars()[0].open_time, 0);
        assert_eq!(filled.bars()[0].close, dec!(10));
        assert_eq!(filled.gaps(), &[Gap { start: 0, missing: 3, resolution: GapResolution::Filled }]);
        assert_eq!(filled.observed_bars().count(), 7);

        let flagged = check(bars_at(3..10), FillPolicy::DropAndFlag).unwrap();
        assert_eq!(flagged.len(), 7);
        assert_eq!(flagged.gaps(), &[Gap { start: 0, missing: 3, resolution: GapResolution::Flagged }]);
    }

    #[test]
    fn trailing_hole_follows_the_policy() {
        let err = check(bars_at(0..6), FillPolicy::Reject).unwrap_err();
        assert_eq!(err, ValidationError::EdgeGap { pair: Pair::new("ETHUSDT"), start: 6 * STEP, missing: 4 });

        let filled = check(bars_at(0..6), FillPolicy::ForwardFill).unwrap();
        assert_eq!(filled.len(), 10);
        assert_eq!(filled.bars().last().unwrap().open_time, 9 * STEP);
        assert_eq!(filled.gaps(), &[Gap { start: 6 * STEP, missing: 4, resolution: GapResolution::Filled }]);

        let flagged = check(bars_at(0..6), FillPolicy::DropAndFlag).unwrap();
        assert_eq!(flagged.len(), 6);
        assert_eq!(flagged.gaps(), &[Gap { start: 6 * STEP, missing: 4, resolution: GapResolution::Flagged }]);
    }

    #[test]
    fn periods_still_open_are_not_required() {
        // Minute 6 closes at 7 * STEP; nothing after it can exist yet.
        let series = check_at(bars_at(0..7), FillPolicy::Reject, 7 * STEP).unwrap();
        assert_eq!(series.len(), 7);
        assert!(series.gaps().is_empty());

        assert!(matches!(
            check_at(bars_at(0..5), FillPolicy::Reject, 7 * STEP),
            Err(ValidationError::EdgeGap { missing: 2, .. })
        ));
    }

    #[test]
    fn ordering_problems_are_rejected_under_any_policy() {
        for policy in [FillPolicy::Reject, FillPolicy::ForwardFill, FillPolicy::DropAndFlag] {
            assert!(matches!(
                check(vec![bar(1, dec!(10)), bar(1, dec!(10))], policy),
                Err(ValidationError::Duplicate { .. })
            ));
            assert!(matches!(
                check(vec![bar(2, dec!(10)), bar(1, dec!(10))], policy),
                Err(ValidationError::NonMonotonic { .. })
            ));
        }
    }

    #[test]
    fn bad_values_are_rejected_not_dropped() {
        let mut bars = bars_at(0..10);
        bars[1].volume = dec!(-1);
        assert!(matches!(
            check(bars, FillPolicy::ForwardFill),
            Err(ValidationError::NegativeVolume { .. })
        ));

        let mut bars = bars_at(0..10);
        bars[4].low = Decimal::ZERO;
        assert!(check(bars, FillPolicy::Reject).is_err());

        assert!(matches!(
            check(vec![bar(12, dec!(10))], FillPolicy::Reject),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(matches!(check(vec![], FillPolicy::Reject), Err(ValidationError::Empty { .. })));
    }
}
