// In crates/core-types/src/types.rs

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, ValidationError};

const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;
const WEEK_MS: i64 = 7 * DAY_MS;
/// Exchange weeks open on Monday; the Unix epoch fell on a Thursday.
const WEEK_OFFSET_MS: i64 = 4 * DAY_MS;

/// An exchange trading pair, e.g. `BTCUSDT`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pair(pub String);

impl Pair {
    pub fn new(symbol: impl AsRef<str>) -> Self {
        Self(symbol.as_ref().trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimeUnit {
    Minute,
    Hour,
    Day,
    Week,
}

impl TimeUnit {
    fn millis(self) -> i64 {
        match self {
            TimeUnit::Minute => MINUTE_MS,
            TimeUnit::Hour => HOUR_MS,
            TimeUnit::Day => DAY_MS,
            TimeUnit::Week => WEEK_MS,
        }
    }

    fn suffix(self) -> char {
        match self {
            TimeUnit::Minute => 'm',
            TimeUnit::Hour => 'h',
            TimeUnit::Day => 'd',
            TimeUnit::Week => 'w',
        }
    }
}

/// A bar interval such as `5m`, `1h` or `1d`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timeframe {
    amount: u32,
    unit: TimeUnit,
}

impl Timeframe {
    pub fn new(amount: u32, unit: TimeUnit) -> Result<Self> {
        if amount == 0 {
            return Err(Error::InvalidTimeframe(format!("0{}", unit.suffix())));
        }
        Ok(Self { amount, unit })
    }

    /// Length of one bar in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        self.amount as i64 * self.unit.millis()
    }

    /// True when `self` is a whole, non-zero multiple of `base`.
    pub fn is_multiple_of(&self, base: &Timeframe) -> bool {
        let (this, base) = (self.duration_ms(), base.duration_ms());
        this >= base && this % base == 0
    }

    /// The open time of the bar of this timeframe that contains `timestamp`.
    pub fn bucket_start(&self, timestamp: i64) -> i64 {
        let step = self.duration_ms();
        let offset = if self.unit == TimeUnit::Week { WEEK_OFFSET_MS } else { 0 };
        (timestamp - offset).div_euclid(step) * step + offset
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.unit.suffix())
    }
}

impl FromStr for Timeframe {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || Error::InvalidTimeframe(s.to_string());
        let unit = match s.chars().last().ok_or_else(invalid)? {
            'm' => TimeUnit::Minute,
            'h' => TimeUnit::Hour,
            'd' => TimeUnit::Day,
            'w' => TimeUnit::Week,
            _ => return Err(invalid()),
        };
        let amount: u32 = s[..s.len() - 1].parse().map_err(|_| invalid())?;
        Timeframe::new(amount, unit).map_err(|_| invalid())
    }
}

impl TryFrom<String> for Timeframe {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Timeframe> for String {
    fn from(value: Timeframe) -> Self {
        value.to_string()
    }
}

/// A half-open time range `[start, end)` in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DateRange {
    pub start: i64,
    pub end: i64,
}

impl DateRange {
    pub fn new(start: i64, end: i64) -> Result<Self> {
        if start >= end {
            return Err(Error::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Builds a range from two `YYYY-MM-DD` dates, both days included.
    pub fn from_dates(start_date: &str, end_date: &str) -> Result<Self> {
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| Error::InvalidDate(s.to_string()))
        };
        let start = parse(start_date)?;
        let end = parse(end_date)?
            .succ_opt()
            .ok_or_else(|| Error::InvalidDate(end_date.to_string()))?;
        let to_ms = |d: NaiveDate| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN)).timestamp_millis();
        Self::new(to_ms(start), to_ms(end))
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        self.start <= timestamp && timestamp < self.end
    }

    pub fn covers(&self, other: &DateRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn intersect(&self, other: &DateRange) -> Option<DateRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start < end).then_some(DateRange { start, end })
    }

    /// The parts of `self` not covered by any of `covered`, in ascending order.
    pub fn subtract(&self, covered: &[DateRange]) -> Vec<DateRange> {
        let mut pieces: Vec<DateRange> = covered.iter().filter_map(|c| self.intersect(c)).collect();
        pieces.sort();

        let mut missing = Vec::new();
        let mut cursor = self.start;
        for piece in pieces {
            if piece.start > cursor {
                missing.push(DateRange { start: cursor, end: piece.start });
            }
            cursor = cursor.max(piece.end);
        }
        if cursor < self.end {
            missing.push(DateRange { start: cursor, end: self.end });
        }
        missing
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", format_ms(self.start), format_ms(self.end))
    }
}

fn format_ms(ms: i64) -> String {
    match Utc.timestamp_millis_opt(ms).single() {
        Some(dt) => dt.format("%Y-%m-%dT%H:%MZ").to_string(),
        None => ms.to_string(),
    }
}

/// One OHLCV sample. Immutable once produced by the loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    /// Open time in epoch milliseconds.
    pub open_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Bar {
    /// Checks the per-bar invariants: positive prices, non-negative volume, and a
    /// high/low envelope that contains the open and close.
    pub fn validate(&self, pair: &Pair) -> std::result::Result<(), ValidationError> {
        for (field, value) in [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ] {
            if value <= Decimal::ZERO {
                return Err(ValidationError::NonPositivePrice {
                    pair: pair.clone(),
                    open_time: self.open_time,
                    field,
                });
            }
        }
        if self.volume < Decimal::ZERO {
            return Err(ValidationError::NegativeVolume {
                pair: pair.clone(),
                open_time: self.open_time,
            });
        }
        let body_high = self.open.max(self.close);
        let body_low = self.open.min(self.close);
        if self.high < body_high || self.low > body_low || self.high < self.low {
            return Err(ValidationError::InconsistentRange {
                pair: pair.clone(),
                open_time: self.open_time,
            });
        }
        Ok(())
    }

    pub fn close_f64(&self) -> f64 {
        self.close.to_f64().unwrap_or(0.0)
    }

    /// Typical price `(high + low + close) / 3`.
    pub fn typical_price(&self) -> f64 {
        ((self.high + self.low + self.close) / Decimal::from(3)).to_f64().unwrap_or(0.0)
    }

    pub fn volume_f64(&self) -> f64 {
        self.volume.to_f64().unwrap_or(0.0)
    }

    /// Volume expressed in the quote asset, approximated with the close price.
    pub fn quote_volume(&self) -> f64 {
        (self.volume * self.close).to_f64().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapResolution {
    /// Synthetic bars were inserted for the missing interval.
    Filled,
    /// The interval was left empty and recorded here.
    Flagged,
}

/// A run of missing bars inside a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gap {
    /// Open time of the first missing bar.
    pub start: i64,
    pub missing: u32,
    pub resolution: GapResolution,
}

impl Gap {
    pub fn end(&self, timeframe: &Timeframe) -> i64 {
        self.start + self.missing as i64 * timeframe.duration_ms()
    }

    pub fn contains(&self, timeframe: &Timeframe, timestamp: i64) -> bool {
        self.start <= timestamp && timestamp < self.end(timeframe)
    }
}

/// An ordered, validated run of bars for one (pair, timeframe).
///
/// Timestamps strictly increase, every bar lies inside `range`, spacing is a
/// whole number of periods, and any spacing wider than one period has a
/// `Flagged` gap on record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pair: Pair,
    timeframe: Timeframe,
    range: DateRange,
    bars: Vec<Bar>,
    gaps: Vec<Gap>,
}

impl Series {
    pub fn new(
        pair: Pair,
        timeframe: Timeframe,
        range: DateRange,
        bars: Vec<Bar>,
        gaps: Vec<Gap>,
    ) -> std::result::Result<Self, ValidationError> {
        if bars.is_empty() {
            return Err(ValidationError::Empty { pair });
        }

        let step = timeframe.duration_ms();
        let mut previous: Option<i64> = None;
        for bar in &bars {
            bar.validate(&pair)?;
            if !range.contains(bar.open_time) {
                return Err(ValidationError::OutOfRange { pair, open_time: bar.open_time });
            }
            if let Some(prev) = previous {
                let delta = bar.open_time - prev;
                if delta == 0 {
                    return Err(ValidationError::Duplicate { pair, open_time: bar.open_time });
                }
                if delta < 0 {
                    return Err(ValidationError::NonMonotonic { pair, open_time: bar.open_time });
                }
                if delta % step != 0 {
                    return Err(ValidationError::IrregularSpacing { pair, open_time: bar.open_time });
                }
                if delta > step {
                    let missing = (delta / step - 1) as u32;
                    let flagged = gaps.iter().any(|g| {
                        g.resolution == GapResolution::Flagged && g.start == prev + step && g.missing == missing
                    });
                    if !flagged {
                        return Err(ValidationError::Gap { pair, after: prev, missing });
                    }
                }
            }
            previous = Some(bar.open_time);
        }

        Ok(Self {
            pair,
            timeframe,
            range,
            bars,
            gaps,
        })
    }

    pub fn pair(&self) -> &Pair {
        &self.pair
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn range(&self) -> DateRange {
        self.range
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn gaps(&self) -> &[Gap] {
        &self.gaps
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Always false: a `Series` cannot be constructed without bars.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn timestamps(&self) -> impl Iterator<Item = i64> + '_ {
        self.bars.iter().map(|b| b.open_time)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(Bar::close_f64).collect()
    }

    /// Bars that were observed at the source, i.e. not synthesized to fill a gap.
    pub fn observed_bars(&self) -> impl Iterator<Item = &Bar> + '_ {
        self.bars.iter().filter(move |bar| {
            !self
                .gaps
                .iter()
                .any(|g| g.resolution == GapResolution::Filled && g.contains(&self.timeframe, bar.open_time))
        })
    }
}

/// Deterministic identity of one cached series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    pub pair: Pair,
    pub timeframe: Timeframe,
    pub range: DateRange,
}

impl CacheKey {
    pub fn new(pair: Pair, timeframe: Timeframe, range: DateRange) -> Self {
        Self { pair, timeframe, range }
    }

    /// File-name friendly identity, e.g. `BTCUSDT_1h_1740787200000_1743120000000`.
    pub fn file_stem(&self) -> String {
        format!("{}_{}_{}_{}", self.pair, self.timeframe, self.range.start, self.range.end)
    }

    /// Inverse of [`CacheKey::file_stem`].
    pub fn parse_file_stem(stem: &str) -> Option<Self> {
        let mut parts = stem.rsplitn(4, '_');
        let end: i64 = parts.next()?.parse().ok()?;
        let start: i64 = parts.next()?.parse().ok()?;
        let timeframe: Timeframe = parts.next()?.parse().ok()?;
        let pair = parts.next().filter(|p| !p.is_empty())?;
        let range = DateRange::new(start, end).ok()?;
        Some(Self::new(Pair(pair.to_string()), timeframe, range))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.pair, self.timeframe, self.range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bar(open_time: i64, close: Decimal) -> Bar {
        Bar {
            open_time,
            open: close,
            high: close + dec!(1),
            low: close - dec!(1),
            close,
            volume: dec!(10),
        }
    }

    fn hourly() -> Timeframe {
        "1h".parse().unwrap()
    }

    #[test]
    fn timeframe_parses_and_displays() {
        let tf: Timeframe = "15m".parse().unwrap();
        assert_eq!(tf.duration_ms(), 15 * MINUTE_MS);
        assert_eq!(tf.to_string(), "15m");
        assert!("0h".parse::<Timeframe>().is_err());
        assert!("1M".parse::<Timeframe>().is_err());
        assert!("h".parse::<Timeframe>().is_err());
    }

    #[test]
    fn weekly_buckets_start_on_monday() {
        let week: Timeframe = "1w".parse().unwrap();
        // 2025-03-05 (Wednesday) 12:00 UTC
        let wednesday = 1_741_176_000_000;
        // 2025-03-03 (Monday) 00:00 UTC
        assert_eq!(week.bucket_start(wednesday), 1_740_960_000_000);
    }

    #[test]
    fn date_range_includes_end_day() {
        let range = DateRange::from_dates("2025-03-01", "2025-03-01").unwrap();
        assert_eq!(range.end - range.start, DAY_MS);
        assert!(DateRange::from_dates("2025-03-02", "2025-03-01").is_err());
        assert!(DateRange::from_dates("March 1", "2025-03-01").is_err());
    }

    #[test]
    fn subtract_returns_uncovered_pieces() {
        let full = DateRange::new(0, 100).unwrap();
        let covered = [DateRange::new(20, 40).unwrap(), DateRange::new(30, 60).unwrap(), DateRange::new(90, 200).unwrap()];
        let missing = full.subtract(&covered);
        assert_eq!(missing, vec![DateRange { start: 0, end: 20 }, DateRange { start: 60, end: 90 }]);
        assert!(full.subtract(&[DateRange::new(-5, 105).unwrap()]).is_empty());
    }

    #[test]
    fn series_rejects_duplicates_and_reordering() {
        let tf = hourly();
        let range = DateRange::new(0, 10 * HOUR_MS).unwrap();
        let pair = Pair::new("btcusdt");

        let dup = vec![bar(0, dec!(10)), bar(0, dec!(11))];
        assert!(matches!(
            Series::new(pair.clone(), tf, range, dup, vec![]),
            Err(ValidationError::Duplicate { .. })
        ));

        let backwards = vec![bar(HOUR_MS, dec!(10)), bar(0, dec!(11))];
        assert!(matches!(
            Series::new(pair, tf, range, backwards, vec![]),
            Err(ValidationError::NonMonotonic { .. })
        ));
    }

    #[test]
    fn series_requires_gaps_to_be_flagged() {
        let tf = hourly();
        let range = DateRange::new(0, 10 * HOUR_MS).unwrap();
        let pair = Pair::new("ETHUSDT");
        let bars = vec![bar(0, dec!(10)), bar(3 * HOUR_MS, dec!(11))];

        let err = Series::new(pair.clone(), tf, range, bars.clone(), vec![]).unwrap_err();
        assert_eq!(err, ValidationError::Gap { pair: pair.clone(), after: 0, missing: 2 });

        let gap = Gap { start: HOUR_MS, missing: 2, resolution: GapResolution::Flagged };
        let series = Series::new(pair, tf, range, bars, vec![gap]).unwrap();
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn bar_validation_rejects_bad_prices() {
        let pair = Pair::new("BTCUSDT");
        let mut bad = bar(0, dec!(10));
        bad.low = dec!(0);
        assert!(matches!(bad.validate(&pair), Err(ValidationError::NonPositivePrice { field: "low", .. })));

        let mut inverted = bar(0, dec!(10));
        inverted.high = dec!(9.5);
        assert!(matches!(inverted.validate(&pair), Err(ValidationError::InconsistentRange { .. })));

        let mut negative = bar(0, dec!(10));
        negative.volume = dec!(-1);
        assert!(matches!(negative.validate(&pair), Err(ValidationError::NegativeVolume { .. })));
    }

    #[test]
    fn cache_key_file_stem_round_trips() {
        let key = CacheKey::new(Pair::new("BTCUSDT"), hourly(), DateRange::new(1_000, 2_000).unwrap());
        assert_eq!(key.file_stem(), "BTCUSDT_1h_1000_2000");
        assert_eq!(CacheKey::parse_file_stem(&key.file_stem()), Some(key));
        assert_eq!(CacheKey::parse_file_stem("garbage"), None);
    }

    #[test]
    fn decimal_precision_survives_serialization() {
        let original = Bar {
            open_time: 1,
            open: dec!(0.000012345678901234),
            high: dec!(0.000012345678901299),
            low: dec!(0.000012345678901200),
            close: dec!(0.000012345678901250),
            volume: dec!(123456789.123456789),
        };
        let json = serde_json::to_string(&original).unwrap();
        let decoded: Bar = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, original);
    }
}
