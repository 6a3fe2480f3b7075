// In crates/cache-store/src/record.rs

use core_types::{Bar, CacheKey, DateRange, Gap, Pair, Series, Timeframe};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Bumped whenever the body layout changes; older records are treated as corrupt.
pub const RECORD_VERSION: u32 = 1;

#[derive(Serialize)]
struct BodyRef<'a> {
    version: u32,
    pair: &'a Pair,
    timeframe: Timeframe,
    range: DateRange,
    bars: &'a [Bar],
    gaps: &'a [Gap],
}

#[derive(Deserialize)]
struct Body {
    version: u32,
    pair: Pair,
    timeframe: Timeframe,
    range: DateRange,
    bars: Vec<Bar>,
    gaps: Vec<Gap>,
}

pub(crate) fn sha256_hex(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    hex::encode(hasher.finalize())
}

/// Serializes a series as `<checksum>\n<json body>`.
pub(crate) fn encode(series: &Series) -> serde_json::Result<String> {
    let body = serde_json::to_string(&BodyRef {
        version: RECORD_VERSION,
        pair: series.pair(),
        timeframe: series.timeframe(),
        range: series.range(),
        bars: series.bars(),
        gaps: series.gaps(),
    })?;
    Ok(format!("{}\n{}", sha256_hex(&body), body))
}

/// Parses and fully re-validates a record written by [`encode`].
///
/// The error string describes the first problem found.
pub(crate) fn decode(key: &CacheKey, content: &str) -> Result<Series, String> {
    let (checksum, body) = content
        .split_once('\n')
        .ok_or_else(|| "missing checksum line".to_string())?;

    let actual = sha256_hex(body);
    if actual != checksum.trim() {
        return Err(format!("checksum mismatch: expected {}, got {actual}", checksum.trim()));
    }

    let body: Body = serde_json::from_str(body).map_err(|e| format!("undecodable body: {e}"))?;
    if body.version != RECORD_VERSION {
        return Err(format!("unsupported record version {}", body.version));
    }
    if body.pair != key.pair || body.timeframe != key.timeframe || body.range != key.range {
        return Err("record does not match its key".to_string());
    }

    Series::new(body.pair, body.timeframe, body.range, body.bars, body.gaps)
        .map_err(|e| format!("invalid series: {e}"))
}
