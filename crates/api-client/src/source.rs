// In crates/api-client/src/source.rs

use async_trait::async_trait;
use core_types::{Bar, DateRange, Pair, Timeframe};

use crate::error::Result;

/// Anything that can hand out historical bars for a (pair, timeframe, range).
///
/// One call may return fewer bars than the range holds (a single page); the
/// caller pages by advancing past the last bar it received. An empty result
/// means the source has nothing further in the range.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn fetch_bars(&self, pair: &Pair, timeframe: Timeframe, range: DateRange) -> Result<Vec<Bar>>;
}
