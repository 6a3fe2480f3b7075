// In crates/data-loader/src/lib.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use api_client::MarketDataSource;
use app_config::types::LoaderSettings;
use cache_store::Cache;
use core_types::{Bar, CacheKey, DateRange, Pair, Series, Timeframe};
use chrono::Utc;
use futures::future::{self, BoxFuture, FutureExt, Shared};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

pub mod error;
mod fetch;
pub mod liquidity;
pub mod validate;

// Re-export the most important types for easy access.
pub use error::{LoaderError, Result};
pub use liquidity::{Ineligible, LiquidityFilter, LiquiditySelection};
pub use validate::{FillPolicy, validate_bars};

use crate::fetch::FetchSettings;

type SharedLoad = Shared<BoxFuture<'static, Result<Arc<Series>>>>;

/// Produces validated series, reusing the cache and fetching only what it lacks.
///
/// Cheap to clone; clones share the cache, the fetch limiter and the table of
/// in-flight loads, so concurrent requests for one key cost one fetch.
#[derive(Clone)]
pub struct DataLoader {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    source: Arc<dyn MarketDataSource>,
    cache: Cache,
    fill_policy: FillPolicy,
    settings: FetchSettings,
    fetch_permits: Semaphore,
    in_flight: Mutex<HashMap<CacheKey, SharedLoad>>,
}

impl DataLoader {
    pub fn new(source: Arc<dyn MarketDataSource>, cache: Cache, settings: &LoaderSettings) -> Self {
        let fetch_settings = FetchSettings {
            max_attempts: settings.max_attempts.max(1),
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
            max_backoff: Duration::from_millis(settings.max_backoff_ms),
            fetch_timeout: Duration::from_secs(settings.fetch_timeout_secs),
        };
        Self {
            inner: Arc::new(Inner {
                source,
                cache,
                fill_policy: settings.fill_policy,
                settings: fetch_settings,
                fetch_permits: Semaphore::new(settings.max_concurrent_fetches.max(1)),
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn cache(&self) -> &Cache {
        &self.inner.cache
    }

    /// Returns the series for `(pair, timeframe, range)`.
    ///
    /// Callers asking for a key that is already loading wait for that load
    /// instead of starting their own.
    pub async fn load(&self, pair: &Pair, timeframe: Timeframe, range: DateRange) -> Result<Arc<Series>> {
        let key = CacheKey::new(pair.clone(), timeframe, range);

        let load = {
            let mut in_flight = self.inner.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            match in_flight.get(&key) {
                Some(existing) => {
                    debug!(key = %key, "Joining in-flight load");
                    existing.clone()
                }
                None => {
                    let inner = Arc::clone(&self.inner);
                    let load_key = key.clone();
                    let load = async move {
                        let result = inner.resolve(&load_key).await;
                        inner
                            .in_flight
                            .lock()
                            .unwrap_or_else(|poisoned| poisoned.into_inner())
                            .remove(&load_key);
                        result
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(key, load.clone());
                    load
                }
            }
        };

        load.await
    }

    /// Loads every request concurrently. Results come back in request order,
    /// and one failure never affects the others.
    pub async fn load_many(&self, requests: &[(Pair, Timeframe, DateRange)]) -> Vec<Result<Arc<Series>>> {
        future::join_all(
            requests
                .iter()
                .map(|(pair, timeframe, range)| self.load(pair, *timeframe, *range)),
        )
        .await
    }
}

impl Inner {
    async fn resolve(&self, key: &CacheKey) -> Result<Arc<Series>> {
        match self.cache.get(key).await {
            Ok(Some(series)) => return Ok(Arc::new(series)),
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "Cache read failed, treating as miss"),
        }

        let (mut segments, covered) = self.harvest(key).await;
        let cached_bars: usize = segments.iter().map(|(_, bars)| bars.len()).sum();

        let missing = key.range.subtract(&covered);
        let fetched = future::try_join_all(missing.iter().map(|piece| self.fetch_range(key, *piece))).await?;
        let fetched_bars: usize = fetched.iter().map(Vec::len).sum();
        segments.extend(missing.iter().map(|piece| piece.start).zip(fetched));

        info!(
            key = %key,
            cached_bars,
            fetched_bars,
            fetched_pieces = missing.len(),
            "Assembled series"
        );

        // Segments cover disjoint sub-ranges, so ordering them by start orders the bars.
        segments.sort_by_key(|(start, _)| *start);
        let bars: Vec<Bar> = segments.into_iter().flat_map(|(_, bars)| bars).collect();
        let now = Utc::now().timestamp_millis();
        let series = validate_bars(&key.pair, key.timeframe, key.range, bars, self.fill_policy, now)?;

        // A range still open at the source would be served short forever.
        if key.range.end > now {
            debug!(key = %key, "Range reaches past now, not caching");
        } else if let Err(e) = self.cache.put(key, &series).await {
            warn!(key = %key, error = %e, "Failed to write series to cache");
        }

        Ok(Arc::new(series))
    }

    /// Collects observed bars from cached records overlapping `key`.
    ///
    /// Returns the bars per covered sub-range and the list of sub-ranges that
    /// need no fetch. Only runs of consecutive observed bars count as covered;
    /// holes and edges a record lacks are fetched again. Synthetic fill bars are
    /// left behind so the current fill policy decides how holes are treated.
    async fn harvest(&self, key: &CacheKey) -> (Vec<(i64, Vec<Bar>)>, Vec<DateRange>) {
        let mut segments = Vec::new();
        let mut covered: Vec<DateRange> = Vec::new();

        let keys = match self.cache.keys_for(&key.pair, key.timeframe).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache scan failed");
                return (segments, covered);
            }
        };

        for other in keys.iter().filter(|k| *k != key) {
            let Some(overlap) = other.range.intersect(&key.range) else {
                continue;
            };
            let fresh = overlap.subtract(&covered);
            if fresh.is_empty() {
                continue;
            }
            let series = match self.cache.get(other).await {
                Ok(Some(series)) => series,
                Ok(None) => continue,
                Err(e) => {
                    warn!(key = %other, error = %e, "Cache read failed, skipping record");
                    continue;
                }
            };
            let step = key.timeframe.duration_ms();
            for piece in fresh {
                let bars = series.observed_bars().filter(|bar| piece.contains(bar.open_time)).cloned();
                for run in contiguous_runs(bars, step) {
                    let (Some(first), Some(last)) = (run.first(), run.last()) else {
                        continue;
                    };
                    let span = DateRange { start: first.open_time, end: last.open_time + step };
                    debug!(from = %other, span = %span, bars = run.len(), "Reusing cached bars");
                    covered.push(span);
                    segments.push((span.start, run));
                }
            }
        }

        (segments, covered)
    }
}

/// Splits ascending bars wherever consecutive open times are more than one period apart.
fn contiguous_runs(bars: impl Iterator<Item = Bar>, step: i64) -> Vec<Vec<Bar>> {
    let mut runs: Vec<Vec<Bar>> = Vec::new();
    for bar in bars {
        match runs.last_mut() {
            Some(run) if run.last().is_some_and(|prev| prev.open_time + step == bar.open_time) => run.push(bar),
            _ => runs.push(vec![bar]),
        }
    }
    runs
}
