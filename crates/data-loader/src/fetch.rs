// In crates/data-loader/src/fetch.rs

use std::time::Duration;

use api_client::SourceError;
use core_types::{Bar, CacheKey, DateRange, ValidationError};
use tracing::{error, warn};

use crate::Inner;
use crate::error::{LoaderError, Result};

impl Inner {
    /// Pages through `piece` until the source runs dry or the piece is exhausted.
    pub(crate) async fn fetch_range(&self, key: &CacheKey, piece: DateRange) -> Result<Vec<Bar>> {
        let step = key.timeframe.duration_ms();
        let mut bars: Vec<Bar> = Vec::new();
        let mut cursor = piece.start;

        while cursor < piece.end {
            let window = DateRange { start: cursor, end: piece.end };
            let page = self.fetch_page(key, window).await?;
            let Some(last) = page.last().map(|b| b.open_time) else {
                break;
            };

            if let Some(stray) = page.iter().find(|b| !window.contains(b.open_time)) {
                return Err(ValidationError::OutOfRange {
                    pair: key.pair.clone(),
                    open_time: stray.open_time,
                }
                .into());
            }

            bars.extend(page);
            // A partial page is normal; ask again for the remainder.
            cursor = last + step;
        }

        Ok(bars)
    }

    /// One source request with bounded retries.
    async fn fetch_page(&self, key: &CacheKey, window: DateRange) -> Result<Vec<Bar>> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;

            let result = {
                let _permit = self.fetch_permits.acquire().await.map_err(|_| LoaderError::SourceUnavailable {
                    key: key.clone(),
                    attempts: attempt,
                    reason: "fetch limiter closed".to_string(),
                })?;
                tokio::time::timeout(
                    self.settings.fetch_timeout,
                    self.source.fetch_bars(&key.pair, key.timeframe, window),
                )
                .await
                .unwrap_or(Err(SourceError::Timeout))
            };

            match result {
                Ok(bars) => return Ok(bars),
                Err(e) if e.is_retryable() && attempt < self.settings.max_attempts => {
                    let backoff = self.settings.backoff(attempt, &e);
                    warn!(
                        key = %key,
                        attempt,
                        error = %e,
                        backoff_ms = backoff.as_millis() as u64,
                        "Fetch failed, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    error!(key = %key, attempts = attempt, error = %e, "Giving up on fetch");
                    return Err(LoaderError::SourceUnavailable {
                        key: key.clone(),
                        attempts: attempt,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }
}

/// Retry and timeout limits, resolved from `LoaderSettings` once.
#[derive(Debug, Clone)]
pub(crate) struct FetchSettings {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub fetch_timeout: Duration,
}

impl FetchSettings {
    /// Exponential backoff after failed attempt number `attempt` (1-based).
    /// Rate-limit responses wait twice as long.
    pub fn backoff(&self, attempt: u32, error: &SourceError) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        let mut delay = self.initial_backoff.saturating_mul(factor);
        if matches!(error, SourceError::RateLimited { .. }) {
            delay = delay.saturating_mul(2);
        }
        delay.min(self.max_backoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_is_capped() {
        let settings = FetchSettings {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(500),
            fetch_timeout: Duration::from_secs(1),
        };
        let server = SourceError::Server { status: 503 };
        let delays: Vec<u128> = (1..=5).map(|a| settings.backoff(a, &server).as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 500, 500]);

        let limited = SourceError::RateLimited { status: 429 };
        assert_eq!(settings.backoff(1, &limited).as_millis(), 200);
    }
}
