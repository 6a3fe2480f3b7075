// In crates/api-client/src/lib.rs

use std::time::Duration;

use app_config::types::BinanceSettings;
use async_trait::async_trait;
use core_types::{Bar, DateRange, Pair, Timeframe};
use rust_decimal::Decimal;
use tracing::debug;

pub mod error;
pub mod source;
pub mod types;

// Re-export public types
pub use error::{Result, SourceError};
pub use source::MarketDataSource;
pub use types::*;

use crate::types::ApiErrorBody;

impl ApiClient {
    /// Constructs a new ApiClient from BinanceSettings.
    pub fn new(settings: &BinanceSettings) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| SourceError::ClientBuild(e.to_string()))?;
        Ok(ApiClient {
            http_client,
            base_url: settings.rest_base_url.trim_end_matches('/').to_string(),
            page_limit: settings.page_limit,
        })
    }

    /// Fetches one page of historical klines.
    ///
    /// This corresponds to the `GET /api/v3/klines` endpoint. Binance treats
    /// `endTime` as inclusive, so the half-open range end is pulled back by 1ms.
    pub async fn get_klines(&self, pair: &Pair, timeframe: Timeframe, range: DateRange) -> Result<Vec<Bar>> {
        let url = format!("{}/api/v3/klines", self.base_url);
        let query = [
            ("symbol", pair.to_string()),
            ("interval", timeframe.to_string()),
            ("startTime", range.start.to_string()),
            ("endTime", (range.end - 1).to_string()),
            ("limit", self.page_limit.to_string()),
        ];

        let response = self.http_client.get(&url).query(&query).send().await?;
        let body = read_body(response).await?;
        let bars = decode_klines(&body)?;

        debug!(pair = %pair, timeframe = %timeframe, start = range.start, count = bars.len(), "Fetched kline page");
        Ok(bars)
    }

    /// Lists up to `limit` symbols quoted in `quote_asset`, most traded first.
    ///
    /// This corresponds to the `GET /api/v3/ticker/24hr` endpoint.
    pub async fn top_pairs_by_quote_volume(&self, quote_asset: &str, limit: usize) -> Result<Vec<Pair>> {
        let url = format!("{}/api/v3/ticker/24hr", self.base_url);
        let response = self.http_client.get(&url).send().await?;
        let body = read_body(response).await?;
        let tickers: Vec<Ticker24h> = serde_json::from_str(&body)?;
        Ok(rank_by_quote_volume(&tickers, quote_asset, limit))
    }
}

#[async_trait]
impl MarketDataSource for ApiClient {
    async fn fetch_bars(&self, pair: &Pair, timeframe: Timeframe, range: DateRange) -> Result<Vec<Bar>> {
        self.get_klines(pair, timeframe, range).await
    }
}

// Free function to allow api_client::new usage
pub fn new(settings: &BinanceSettings) -> Result<ApiClient> {
    ApiClient::new(settings)
}

async fn read_body(response: reqwest::Response) -> Result<String> {
    let status = response.status().as_u16();
    let body = response.text().await?;
    match classify_status(status, &body) {
        Some(err) => Err(err),
        None => Ok(body),
    }
}

/// Maps a non-success HTTP status to the matching error.
fn classify_status(status: u16, body: &str) -> Option<SourceError> {
    match status {
        200..=299 => None,
        // 418 is Binance's escalation after ignoring 429s.
        429 | 418 => Some(SourceError::RateLimited { status }),
        500..=599 => Some(SourceError::Server { status }),
        _ => Some(match serde_json::from_str::<ApiErrorBody>(body) {
            Ok(err) => SourceError::Api { code: err.code, msg: err.msg },
            Err(_) => SourceError::Api {
                code: status as i64,
                msg: body.chars().take(200).collect(),
            },
        }),
    }
}

/// Converts the raw kline array into bars, rejecting unparseable numbers.
fn decode_klines(body: &str) -> Result<Vec<Bar>> {
    let raw_klines: Vec<RawKline> = serde_json::from_str(body)?;

    raw_klines
        .into_iter()
        .map(|raw| {
            Ok(Bar {
                open_time: raw.0,
                open: parse_decimal(&raw.1, "open")?,
                high: parse_decimal(&raw.2, "high")?,
                low: parse_decimal(&raw.3, "low")?,
                close: parse_decimal(&raw.4, "close")?,
                volume: parse_decimal(&raw.5, "volume")?,
            })
        })
        .collect()
}

fn parse_decimal(value: &str, field: &str) -> Result<Decimal> {
    value
        .parse()
        .map_err(|_| SourceError::Malformed(format!("{field} is not a number: {value:?}")))
}

fn rank_by_quote_volume(tickers: &[Ticker24h], quote_asset: &str, limit: usize) -> Vec<Pair> {
    let quote_asset = quote_asset.to_uppercase();
    let mut ranked: Vec<(f64, &str)> = tickers
        .iter()
        .filter(|t| t.symbol.ends_with(&quote_asset) && t.symbol.len() > quote_asset.len())
        .filter_map(|t| t.quote_volume.parse::<f64>().ok().map(|v| (v, t.symbol.as_str())))
        .filter(|(v, _)| v.is_finite())
        .collect();
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1)));
    ranked.into_iter().take(limit).map(|(_, symbol)| Pair::new(symbol)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn klines_are_decoded_exactly() {
        let body = r#"[[1740787200000,"84349.94000000","84500.00000000","84100.10000000","84400.01000000","12.50000000",1740787259999,"1054999.1",120,"6.1","514000.0","0"]]"#;
        let bars = decode_klines(body).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].open_time, 1740787200000);
        assert_eq!(bars[0].open, dec!(84349.94));
        assert_eq!(bars[0].close, dec!(84400.01));
        assert_eq!(bars[0].volume, dec!(12.5));
    }

    #[test]
    fn bad_numbers_are_malformed() {
        let body = r#"[[1,"x","1","1","1","1",2,"1",1,"1","1","0"]]"#;
        assert!(matches!(decode_klines(body), Err(SourceError::Malformed(_))));
        assert!(matches!(decode_klines("{}"), Err(SourceError::Malformed(_))));
    }

    #[test]
    fn statuses_are_classified() {
        assert_eq!(classify_status(200, "[]"), None);
        assert_eq!(classify_status(429, ""), Some(SourceError::RateLimited { status: 429 }));
        assert_eq!(classify_status(503, ""), Some(SourceError::Server { status: 503 }));

        let rejected = classify_status(400, r#"{"code":-1121,"msg":"Invalid symbol."}"#).unwrap();
        assert_eq!(rejected, SourceError::Api { code: -1121, msg: "Invalid symbol.".to_string() });
        assert!(!rejected.is_retryable());
        assert!(SourceError::Server { status: 502 }.is_retryable());
        assert!(SourceError::Timeout.is_retryable());
    }

    #[test]
    fn pairs_are_ranked_by_quote_volume() {
        let ticker = |symbol: &str, volume: &str| Ticker24h {
            symbol: symbol.to_string(),
            quote_volume: volume.to_string(),
        };
        let tickers = vec![
            ticker("ETHUSDT", "500.0"),
            ticker("BTCUSDT", "900.0"),
            ticker("ETHBTC", "10000.0"),
            ticker("DOGEUSDT", "not-a-number"),
            ticker("SOLUSDT", "700.0"),
            ticker("USDT", "1.0"),
        ];
        let top = rank_by_quote_volume(&tickers, "usdt", 2);
        assert_eq!(top, vec![Pair::new("BTCUSDT"), Pair::new("SOLUSDT")]);
    }

    #[tokio::test]
    async fn unreachable_host_is_a_retryable_failure() {
        let settings = BinanceSettings {
            rest_base_url: "http://127.0.0.1:9".to_string(),
            request_timeout_secs: 2,
            page_limit: 10,
        };
        let client = ApiClient::new(&settings).unwrap();
        let range = DateRange::new(0, 60_000).unwrap();
        let err = client
            .fetch_bars(&Pair::new("BTCUSDT"), "1m".parse().unwrap(), range)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
