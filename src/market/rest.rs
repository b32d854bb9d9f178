use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::MarketDataError;
use crate::market::MarketData;
use crate::models::candle::{high_low, Candle};
use crate::models::{Granularity, PriceRange, Quote};

const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(100);
const MAX_CANDLES_PER_REQUEST: u64 = 300;
const MAX_RANGE_PAGES: u64 = 4;
const QUOTE_CACHE_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct CandleResponse {
    candles: Vec<RawCandle>,
}

#[derive(Debug, Deserialize)]
struct RawCandle {
    start: String,
    low: String,
    high: String,
    open: String,
    close: String,
    volume: String,
}

#[derive(Debug, Deserialize)]
struct TickerResponse {
    trades: Vec<TickerTrade>,
}

#[derive(Debug, Deserialize)]
struct TickerTrade {
    price: String,
}

/// Client for Coinbase-style public market endpoints (ticker + candles).
pub struct RestMarketData {
    client: Client,
    base_url: String,
    last_request: Mutex<Option<Instant>>,
    quote_cache: Mutex<HashMap<String, (Instant, Quote)>>,
}

impl RestMarketData {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            last_request: Mutex::new(None),
            quote_cache: Mutex::new(HashMap::new()),
        })
    }

    /// Provider product id: `EURUSD` and `EUR/USD` become `EUR-USD`.
    pub fn product_id(symbol: &str) -> String {
        let s = symbol.trim().to_uppercase().replace(['/', '_'], "-");
        if !s.contains('-') && s.len() == 6 && s.chars().all(|c| c.is_ascii_alphabetic()) {
            format!("{}-{}", &s[..3], &s[3..])
        } else {
            s
        }
    }

    async fn rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < MIN_REQUEST_INTERVAL {
                tokio::time::sleep(MIN_REQUEST_INTERVAL - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        symbol: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, MarketDataError> {
        self.rate_limit().await;

        let resp = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .query(query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MarketDataError::Timeout(symbol.to_string())
                } else {
                    MarketDataError::Request {
                        symbol: symbol.to_string(),
                        message: e.to_string(),
                    }
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(MarketDataError::Status {
                symbol: symbol.to_string(),
                status: status.as_u16(),
            });
        }

        resp.json::<T>().await.map_err(|e| MarketDataError::Parse {
            symbol: symbol.to_string(),
            message: e.to_string(),
        })
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        granularity: Granularity,
        start: i64,
        end: i64,
    ) -> Result<Vec<Candle>, MarketDataError> {
        let path = format!(
            "/api/v3/brokerage/market/products/{}/candles",
            Self::product_id(symbol)
        );
        let data: CandleResponse = self
            .get_json(
                symbol,
                &path,
                &[
                    ("start", start.to_string()),
                    ("end", end.to_string()),
                    ("granularity", granularity.coinbase_granularity().to_string()),
                    ("limit", MAX_CANDLES_PER_REQUEST.to_string()),
                ],
            )
            .await?;

        Ok(data
            .candles
            .into_iter()
            .filter_map(|rc| {
                let ts = rc.start.parse::<i64>().ok()?;
                let timestamp = DateTime::from_timestamp(ts, 0)?;
                Some(Candle {
                    timestamp,
                    open: rc.open.parse().ok()?,
                    high: rc.high.parse().ok()?,
                    low: rc.low.parse().ok()?,
                    close: rc.close.parse().ok()?,
                    volume: rc.volume.parse().ok()?,
                })
            })
            .collect())
    }
}

#[async_trait]
impl MarketData for RestMarketData {
    async fn get_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        let key = symbol.to_uppercase();
        if let Some((cached_at, quote)) = self.quote_cache.lock().await.get(&key) {
            if cached_at.elapsed() < QUOTE_CACHE_TTL {
                return Ok(*quote);
            }
        }

        let path = format!(
            "/api/v3/brokerage/market/products/{}/ticker",
            Self::product_id(symbol)
        );
        let data: TickerResponse = self
            .get_json(symbol, &path, &[("limit", "1".to_string())])
            .await?;

        let price = data
            .trades
            .first()
            .and_then(|t| t.price.parse::<f64>().ok())
            .filter(|p| p.is_finite() && *p > 0.0)
            .ok_or_else(|| MarketDataError::NoData(key.clone()))?;

        let quote = Quote {
            price,
            timestamp: Utc::now(),
        };
        self.quote_cache
            .lock()
            .await
            .insert(key, (Instant::now(), quote));
        Ok(quote)
    }

    async fn get_range(
        &self,
        symbol: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<PriceRange, MarketDataError> {
        let start_ts = since.timestamp();
        let end_ts = until.timestamp();
        if end_ts <= start_ts {
            return Err(MarketDataError::NoData(symbol.to_uppercase()));
        }

        let span = (end_ts - start_ts) as u64;
        let granularity =
            Granularity::finest_for_span(span, MAX_CANDLES_PER_REQUEST * MAX_RANGE_PAGES);
        let chunk = (granularity.as_seconds() * MAX_CANDLES_PER_REQUEST) as i64;

        let mut candles: Vec<Candle> = Vec::new();
        let mut chunk_start = start_ts;
        while chunk_start < end_ts {
            let chunk_end = (chunk_start + chunk).min(end_ts);
            let mut page = self
                .fetch_candles(symbol, granularity, chunk_start, chunk_end)
                .await?;
            candles.append(&mut page);
            chunk_start = chunk_end;
        }

        debug!(
            "{}: {} {} candles between {} and {}",
            symbol,
            candles.len(),
            granularity,
            since.format("%Y-%m-%d %H:%M"),
            until.format("%Y-%m-%d %H:%M")
        );

        high_low(candles.iter().filter(|c| c.timestamp >= since && c.timestamp <= until))
            .or_else(|| high_low(&candles))
            .map(|(high, low)| PriceRange { high, low })
            .ok_or_else(|| MarketDataError::NoData(symbol.to_uppercase()))
    }
}
