use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use crate::error::MarketDataError;
use crate::market::MarketData;
use crate::models::candle::{high_low, Candle};
use crate::models::{PriceRange, Quote};

/// A MarketData implementation that replays pre-loaded candles per symbol.
/// A cursor (`now`) controls which candles are visible, so quotes and
/// ranges never see the future.
pub struct HistoricalMarketData {
    data: HashMap<String, Vec<Candle>>,
    now: RwLock<DateTime<Utc>>,
    failing: HashSet<String>,
}

impl HistoricalMarketData {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            data: HashMap::new(),
            now: RwLock::new(now),
            failing: HashSet::new(),
        }
    }

    /// Load candles for a symbol. Candles are sorted oldest-first on load.
    pub fn load(&mut self, symbol: &str, mut candles: Vec<Candle>) {
        candles.sort_by_key(|c| c.timestamp);
        self.data.insert(symbol.to_uppercase(), candles);
    }

    /// Make every request for `symbol` fail, simulating a provider outage.
    pub fn fail_symbol(&mut self, symbol: &str) {
        self.failing.insert(symbol.to_uppercase());
    }

    /// Advance the replay clock.
    pub fn set_time(&self, t: DateTime<Utc>) {
        if let Ok(mut now) = self.now.write() {
            *now = t;
        }
    }

    pub fn current_time(&self) -> DateTime<Utc> {
        self.now.read().map(|n| *n).unwrap_or_else(|_| Utc::now())
    }

    fn visible(&self, symbol: &str) -> Result<&[Candle], MarketDataError> {
        let key = symbol.to_uppercase();
        if self.failing.contains(&key) {
            return Err(MarketDataError::Request {
                symbol: key,
                message: "simulated outage".to_string(),
            });
        }
        let all = self
            .data
            .get(&key)
            .ok_or_else(|| MarketDataError::NoData(key.clone()))?;
        let now = self.current_time();
        let end = all.partition_point(|c| c.timestamp <= now);
        Ok(&all[..end])
    }
}

#[async_trait]
impl MarketData for HistoricalMarketData {
    async fn get_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        let candles = self.visible(symbol)?;
        candles
            .last()
            .map(|c| Quote {
                price: c.close,
                timestamp: c.timestamp,
            })
            .ok_or_else(|| MarketDataError::NoData(symbol.to_uppercase()))
    }

    async fn get_range(
        &self,
        symbol: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<PriceRange, MarketDataError> {
        let candles = self.visible(symbol)?;
        let start = candles.partition_point(|c| c.timestamp < since);
        let end = candles.partition_point(|c| c.timestamp <= until);
        let window = &candles[start..end.max(start)];
        high_low(window)
            .map(|(high, low)| PriceRange { high, low })
            .ok_or_else(|| MarketDataError::NoData(symbol.to_uppercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ts;
    use chrono::Duration;

    fn candles(prices: &[(f64, f64)]) -> Vec<Candle> {
        let base = ts("2024-03-01T00:00:00Z");
        prices
            .iter()
            .enumerate()
            .map(|(i, &(high, low))| Candle {
                timestamp: base + Duration::hours(i as i64),
                open: low,
                high,
                low,
                close: (high + low) / 2.0,
                volume: 10.0,
            })
            .collect()
    }

    #[tokio::test]
    async fn cursor_hides_future_candles() {
        let mut md = HistoricalMarketData::new(ts("2024-03-01T01:00:00Z"));
        md.load("aapl", candles(&[(101.0, 99.0), (104.0, 100.0), (120.0, 80.0)]));

        let quote = md.get_quote("AAPL").await.unwrap();
        assert!((quote.price - 102.0).abs() < 1e-9);

        let range = md
            .get_range("AAPL", ts("2024-03-01T00:00:00Z"), ts("2024-03-02T00:00:00Z"))
            .await
            .unwrap();
        assert_eq!(range, PriceRange { high: 104.0, low: 99.0 });

        md.set_time(ts("2024-03-01T02:00:00Z"));
        let range = md
            .get_range("AAPL", ts("2024-03-01T01:00:00Z"), ts("2024-03-02T00:00:00Z"))
            .await
            .unwrap();
        assert_eq!(range, PriceRange { high: 120.0, low: 80.0 });
    }

    #[tokio::test]
    async fn unknown_and_failing_symbols_error() {
        let mut md = HistoricalMarketData::new(ts("2024-03-01T05:00:00Z"));
        md.load("MSFT", candles(&[(101.0, 99.0)]));
        md.fail_symbol("MSFT");
        assert!(matches!(md.get_quote("MSFT").await, Err(MarketDataError::Request { .. })));
        assert!(matches!(md.get_quote("TSLA").await, Err(MarketDataError::NoData(_))));
    }
}
