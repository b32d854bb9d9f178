#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use prediction_ledger::config::{Config, TieBreak};
use prediction_ledger::error::MarketDataError;
use prediction_ledger::market::MarketData;
use prediction_ledger::models::{AssetType, Direction, NewPrediction, PriceRange, Quote};

pub fn ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .unwrap()
        .with_timezone(&Utc)
}

pub fn test_config() -> Config {
    Config {
        bind_addr: "127.0.0.1:0".to_string(),
        ledger_file: String::new(),
        market_data_url: "http://127.0.0.1:9".to_string(),
        max_concurrent_fetches: 4,
        fetch_timeout_secs: 5,
        notional_unit: 1.0,
        tie_break: TieBreak::StopFirst,
        min_symbol_trades: 1,
        recent_trades_limit: 10,
        check_interval_secs: 0,
        ingest_token: Some("test-token".to_string()),
        log_level: "debug".to_string(),
    }
}

/// Stock call with entry 100, target 10% away and stop 10% away, two weeks
/// to run.
pub fn stock_call(symbol: &str, direction: Direction, made_at: DateTime<Utc>) -> NewPrediction {
    let (target, stop) = match direction {
        Direction::Bearish => (90.0, 110.0),
        _ => (110.0, 90.0),
    };
    NewPrediction {
        job_id: format!("job-{}", symbol.to_lowercase()),
        user_id: "user-1".to_string(),
        symbol: symbol.to_string(),
        asset_type: Some(AssetType::Stock),
        direction: Some(direction),
        entry_price: Some(100.0),
        target_price: Some(target),
        stop_loss: Some(stop),
        timeframe: "1d".to_string(),
        expiry_date: Some(made_at + Duration::days(14)),
        confidence: 80.0,
        prediction_date: Some(made_at),
        ..Default::default()
    }
}

/// Bullish EUR/USD call with a three-step take-profit ladder.
pub fn forex_call(made_at: DateTime<Utc>) -> NewPrediction {
    NewPrediction {
        job_id: "job-fx".to_string(),
        user_id: "user-1".to_string(),
        symbol: "eurusd".to_string(),
        asset_type: Some(AssetType::Forex),
        direction: Some(Direction::Bullish),
        entry_price: Some(1.1000),
        target_price: Some(1.1150),
        stop_loss: Some(1.0900),
        timeframe: "4h".to_string(),
        expiry_date: Some(made_at + Duration::days(14)),
        confidence: 60.0,
        prediction_date: Some(made_at),
        tp1: Some(1.1050),
        tp2: Some(1.1100),
        tp3: Some(1.1150),
        ..Default::default()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Script {
    pub price: f64,
    pub high: f64,
    pub low: f64,
}

/// MarketData double that answers from a per-symbol script, optionally
/// after a delay, and counts quote requests.
pub struct ScriptedMarket {
    scripts: Mutex<HashMap<String, Script>>,
    failing: HashSet<String>,
    quoted_at: DateTime<Utc>,
    delay: std::time::Duration,
    pub quote_calls: AtomicUsize,
}

impl ScriptedMarket {
    pub fn new(quoted_at: DateTime<Utc>) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            failing: HashSet::new(),
            quoted_at,
            delay: std::time::Duration::ZERO,
            quote_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn script(self, symbol: &str, price: f64, high: f64, low: f64) -> Self {
        self.set(symbol, price, high, low);
        self
    }

    pub fn failing(mut self, symbol: &str) -> Self {
        self.failing.insert(symbol.to_uppercase());
        self
    }

    pub fn set(&self, symbol: &str, price: f64, high: f64, low: f64) {
        self.scripts
            .lock()
            .unwrap()
            .insert(symbol.to_uppercase(), Script { price, high, low });
    }

    fn lookup(&self, symbol: &str) -> Result<Script, MarketDataError> {
        let key = symbol.to_uppercase();
        if self.failing.contains(&key) {
            return Err(MarketDataError::Status { symbol: key, status: 503 });
        }
        self.scripts
            .lock()
            .unwrap()
            .get(&key)
            .copied()
            .ok_or(MarketDataError::NoData(key))
    }
}

#[async_trait]
impl MarketData for ScriptedMarket {
    async fn get_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let s = self.lookup(symbol)?;
        Ok(Quote {
            price: s.price,
            timestamp: self.quoted_at,
        })
    }

    async fn get_range(
        &self,
        symbol: &str,
        _since: DateTime<Utc>,
        _until: DateTime<Utc>,
    ) -> Result<PriceRange, MarketDataError> {
        let s = self.lookup(symbol)?;
        Ok(PriceRange {
            high: s.high,
            low: s.low,
        })
    }
}
