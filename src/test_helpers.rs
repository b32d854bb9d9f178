use chrono::{DateTime, Duration, Utc};

use crate::config::Config;
use crate::models::{AssetType, Direction, NewPrediction, Prediction, PredictionStatus};

pub fn ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

/// Pipeline input with entry 100 and a 10% target / 10% stop on either side.
pub fn new_prediction(symbol: &str, direction: Direction) -> NewPrediction {
    let (target, stop) = match direction {
        Direction::Bearish => (90.0, 110.0),
        _ => (110.0, 90.0),
    };
    NewPrediction {
        job_id: "job-1".to_string(),
        user_id: "user-1".to_string(),
        symbol: symbol.to_string(),
        asset_type: Some(AssetType::Stock),
        direction: Some(direction),
        entry_price: Some(100.0),
        target_price: Some(target),
        stop_loss: Some(stop),
        timeframe: "1-2 weeks".to_string(),
        expiry_date: Some(ts("2024-04-01T00:00:00Z")),
        confidence: 75.0,
        prediction_date: None,
        ..Default::default()
    }
}

/// Pending stock prediction made at `made_at`, expiring 14 days later.
pub fn prediction(symbol: &str, direction: Direction, made_at: DateTime<Utc>) -> Prediction {
    let mut input = new_prediction(symbol, direction);
    input.prediction_date = Some(made_at);
    input.expiry_date = Some(made_at + Duration::days(14));
    input.into_prediction(made_at).unwrap()
}

/// Forex prediction with a three-level take-profit ladder.
pub fn forex_prediction(direction: Direction, made_at: DateTime<Utc>) -> Prediction {
    let mut p = prediction("EURUSD", direction, made_at);
    p.asset_type = AssetType::Forex;
    p.entry_price = 1.1000;
    match direction {
        Direction::Bearish => {
            p.stop_loss = 1.1100;
            p.target_price = 1.0850;
            p.tp1 = Some(1.0950);
            p.tp2 = Some(1.0900);
            p.tp3 = Some(1.0850);
        }
        _ => {
            p.stop_loss = 1.0900;
            p.target_price = 1.1150;
            p.tp1 = Some(1.1050);
            p.tp2 = Some(1.1100);
            p.tp3 = Some(1.1150);
        }
    }
    p
}

/// A terminal record with the given pnl, resolved `days_held` after the call.
pub fn resolved(
    symbol: &str,
    status: PredictionStatus,
    pnl_percent: f64,
    made_at: DateTime<Utc>,
    days_held: i64,
) -> Prediction {
    let mut p = prediction(symbol, Direction::Bullish, made_at);
    p.status = status;
    p.pnl_percent = Some(pnl_percent);
    p.pnl_amount = Some(pnl_percent / 100.0);
    p.exit_price = Some(p.entry_price * (1.0 + pnl_percent / 100.0));
    p.exit_date = Some(made_at + Duration::days(days_held));
    p
}

pub fn default_test_config() -> Config {
    Config {
        bind_addr: "127.0.0.1:0".to_string(),
        ledger_file: String::new(),
        market_data_url: "http://127.0.0.1:9".to_string(),
        notional_unit: 1.0,
        tie_break: crate::config::TieBreak::StopFirst,
        min_symbol_trades: 3,
        max_concurrent_fetches: 2,
        fetch_timeout_secs: 2,
        check_interval_secs: 0,
        ingest_token: Some("test-token".to_string()),
        recent_trades_limit: 10,
        log_level: "debug".to_string(),
    }
}
