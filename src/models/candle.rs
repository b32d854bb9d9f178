use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Highest high and lowest low over candles, or `None` when empty.
pub fn high_low<'a, I>(candles: I) -> Option<(f64, f64)>
where
    I: IntoIterator<Item = &'a Candle>,
{
    candles.into_iter().fold(None, |acc, c| match acc {
        None => Some((c.high, c.low)),
        Some((h, l)) => Some((h.max(c.high), l.min(c.low))),
    })
}
