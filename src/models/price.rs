use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

/// Extremes reached over a window of history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub high: f64,
    pub low: f64,
}

impl PriceRange {
    /// Widen the range so it covers `price`.
    pub fn including(self, price: f64) -> Self {
        Self {
            high: self.high.max(price),
            low: self.low.min(price),
        }
    }
}

/// Snapshot taken while evaluating a single prediction. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceCheck {
    pub symbol: String,
    pub current_price: f64,
    pub high_since_entry: f64,
    pub low_since_entry: f64,
    pub checked_at: DateTime<Utc>,
}

impl PriceCheck {
    pub fn new(symbol: &str, quote: Quote, range: PriceRange) -> Self {
        Self {
            symbol: symbol.to_string(),
            current_price: quote.price,
            high_since_entry: range.high,
            low_since_entry: range.low,
            checked_at: quote.timestamp,
        }
    }
}
