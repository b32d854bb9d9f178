use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Candle sizes the range query can ask the market-data provider for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Granularity {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "6h")]
    H6,
    #[serde(rename = "1d")]
    D1,
}

impl Granularity {
    pub const ALL: [Granularity; 6] = [
        Granularity::M1,
        Granularity::M5,
        Granularity::M15,
        Granularity::H1,
        Granularity::H6,
        Granularity::D1,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::M1 => "1m",
            Granularity::M5 => "5m",
            Granularity::M15 => "15m",
            Granularity::H1 => "1h",
            Granularity::H6 => "6h",
            Granularity::D1 => "1d",
        }
    }

    pub fn as_duration(&self) -> Duration {
        match self {
            Granularity::M1 => Duration::from_secs(60),
            Granularity::M5 => Duration::from_secs(300),
            Granularity::M15 => Duration::from_secs(900),
            Granularity::H1 => Duration::from_secs(3600),
            Granularity::H6 => Duration::from_secs(21600),
            Granularity::D1 => Duration::from_secs(86400),
        }
    }

    /// Coinbase REST API granularity string
    pub fn coinbase_granularity(&self) -> &'static str {
        match self {
            Granularity::M1 => "ONE_MINUTE",
            Granularity::M5 => "FIVE_MINUTE",
            Granularity::M15 => "FIFTEEN_MINUTE",
            Granularity::H1 => "ONE_HOUR",
            Granularity::H6 => "SIX_HOUR",
            Granularity::D1 => "ONE_DAY",
        }
    }

    pub fn as_seconds(&self) -> u64 {
        self.as_duration().as_secs()
    }

    /// Finest granularity covering `span_secs` in at most `max_candles` candles.
    /// Falls back to daily candles for very long windows.
    pub fn finest_for_span(span_secs: u64, max_candles: u64) -> Granularity {
        Self::ALL
            .iter()
            .copied()
            .find(|g| span_secs / g.as_seconds() < max_candles)
            .unwrap_or(Granularity::D1)
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
