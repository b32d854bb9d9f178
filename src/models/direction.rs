use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Bullish,
    Bearish,
    Neutral,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Bullish => "bullish",
            Direction::Bearish => "bearish",
            Direction::Neutral => "neutral",
        }
    }

    /// +1 when profit comes from price rising, -1 when it comes from price
    /// falling, 0 for neutral calls.
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Bullish => 1.0,
            Direction::Bearish => -1.0,
            Direction::Neutral => 0.0,
        }
    }

    /// Signed percentage move from `entry` to `exit` in this direction.
    pub fn pnl_percent(&self, entry: f64, exit: f64) -> f64 {
        if entry == 0.0 {
            return 0.0;
        }
        self.sign() * (exit - entry) / entry * 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Stock,
    Forex,
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Stock => "stock",
            AssetType::Forex => "forex",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    Pending,
    Won,
    Lost,
    Expired,
    Partial,
}

impl fmt::Display for PredictionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PredictionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionStatus::Pending => "pending",
            PredictionStatus::Won => "won",
            PredictionStatus::Lost => "lost",
            PredictionStatus::Expired => "expired",
            PredictionStatus::Partial => "partial",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PredictionStatus::Pending)
    }

    /// Won and partial both count as wins for rate purposes.
    pub fn is_win(&self) -> bool {
        matches!(self, PredictionStatus::Won | PredictionStatus::Partial)
    }

    /// Outcomes that enter a win rate (wins and losses, never expiries).
    pub fn is_decisive(&self) -> bool {
        matches!(
            self,
            PredictionStatus::Won | PredictionStatus::Partial | PredictionStatus::Lost
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bullish_pnl_positive_when_price_rises() {
        assert!((Direction::Bullish.pnl_percent(100.0, 110.0) - 10.0).abs() < 1e-9);
        assert!((Direction::Bullish.pnl_percent(100.0, 90.0) + 10.0).abs() < 1e-9);
    }

    #[test]
    fn bearish_pnl_positive_when_price_falls() {
        assert!((Direction::Bearish.pnl_percent(100.0, 90.0) - 10.0).abs() < 1e-9);
        assert!((Direction::Bearish.pnl_percent(100.0, 110.0) + 10.0).abs() < 1e-9);
    }

    #[test]
    fn neutral_and_zero_entry_are_flat() {
        assert_eq!(Direction::Neutral.pnl_percent(100.0, 150.0), 0.0);
        assert_eq!(Direction::Bullish.pnl_percent(0.0, 150.0), 0.0);
    }

    #[test]
    fn status_classification() {
        assert!(!PredictionStatus::Pending.is_terminal());
        assert!(PredictionStatus::Expired.is_terminal());
        assert!(PredictionStatus::Partial.is_win());
        assert!(!PredictionStatus::Expired.is_decisive());
        assert!(PredictionStatus::Lost.is_decisive());
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&PredictionStatus::Partial).unwrap();
        assert_eq!(json, "\"partial\"");
        let d: Direction = serde_json::from_str("\"bearish\"").unwrap();
        assert_eq!(d, Direction::Bearish);
    }
}
