use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{AssetType, Direction, PredictionStatus};

/// A prediction as issued by the analysis pipeline, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewPrediction {
    pub job_id: String,
    pub user_id: String,
    #[serde(default)]
    pub symbol: String,
    pub asset_type: Option<AssetType>,
    pub direction: Option<Direction>,
    pub entry_price: Option<f64>,
    pub target_price: Option<f64>,
    pub stop_loss: Option<f64>,
    #[serde(default)]
    pub timeframe: String,
    pub expiry_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub confidence: f64,
    pub prediction_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub option_strategy: Option<String>,
    #[serde(default)]
    pub option_expiration: Option<NaiveDate>,
    #[serde(default)]
    pub tp1: Option<f64>,
    #[serde(default)]
    pub tp2: Option<f64>,
    #[serde(default)]
    pub tp3: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A ledger entry. Outcome fields stay empty until the evaluator resolves it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub id: Uuid,
    pub job_id: String,
    pub user_id: String,
    pub symbol: String,
    pub asset_type: AssetType,

    pub direction: Direction,
    pub entry_price: f64,
    pub target_price: f64,
    pub stop_loss: f64,
    pub timeframe: String,
    pub expiry_date: DateTime<Utc>,
    pub confidence: f64,
    pub prediction_date: DateTime<Utc>,

    #[serde(default)]
    pub option_strategy: Option<String>,
    #[serde(default)]
    pub option_expiration: Option<NaiveDate>,
    #[serde(default)]
    pub tp1: Option<f64>,
    #[serde(default)]
    pub tp2: Option<f64>,
    #[serde(default)]
    pub tp3: Option<f64>,

    pub status: PredictionStatus,
    #[serde(default)]
    pub exit_price: Option<f64>,
    #[serde(default)]
    pub exit_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pnl_percent: Option<f64>,
    #[serde(default)]
    pub pnl_amount: Option<f64>,
    #[serde(default)]
    pub hit_target: bool,
    #[serde(default)]
    pub hit_stop: bool,
    #[serde(default)]
    pub hit_tp1: bool,
    #[serde(default)]
    pub hit_tp2: bool,
    #[serde(default)]
    pub hit_tp3: bool,
    #[serde(default)]
    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Field-complete resolution written back by the evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub status: PredictionStatus,
    pub exit_price: f64,
    pub exit_date: DateTime<Utc>,
    pub pnl_percent: f64,
    pub pnl_amount: f64,
    pub hit_target: bool,
    pub hit_stop: bool,
    pub hit_tp1: bool,
    pub hit_tp2: bool,
    pub hit_tp3: bool,
    pub notes: Option<String>,
}

fn required_price(name: &str, value: Option<f64>) -> Result<f64, StoreError> {
    match value {
        Some(v) if v.is_finite() => Ok(v),
        Some(_) => Err(StoreError::Validation(format!("{} must be finite", name))),
        None => Err(StoreError::Validation(format!("{} is required", name))),
    }
}

fn optional_price(name: &str, value: Option<f64>) -> Result<Option<f64>, StoreError> {
    match value {
        Some(v) if !v.is_finite() => {
            Err(StoreError::Validation(format!("{} must be finite", name)))
        }
        other => Ok(other),
    }
}

impl NewPrediction {
    /// Validate and stamp a new pending ledger entry.
    pub fn into_prediction(self, now: DateTime<Utc>) -> Result<Prediction, StoreError> {
        let symbol = self.symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(StoreError::Validation("symbol is required".to_string()));
        }
        let direction = self
            .direction
            .ok_or_else(|| StoreError::Validation("direction is required".to_string()))?;
        let expiry_date = self
            .expiry_date
            .ok_or_else(|| StoreError::Validation("expiry_date is required".to_string()))?;
        let entry_price = required_price("entry_price", self.entry_price)?;
        let target_price = required_price("target_price", self.target_price)?;
        let stop_loss = required_price("stop_loss", self.stop_loss)?;
        if !self.confidence.is_finite() || !(0.0..=100.0).contains(&self.confidence) {
            return Err(StoreError::Validation(
                "confidence must be between 0 and 100".to_string(),
            ));
        }

        Ok(Prediction {
            id: Uuid::new_v4(),
            job_id: self.job_id,
            user_id: self.user_id,
            symbol,
            asset_type: self.asset_type.unwrap_or(AssetType::Stock),
            direction,
            entry_price,
            target_price,
            stop_loss,
            timeframe: self.timeframe,
            expiry_date,
            confidence: self.confidence,
            prediction_date: self.prediction_date.unwrap_or(now),
            option_strategy: self.option_strategy.filter(|s| !s.trim().is_empty()),
            option_expiration: self.option_expiration,
            tp1: optional_price("tp1", self.tp1)?,
            tp2: optional_price("tp2", self.tp2)?,
            tp3: optional_price("tp3", self.tp3)?,
            status: PredictionStatus::Pending,
            exit_price: None,
            exit_date: None,
            pnl_percent: None,
            pnl_amount: None,
            hit_target: false,
            hit_stop: false,
            hit_tp1: false,
            hit_tp2: false,
            hit_tp3: false,
            notes: self.notes,
            created_at: now,
            updated_at: now,
        })
    }
}

impl Prediction {
    /// Take-profit ladder for forex records: the configured tp1..tp3 in
    /// order, or the target alone when no level was configured.
    pub fn ladder(&self) -> Vec<f64> {
        let levels: Vec<f64> = [self.tp1, self.tp2, self.tp3].into_iter().flatten().collect();
        if levels.is_empty() {
            vec![self.target_price]
        } else {
            levels
        }
    }

    /// Grouping key for strategy breakdowns.
    pub fn strategy_key(&self) -> String {
        self.option_strategy
            .clone()
            .unwrap_or_else(|| "forex".to_string())
    }

    pub fn apply(&mut self, outcome: Outcome, now: DateTime<Utc>) {
        self.status = outcome.status;
        self.exit_price = Some(outcome.exit_price);
        self.exit_date = Some(outcome.exit_date);
        self.pnl_percent = Some(outcome.pnl_percent);
        self.pnl_amount = Some(outcome.pnl_amount);
        self.hit_target = outcome.hit_target;
        self.hit_stop = outcome.hit_stop;
        self.hit_tp1 = outcome.hit_tp1;
        self.hit_tp2 = outcome.hit_tp2;
        self.hit_tp3 = outcome.hit_tp3;
        self.notes = match (self.notes.take(), outcome.notes) {
            (Some(existing), Some(note)) => Some(format!("{} | {}", existing, note)),
            (existing, note) => note.or(existing),
        };
        self.updated_at = now;
    }

    /// Days between the call and its resolution.
    pub fn duration_days(&self) -> Option<f64> {
        self.exit_date
            .map(|exit| (exit - self.prediction_date).num_seconds() as f64 / 86400.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{new_prediction, ts};

    #[test]
    fn valid_input_becomes_pending() {
        let p = new_prediction("aapl", Direction::Bullish)
            .into_prediction(ts("2024-03-01T00:00:00Z"))
            .unwrap();
        assert_eq!(p.symbol, "AAPL");
        assert_eq!(p.status, PredictionStatus::Pending);
        assert!(p.exit_price.is_none());
        assert_eq!(p.created_at, p.updated_at);
    }

    #[test]
    fn missing_fields_are_rejected() {
        let now = ts("2024-03-01T00:00:00Z");

        let mut input = new_prediction("AAPL", Direction::Bullish);
        input.symbol = "  ".to_string();
        assert!(matches!(input.into_prediction(now), Err(StoreError::Validation(_))));

        let mut input = new_prediction("AAPL", Direction::Bullish);
        input.direction = None;
        assert!(matches!(input.into_prediction(now), Err(StoreError::Validation(_))));

        let mut input = new_prediction("AAPL", Direction::Bullish);
        input.expiry_date = None;
        assert!(matches!(input.into_prediction(now), Err(StoreError::Validation(_))));

        let mut input = new_prediction("AAPL", Direction::Bullish);
        input.stop_loss = None;
        assert!(matches!(input.into_prediction(now), Err(StoreError::Validation(_))));
    }

    #[test]
    fn non_finite_prices_are_rejected() {
        let now = ts("2024-03-01T00:00:00Z");
        let mut input = new_prediction("AAPL", Direction::Bullish);
        input.target_price = Some(f64::NAN);
        assert!(matches!(input.into_prediction(now), Err(StoreError::Validation(_))));

        let mut input = new_prediction("AAPL", Direction::Bullish);
        input.tp2 = Some(f64::INFINITY);
        assert!(matches!(input.into_prediction(now), Err(StoreError::Validation(_))));
    }

    #[test]
    fn ladder_falls_back_to_target() {
        let now = ts("2024-03-01T00:00:00Z");
        let p = new_prediction("EURUSD", Direction::Bullish)
            .into_prediction(now)
            .unwrap();
        assert_eq!(p.ladder(), vec![p.target_price]);

        let mut input = new_prediction("EURUSD", Direction::Bullish);
        input.tp1 = Some(1.1);
        input.tp3 = Some(1.3);
        let p = input.into_prediction(now).unwrap();
        assert_eq!(p.ladder(), vec![1.1, 1.3]);
    }
}
