use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AssetType, Prediction, PredictionStatus};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetFilter {
    #[default]
    All,
    Stock,
    Forex,
}

impl AssetFilter {
    fn as_asset(self) -> Option<AssetType> {
        match self {
            AssetFilter::All => None,
            AssetFilter::Stock => Some(AssetType::Stock),
            AssetFilter::Forex => Some(AssetType::Forex),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Won,
    Lost,
    Expired,
    Partial,
}

impl StatusFilter {
    fn as_status(self) -> Option<PredictionStatus> {
        match self {
            StatusFilter::All => None,
            StatusFilter::Pending => Some(PredictionStatus::Pending),
            StatusFilter::Won => Some(PredictionStatus::Won),
            StatusFilter::Lost => Some(PredictionStatus::Lost),
            StatusFilter::Expired => Some(PredictionStatus::Expired),
            StatusFilter::Partial => Some(PredictionStatus::Partial),
        }
    }
}

/// Filters as accepted at the HTTP boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BacktestFilters {
    pub days: Option<u32>,
    pub asset_type: AssetFilter,
    pub symbol: Option<String>,
    pub status: StatusFilter,
}

impl BacktestFilters {
    /// Pin the relative day window to an absolute cutoff.
    pub fn resolve(&self, now: DateTime<Utc>) -> PredictionQuery {
        PredictionQuery {
            since: self.days.map(|d| now - Duration::days(i64::from(d))),
            asset_type: self.asset_type.as_asset(),
            symbol: self
                .symbol
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("all"))
                .map(str::to_uppercase),
            status: self.status.as_status(),
        }
    }
}

/// Resolved store query. `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictionQuery {
    pub since: Option<DateTime<Utc>>,
    pub asset_type: Option<AssetType>,
    pub symbol: Option<String>,
    pub status: Option<PredictionStatus>,
}

impl PredictionQuery {
    pub fn matches(&self, p: &Prediction) -> bool {
        if let Some(since) = self.since {
            if p.prediction_date < since {
                return false;
            }
        }
        if let Some(asset) = self.asset_type {
            if p.asset_type != asset {
                return false;
            }
        }
        if let Some(symbol) = &self.symbol {
            if &p.symbol != symbol {
                return false;
            }
        }
        if let Some(status) = self.status {
            if p.status != status {
                return false;
            }
        }
        true
    }
}
