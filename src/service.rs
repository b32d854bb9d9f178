use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::analytics::{self, BacktestStats, BacktestSummary, StatsOptions};
use crate::config::Config;
use crate::error::{ExportError, StoreError};
use crate::evaluation::{OutcomeEvaluator, PassReport};
use crate::models::{BacktestFilters, NewPrediction, Prediction};
use crate::store::PredictionStore;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Entry points the HTTP layer and the scheduler call into.
pub struct BacktestService {
    store: Arc<dyn PredictionStore>,
    evaluator: OutcomeEvaluator,
    options: StatsOptions,
    /// When set, used instead of Utc::now() for filter windows and stats
    pub sim_time: Option<DateTime<Utc>>,
}

impl BacktestService {
    pub fn new(store: Arc<dyn PredictionStore>, evaluator: OutcomeEvaluator, cfg: &Config) -> Self {
        Self {
            store,
            evaluator,
            options: StatsOptions {
                min_symbol_trades: cfg.min_symbol_trades,
                recent_limit: cfg.recent_trades_limit,
            },
            sim_time: None,
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.sim_time.unwrap_or_else(Utc::now)
    }

    pub async fn save(&self, input: NewPrediction) -> Result<Uuid, StoreError> {
        let symbol = input.symbol.clone();
        let id = self.store.save(input).await?;
        info!("Recorded prediction {} for {}", id, symbol);
        Ok(id)
    }

    pub async fn check_pending_predictions(&self) -> Result<PassReport, StoreError> {
        self.evaluator.run_pass().await
    }

    async fn records(
        &self,
        user_id: &str,
        filters: &BacktestFilters,
        now: DateTime<Utc>,
    ) -> Result<Vec<Prediction>, StoreError> {
        self.store.query(user_id, &filters.resolve(now)).await
    }

    pub async fn get_backtest_stats(
        &self,
        user_id: &str,
        filters: &BacktestFilters,
    ) -> Result<BacktestStats, StoreError> {
        let now = self.now();
        let records = self.records(user_id, filters, now).await?;
        Ok(analytics::compute(&records, now, &self.options))
    }

    pub async fn get_backtest_summary(
        &self,
        user_id: &str,
        filters: &BacktestFilters,
    ) -> Result<BacktestSummary, StoreError> {
        let now = self.now();
        let records = self.records(user_id, filters, now).await?;
        Ok(analytics::summarize(&records, now, &self.options))
    }

    pub async fn get_backtest_symbols(&self, user_id: &str) -> Result<BTreeSet<String>, StoreError> {
        self.store.symbols(user_id).await
    }

    pub async fn export_backtest_data(
        &self,
        user_id: &str,
        filters: &BacktestFilters,
    ) -> Result<String, ServiceError> {
        let now = self.now();
        let records = self.records(user_id, filters, now).await?;
        Ok(analytics::export_csv(&records)?)
    }

    /// Attachment name for an export produced now.
    pub fn export_filename(&self) -> String {
        format!("backtest-report-{}.csv", self.now().format("%Y-%m-%d"))
    }
}
