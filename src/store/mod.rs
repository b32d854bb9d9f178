pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{NewPrediction, Outcome, Prediction, PredictionQuery};

/// Durable ledger of predictions. The evaluator is the only writer of
/// outcome fields; stats and export only read.
#[async_trait]
pub trait PredictionStore: Send + Sync {
    /// Validate and persist a new pending prediction.
    async fn save(&self, input: NewPrediction) -> Result<Uuid, StoreError>;

    /// Pending predictions, oldest first.
    async fn find_pending(&self) -> Result<Vec<Prediction>, StoreError>;

    /// Apply an outcome only if the record is still pending. A missing or
    /// already resolved record yields `StoreError::NotFound`.
    async fn update(&self, id: Uuid, outcome: Outcome) -> Result<(), StoreError>;

    /// A user's predictions matching `query`, newest first.
    async fn query(&self, user_id: &str, query: &PredictionQuery)
        -> Result<Vec<Prediction>, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Prediction>, StoreError>;

    /// Distinct symbols the user has predictions for.
    async fn symbols(&self, user_id: &str) -> Result<BTreeSet<String>, StoreError>;
}
