use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{NewPrediction, Outcome, Prediction, PredictionQuery, PredictionStatus};
use crate::store::PredictionStore;

/// In-process ledger, optionally mirrored to a JSON snapshot file that is
/// rewritten after every successful write.
pub struct MemoryStore {
    records: RwLock<Vec<Prediction>>,
    snapshot: Option<PathBuf>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            snapshot: None,
        }
    }

    /// Seed a purely in-memory store with existing records.
    pub fn with_records(records: Vec<Prediction>) -> Self {
        Self {
            records: RwLock::new(records),
            snapshot: None,
        }
    }

    /// Open (or create) a store backed by `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let records = load_snapshot(&path)?;
        info!("Loaded {} predictions from {}", records.len(), path.display());
        Ok(Self {
            records: RwLock::new(records),
            snapshot: Some(path),
        })
    }

    /// Every record across all users, newest prediction first.
    pub async fn all(&self) -> Vec<Prediction> {
        let mut out = self.records.read().await.clone();
        out.sort_by(|a, b| b.prediction_date.cmp(&a.prediction_date));
        out
    }

    fn persist(&self, records: &[Prediction]) -> Result<(), StoreError> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(records)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn load_snapshot(path: &Path) -> Result<Vec<Prediction>, StoreError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&content)?)
}

#[async_trait]
impl PredictionStore for MemoryStore {
    async fn save(&self, input: NewPrediction) -> Result<Uuid, StoreError> {
        let prediction = input.into_prediction(Utc::now())?;
        let id = prediction.id;

        let mut records = self.records.write().await;
        records.push(prediction);
        if let Err(e) = self.persist(&records) {
            records.pop();
            return Err(e);
        }
        debug!("Saved prediction {}", id);
        Ok(id)
    }

    async fn find_pending(&self) -> Result<Vec<Prediction>, StoreError> {
        let records = self.records.read().await;
        let mut pending: Vec<Prediction> = records
            .iter()
            .filter(|p| p.status == PredictionStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|p| p.created_at);
        Ok(pending)
    }

    async fn update(&self, id: Uuid, outcome: Outcome) -> Result<(), StoreError> {
        if !outcome.status.is_terminal() {
            return Err(StoreError::Validation(
                "outcome status must be terminal".to_string(),
            ));
        }

        let mut records = self.records.write().await;
        let idx = records
            .iter()
            .position(|p| p.id == id && p.status == PredictionStatus::Pending)
            .ok_or(StoreError::NotFound(id))?;

        let previous = records[idx].clone();
        records[idx].apply(outcome, Utc::now());
        if let Err(e) = self.persist(&records) {
            records[idx] = previous;
            return Err(e);
        }
        Ok(())
    }

    async fn query(
        &self,
        user_id: &str,
        query: &PredictionQuery,
    ) -> Result<Vec<Prediction>, StoreError> {
        let records = self.records.read().await;
        let mut out: Vec<Prediction> = records
            .iter()
            .filter(|p| p.user_id == user_id && query.matches(p))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            b.prediction_date
                .cmp(&a.prediction_date)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(out)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Prediction>, StoreError> {
        let records = self.records.read().await;
        Ok(records.iter().find(|p| p.id == id).cloned())
    }

    async fn symbols(&self, user_id: &str) -> Result<BTreeSet<String>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|p| p.user_id == user_id)
            .map(|p| p.symbol.clone())
            .collect())
    }
}
