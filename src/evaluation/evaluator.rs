use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{MarketDataError, StoreError};
use crate::market::MarketData;
use crate::models::{Prediction, PredictionStatus, PriceCheck, PriceRange, Quote};
use crate::store::PredictionStore;

use super::outcome::{evaluate, OutcomePolicy};

/// Counts for one evaluation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassReport {
    pub checked: usize,
    pub resolved_won: usize,
    pub resolved_lost: usize,
    pub resolved_expired: usize,
    pub resolved_partial: usize,
    pub skipped_on_error: usize,
}

impl PassReport {
    pub fn resolved(&self) -> usize {
        self.resolved_won + self.resolved_lost + self.resolved_expired + self.resolved_partial
    }
}

enum RecordResult {
    Resolved(PredictionStatus),
    Unchanged,
    /// Another pass resolved the record between our read and our write.
    Conflict,
    /// Market data unavailable; retried next pass.
    Skipped,
    Failed(StoreError),
}

/// Advances pending predictions toward a terminal status. One call to
/// `run_pass` is one sweep over everything pending; scheduling is the
/// caller's business.
pub struct OutcomeEvaluator {
    store: Arc<dyn PredictionStore>,
    market: Arc<dyn MarketData>,
    policy: OutcomePolicy,
    max_concurrent: usize,
    fetch_timeout: Duration,
    /// When set, used instead of Utc::now() (replays and tests)
    pub sim_time: Option<DateTime<Utc>>,
}

impl OutcomeEvaluator {
    pub fn new(
        store: Arc<dyn PredictionStore>,
        market: Arc<dyn MarketData>,
        cfg: &Config,
    ) -> Self {
        Self {
            store,
            market,
            policy: OutcomePolicy {
                notional_unit: cfg.notional_unit,
                tie_break: cfg.tie_break,
            },
            max_concurrent: cfg.max_concurrent_fetches.max(1),
            fetch_timeout: Duration::from_secs(cfg.fetch_timeout_secs.max(1)),
            sim_time: None,
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.sim_time.unwrap_or_else(Utc::now)
    }

    pub async fn run_pass(&self) -> Result<PassReport, StoreError> {
        let pending = self.store.find_pending().await?;
        let now = self.now();
        let mut report = PassReport {
            checked: pending.len(),
            ..Default::default()
        };
        if pending.is_empty() {
            debug!("No pending predictions to check");
            return Ok(report);
        }

        // Oldest-first order is kept inside each symbol group
        let mut by_symbol: BTreeMap<String, Vec<Prediction>> = BTreeMap::new();
        for prediction in pending {
            by_symbol
                .entry(prediction.symbol.clone())
                .or_default()
                .push(prediction);
        }

        info!(
            "Checking {} pending predictions across {} symbols ({} concurrent fetches)",
            report.checked,
            by_symbol.len(),
            self.max_concurrent
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut group_sizes = Vec::with_capacity(by_symbol.len());
        let mut handles = Vec::with_capacity(by_symbol.len());

        for (symbol, records) in by_symbol {
            let permit_clone = Arc::clone(&semaphore);
            let store = Arc::clone(&self.store);
            let market = Arc::clone(&self.market);
            let policy = self.policy;
            let fetch_timeout = self.fetch_timeout;
            group_sizes.push(records.len());

            handles.push(tokio::spawn(async move {
                let Ok(_permit) = permit_clone.acquire_owned().await else {
                    return records.iter().map(|_| RecordResult::Skipped).collect::<Vec<_>>();
                };
                process_symbol(&*store, &*market, &symbol, &records, now, &policy, fetch_timeout)
                    .await
            }));
        }

        let mut store_error = None;
        for (joined, size) in join_all(handles).await.into_iter().zip(group_sizes) {
            let results = match joined {
                Ok(results) => results,
                Err(e) => {
                    warn!("Evaluation task panicked: {}", e);
                    report.skipped_on_error += size;
                    continue;
                }
            };
            for result in results {
                match result {
                    RecordResult::Resolved(status) => match status {
                        PredictionStatus::Won => report.resolved_won += 1,
                        PredictionStatus::Lost => report.resolved_lost += 1,
                        PredictionStatus::Expired => report.resolved_expired += 1,
                        PredictionStatus::Partial => report.resolved_partial += 1,
                        PredictionStatus::Pending => {}
                    },
                    RecordResult::Unchanged | RecordResult::Conflict => {}
                    RecordResult::Skipped => report.skipped_on_error += 1,
                    RecordResult::Failed(e) => {
                        store_error.get_or_insert(e);
                    }
                }
            }
        }

        if let Some(e) = store_error {
            error!("Evaluation pass aborted by store failure: {}", e);
            return Err(e);
        }

        info!(
            "Pass complete: checked={} won={} lost={} expired={} partial={} skipped={}",
            report.checked,
            report.resolved_won,
            report.resolved_lost,
            report.resolved_expired,
            report.resolved_partial,
            report.skipped_on_error
        );
        Ok(report)
    }
}

/// One quote per symbol per pass; ranges are shared between records that
/// cover the same window.
async fn process_symbol(
    store: &dyn PredictionStore,
    market: &dyn MarketData,
    symbol: &str,
    records: &[Prediction],
    now: DateTime<Utc>,
    policy: &OutcomePolicy,
    fetch_timeout: Duration,
) -> Vec<RecordResult> {
    let quote = match timeout(fetch_timeout, market.get_quote(symbol)).await {
        Ok(Ok(q)) => q,
        Ok(Err(e)) => {
            warn!("Skipping {} {} predictions this pass: {}", records.len(), symbol, e);
            return records.iter().map(|_| RecordResult::Skipped).collect();
        }
        Err(_) => {
            warn!(
                "Skipping {} {} predictions this pass: {}",
                records.len(),
                symbol,
                MarketDataError::Timeout(symbol.to_string())
            );
            return records.iter().map(|_| RecordResult::Skipped).collect();
        }
    };

    let mut ranges = HashMap::new();
    let mut results = Vec::with_capacity(records.len());
    for prediction in records {
        results.push(
            process_one(store, market, prediction, quote, &mut ranges, now, policy, fetch_timeout)
                .await,
        );
    }
    results
}

#[allow(clippy::too_many_arguments)]
async fn process_one(
    store: &dyn PredictionStore,
    market: &dyn MarketData,
    prediction: &Prediction,
    quote: Quote,
    ranges: &mut HashMap<(DateTime<Utc>, DateTime<Utc>), PriceRange>,
    now: DateTime<Utc>,
    policy: &OutcomePolicy,
    fetch_timeout: Duration,
) -> RecordResult {
    let range = match price_range(market, prediction, quote, ranges, now, fetch_timeout).await {
        Ok(r) => r,
        Err(e) => {
            warn!(
                "Skipping {} ({}) this pass: {}",
                prediction.id, prediction.symbol, e
            );
            return RecordResult::Skipped;
        }
    };
    let check = PriceCheck::new(&prediction.symbol, quote, range);

    let Some(outcome) = evaluate(prediction, &check, now, policy) else {
        debug!(
            "{} {} still pending (price {:.4}, high {:.4}, low {:.4})",
            prediction.symbol,
            prediction.direction,
            check.current_price,
            check.high_since_entry,
            check.low_since_entry
        );
        return RecordResult::Unchanged;
    };

    let status = outcome.status;
    match store.update(prediction.id, outcome).await {
        Ok(()) => {
            debug!(
                "{} {} resolved as {}",
                prediction.symbol, prediction.id, status
            );
            RecordResult::Resolved(status)
        }
        Err(StoreError::NotFound(id)) => {
            debug!("{} already resolved by another pass", id);
            RecordResult::Conflict
        }
        Err(e) => RecordResult::Failed(e),
    }
}

/// High/low reached since the call. The window stops at the expiry so
/// moves after expiry never resolve a prediction, and an expired record
/// with no history in its window is retried rather than expired blind.
async fn price_range(
    market: &dyn MarketData,
    prediction: &Prediction,
    quote: Quote,
    ranges: &mut HashMap<(DateTime<Utc>, DateTime<Utc>), PriceRange>,
    now: DateTime<Utc>,
    fetch_timeout: Duration,
) -> Result<PriceRange, MarketDataError> {
    let symbol = prediction.symbol.as_str();
    let expired = now > prediction.expiry_date;
    let until = now.min(prediction.expiry_date);
    let flat = PriceRange {
        high: prediction.entry_price,
        low: prediction.entry_price,
    };
    let window = (prediction.prediction_date, until);

    let range = if until <= prediction.prediction_date {
        flat
    } else if let Some(cached) = ranges.get(&window) {
        *cached
    } else {
        let fetched = timeout(fetch_timeout, market.get_range(symbol, window.0, window.1))
            .await
            .map_err(|_| MarketDataError::Timeout(symbol.to_string()))?;
        match fetched {
            Ok(range) => {
                ranges.insert(window, range);
                range
            }
            // Live window with no closed candle yet; the quote covers it below
            Err(MarketDataError::NoData(_)) if !expired => flat,
            Err(e) => return Err(e),
        }
    };

    Ok(if expired {
        range
    } else {
        range.including(quote.price)
    })
}
