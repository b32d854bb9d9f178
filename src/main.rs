use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use prediction_ledger::api;
use prediction_ledger::config::Config;
use prediction_ledger::evaluation::OutcomeEvaluator;
use prediction_ledger::market::RestMarketData;
use prediction_ledger::service::BacktestService;
use prediction_ledger::store::{MemoryStore, PredictionStore};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .init();

    let store: Arc<dyn PredictionStore> = Arc::new(
        MemoryStore::open(&cfg.ledger_file)
            .with_context(|| format!("opening ledger {}", cfg.ledger_file))?,
    );
    let market = Arc::new(RestMarketData::new(
        &cfg.market_data_url,
        Duration::from_secs(cfg.fetch_timeout_secs.max(1)),
    )?);
    let evaluator = OutcomeEvaluator::new(store.clone(), market, &cfg);
    let service = Arc::new(BacktestService::new(store, evaluator, &cfg));

    if cfg.check_interval_secs > 0 {
        tokio::spawn(check_loop(service.clone(), cfg.check_interval_secs));
    } else {
        info!("Scheduled checks disabled; use POST /api/backtest/check");
    }

    let listener = TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("binding {}", cfg.bind_addr))?;
    info!("Prediction ledger listening on {}", cfg.bind_addr);

    let state = api::AppState::new(service, cfg.ingest_token.clone());
    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown signal received");
        })
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn check_loop(service: Arc<BacktestService>, every_secs: u64) {
    let mut tick = interval(Duration::from_secs(every_secs));
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!("Checking pending predictions every {}s", every_secs);

    loop {
        tick.tick().await;
        match service.check_pending_predictions().await {
            Ok(report) if report.checked > 0 => info!(
                "Scheduled check: {} checked, {} resolved, {} skipped",
                report.checked,
                report.resolved(),
                report.skipped_on_error
            ),
            Ok(_) => {}
            Err(e) => error!("Scheduled check failed: {}", e),
        }
    }
}
