use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use prediction_ledger::analytics::{export_csv, summarize, StatsOptions};
use prediction_ledger::config::Config;
use prediction_ledger::store::MemoryStore;

/// Usage: backtest-report [ledger.json] [out.csv]
#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let ledger = args.get(1).cloned().unwrap_or_else(|| cfg.ledger_file.clone());
    let csv_out = args.get(2);

    let store = MemoryStore::open(&ledger).with_context(|| format!("opening ledger {}", ledger))?;
    let records = store.all().await;
    if records.is_empty() {
        println!("No predictions in {}", ledger);
        return Ok(());
    }

    let opts = StatsOptions {
        min_symbol_trades: cfg.min_symbol_trades,
        recent_limit: cfg.recent_trades_limit,
    };
    summarize(&records, Utc::now(), &opts).print_summary();

    if let Some(path) = csv_out {
        let csv = export_csv(&records)?;
        std::fs::write(path, csv).with_context(|| format!("writing {}", path))?;
        info!("Wrote {} records to {}", records.len(), path);
    }

    Ok(())
}
