mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use prediction_ledger::analytics::{export_csv, summarize, StatsOptions};
use prediction_ledger::evaluation::OutcomeEvaluator;
use prediction_ledger::models::{BacktestFilters, Direction, PredictionStatus, StatusFilter};
use prediction_ledger::service::BacktestService;
use prediction_ledger::store::{MemoryStore, PredictionStore};

use common::{forex_call, stock_call, test_config, ts, ScriptedMarket};

fn temp_ledger(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "prediction_ledger_{}_{}.json",
        name,
        std::process::id()
    ))
}

#[tokio::test]
async fn ledger_lifecycle_from_save_to_export() {
    let cfg = test_config();
    let path = temp_ledger("lifecycle");
    let _ = std::fs::remove_file(&path);

    let made = ts("2024-03-01T00:00:00Z");
    let store: Arc<dyn PredictionStore> = Arc::new(MemoryStore::open(&path).unwrap());

    let market = Arc::new(
        ScriptedMarket::new(ts("2024-03-05T00:00:00Z"))
            .script("AAPL", 105.0, 112.0, 99.0)
            .script("TSLA", 104.0, 111.0, 98.0)
            .script("EURUSD", 1.1080, 1.1120, 1.0980)
            .script("MSFT", 101.0, 102.0, 99.0),
    );

    let mut evaluator = OutcomeEvaluator::new(store.clone(), market.clone(), &cfg);
    evaluator.sim_time = Some(ts("2024-03-05T00:00:00Z"));
    let mut service = BacktestService::new(store.clone(), evaluator, &cfg);
    service.sim_time = Some(ts("2024-03-21T00:00:00Z"));

    let aapl = service.save(stock_call("AAPL", Direction::Bullish, made)).await.unwrap();
    let tsla = service.save(stock_call("TSLA", Direction::Bearish, made)).await.unwrap();
    let fx = service.save(forex_call(made)).await.unwrap();
    let msft = service.save(stock_call("MSFT", Direction::Bullish, made)).await.unwrap();

    // Mid-window: single-target calls resolve, the ladder waits
    let first = service.check_pending_predictions().await.unwrap();
    assert_eq!(first.checked, 4);
    assert_eq!(first.resolved_won, 1);
    assert_eq!(first.resolved_lost, 1);
    assert_eq!(first.skipped_on_error, 0);

    let won = store.get(aapl).await.unwrap().unwrap();
    assert_eq!(won.status, PredictionStatus::Won);
    assert!((won.pnl_percent.unwrap() - 10.0).abs() < 1e-9);
    assert_eq!(won.exit_date, Some(ts("2024-03-05T00:00:00Z")));

    let lost = store.get(tsla).await.unwrap().unwrap();
    assert_eq!(lost.status, PredictionStatus::Lost);
    assert!(lost.hit_stop);
    assert!((lost.pnl_percent.unwrap() + 10.0).abs() < 1e-9);

    assert_eq!(
        store.get(fx).await.unwrap().unwrap().status,
        PredictionStatus::Pending
    );

    // After expiry
    let mut late = OutcomeEvaluator::new(store.clone(), market.clone(), &cfg);
    late.sim_time = Some(ts("2024-03-20T00:00:00Z"));
    let second = late.run_pass().await.unwrap();
    assert_eq!(second.checked, 2);
    assert_eq!(second.resolved_partial, 1);
    assert_eq!(second.resolved_expired, 1);

    let partial = store.get(fx).await.unwrap().unwrap();
    assert_eq!(partial.status, PredictionStatus::Partial);
    assert!(partial.hit_tp1 && partial.hit_tp2 && !partial.hit_tp3);
    assert!(partial.pnl_percent.unwrap() > 0.0);

    let expired = store.get(msft).await.unwrap().unwrap();
    assert_eq!(expired.status, PredictionStatus::Expired);
    assert!((expired.pnl_percent.unwrap() - 1.0).abs() < 1e-9);

    // Statistics
    let stats = service
        .get_backtest_stats("user-1", &BacktestFilters::default())
        .await
        .unwrap();
    assert_eq!(stats.total_trades, 4);
    assert_eq!(stats.pending_trades, 0);
    assert_eq!(
        (stats.won_trades, stats.lost_trades, stats.partial_trades, stats.expired_trades),
        (1, 1, 1, 1)
    );
    assert!((stats.win_rate - 200.0 / 3.0).abs() < 0.01);
    assert!((stats.best_trade_percent - 10.0).abs() < 1e-9);
    assert!((stats.worst_trade_percent + 10.0).abs() < 1e-9);

    let summary = service
        .get_backtest_summary("user-1", &BacktestFilters::default())
        .await
        .unwrap();
    assert_eq!(summary.by_symbol.len(), 4);
    assert_eq!(summary.monthly.len(), 1);
    assert_eq!(summary.monthly[0].month, "2024-03");

    let symbols = service.get_backtest_symbols("user-1").await.unwrap();
    assert_eq!(
        symbols.into_iter().collect::<Vec<_>>(),
        vec!["AAPL", "EURUSD", "MSFT", "TSLA"]
    );

    let losers = BacktestFilters {
        status: StatusFilter::Lost,
        ..Default::default()
    };
    let csv = service.export_backtest_data("user-1", &losers).await.unwrap();
    assert_eq!(csv.lines().count(), 2);
    assert!(csv.contains(",TSLA,"));

    // The snapshot survives a restart
    let reopened = MemoryStore::open(&path).unwrap();
    let all = reopened.all().await;
    assert_eq!(all.len(), 4);
    assert!(all.iter().all(|p| p.status.is_terminal()));

    let offline = summarize(&all, ts("2024-03-21T00:00:00Z"), &StatsOptions::default());
    assert_eq!(offline.stats.total_trades, 4);
    assert_eq!(export_csv(&all).unwrap().lines().count(), 5);

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn overlapping_passes_resolve_each_record_once() {
    let mut cfg = test_config();
    cfg.max_concurrent_fetches = 3;
    let made = ts("2024-03-01T00:00:00Z");
    let now = ts("2024-03-04T00:00:00Z");

    let store: Arc<dyn PredictionStore> = Arc::new(MemoryStore::new());
    let mut ids = Vec::new();
    for _ in 0..12 {
        ids.push(store.save(stock_call("AAPL", Direction::Bullish, made)).await.unwrap());
    }

    let market = Arc::new(
        ScriptedMarket::new(now)
            .with_delay(Duration::from_millis(20))
            .script("AAPL", 108.0, 111.0, 97.0),
    );

    let mut a = OutcomeEvaluator::new(store.clone(), market.clone(), &cfg);
    a.sim_time = Some(now);
    let mut b = OutcomeEvaluator::new(store.clone(), market.clone(), &cfg);
    b.sim_time = Some(now);

    let (ra, rb) = tokio::join!(a.run_pass(), b.run_pass());
    let (ra, rb) = (ra.unwrap(), rb.unwrap());
    assert_eq!(ra.resolved_won + rb.resolved_won, 12);
    // One quote per symbol per pass
    assert_eq!(market.quote_calls.load(Ordering::SeqCst), 2);

    for id in ids {
        let p = store.get(id).await.unwrap().unwrap();
        assert_eq!(p.status, PredictionStatus::Won);
        assert_eq!(p.notes.as_deref(), Some("target hit"));
    }

    let again = a.run_pass().await.unwrap();
    assert_eq!(again.checked, 0);
}

#[tokio::test]
async fn provider_outage_leaves_records_pending_for_next_pass() {
    let cfg = test_config();
    let made = ts("2024-03-01T00:00:00Z");
    let now = ts("2024-03-04T00:00:00Z");

    let store: Arc<dyn PredictionStore> = Arc::new(MemoryStore::new());
    let nvda = store
        .save(stock_call("NVDA", Direction::Bullish, made))
        .await
        .unwrap();
    store
        .save(stock_call("AAPL", Direction::Bullish, made))
        .await
        .unwrap();

    let down = Arc::new(
        ScriptedMarket::new(now)
            .script("AAPL", 112.0, 112.0, 99.0)
            .failing("NVDA"),
    );
    let mut ev = OutcomeEvaluator::new(store.clone(), down.clone(), &cfg);
    ev.sim_time = Some(now);

    let report = ev.run_pass().await.unwrap();
    assert_eq!(report.skipped_on_error, 1);
    assert_eq!(report.resolved_won, 1);
    assert_eq!(down.quote_calls.load(Ordering::SeqCst), 2);

    let still = store.get(nvda).await.unwrap().unwrap();
    assert_eq!(still.status, PredictionStatus::Pending);
    assert!(still.exit_price.is_none());

    let up = Arc::new(ScriptedMarket::new(now).script("NVDA", 89.0, 101.0, 89.0));
    let mut retry = OutcomeEvaluator::new(store.clone(), up, &cfg);
    retry.sim_time = Some(now);
    let report = retry.run_pass().await.unwrap();
    assert_eq!(report.checked, 1);
    assert_eq!(report.resolved_lost, 1);
}
