use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::models::{Prediction, PredictionStatus};

use super::stats::{compute, win_rate, BacktestStats, StatsOptions};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupStats {
    pub key: String,
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub pending: usize,
    pub win_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MonthlyStats {
    /// Calendar month in UTC, `YYYY-MM`.
    pub month: String,
    pub trades: usize,
    pub wins: usize,
    pub win_rate: f64,
    pub total_pnl_percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BacktestSummary {
    #[serde(flatten)]
    pub stats: BacktestStats,
    pub recent_trades: Vec<Prediction>,
    pub by_symbol: Vec<GroupStats>,
    pub by_strategy: Vec<GroupStats>,
    pub monthly: Vec<MonthlyStats>,
}

fn group_by<F>(records: &[Prediction], key: F) -> Vec<GroupStats>
where
    F: Fn(&Prediction) -> String,
{
    let mut groups: HashMap<String, GroupStats> = HashMap::new();
    for p in records {
        let k = key(p);
        let entry = groups.entry(k.clone()).or_insert_with(|| GroupStats {
            key: k,
            ..Default::default()
        });
        entry.trades += 1;
        match p.status {
            s if s.is_win() => entry.wins += 1,
            PredictionStatus::Lost => entry.losses += 1,
            PredictionStatus::Pending => entry.pending += 1,
            _ => {}
        }
    }

    let mut out: Vec<GroupStats> = groups
        .into_values()
        .map(|mut g| {
            g.win_rate = win_rate(g.wins, g.losses);
            g
        })
        .collect();
    out.sort_by(|a, b| b.trades.cmp(&a.trades).then_with(|| a.key.cmp(&b.key)));
    out
}

fn monthly(records: &[Prediction]) -> Vec<MonthlyStats> {
    // (year, month) -> (trades, wins, losses, pnl)
    let mut buckets: BTreeMap<(i32, u32), (usize, usize, usize, f64)> = BTreeMap::new();
    for p in records.iter().filter(|p| p.status.is_decisive()) {
        let d = p.prediction_date;
        let b = buckets.entry((d.year(), d.month())).or_default();
        b.0 += 1;
        if p.status.is_win() {
            b.1 += 1;
        } else if p.status == PredictionStatus::Lost {
            b.2 += 1;
        }
        b.3 += p.pnl_percent.unwrap_or(0.0);
    }

    buckets
        .into_iter()
        .map(|((year, month), (trades, wins, losses, pnl))| MonthlyStats {
            month: format!("{:04}-{:02}", year, month),
            trades,
            wins,
            win_rate: win_rate(wins, losses),
            total_pnl_percent: pnl,
        })
        .collect()
}

/// Stats plus recent records, symbol/strategy groupings and monthly buckets.
pub fn summarize(records: &[Prediction], now: DateTime<Utc>, opts: &StatsOptions) -> BacktestSummary {
    let mut recent: Vec<Prediction> = records.to_vec();
    recent.sort_by(|a, b| b.prediction_date.cmp(&a.prediction_date));
    recent.truncate(opts.recent_limit);

    BacktestSummary {
        stats: compute(records, now, opts),
        recent_trades: recent,
        by_symbol: group_by(records, |p| p.symbol.clone()),
        by_strategy: group_by(records, Prediction::strategy_key),
        monthly: monthly(records),
    }
}

fn fmt_symbol(s: &Option<String>) -> &str {
    s.as_deref().unwrap_or("n/a")
}

impl BacktestSummary {
    pub fn print_summary(&self) {
        let s = &self.stats;
        println!("\n{}", "=".repeat(70));
        println!("  PREDICTION BACKTEST REPORT");
        println!("{}", "=".repeat(70));
        println!();
        println!("  OUTCOMES");
        println!("  ───────────────────────────────────");
        println!("  Total:       {}", s.total_trades);
        println!(
            "  Won/Lost:    {} / {}  (partial {})",
            s.won_trades, s.lost_trades, s.partial_trades
        );
        println!("  Expired:     {}", s.expired_trades);
        println!("  Pending:     {}", s.pending_trades);
        println!();
        println!("  PERFORMANCE");
        println!("  ───────────────────────────────────");
        println!("  Win Rate:    {:.1}%", s.win_rate);
        println!("  Avg Win:     {:+.2}%", s.avg_win_percent);
        println!("  Avg Loss:    {:+.2}%", s.avg_loss_percent);
        println!("  Best:        {:+.2}%", s.best_trade_percent);
        println!("  Worst:       {:+.2}%", s.worst_trade_percent);
        println!("  Total PnL:   {:+.2}%", s.total_pnl_percent);
        if s.profit_factor.is_infinite() {
            println!("  Profit Factor: inf");
        } else {
            println!("  Profit Factor: {:.2}", s.profit_factor);
        }
        println!("  Avg Hold:    {:.1} days", s.avg_trade_duration_days);
        println!("  Last 10:     {:.1}%", s.last_10_trades_win_rate);
        println!("  Last 30d:    {:.1}%", s.last_30_days_win_rate);
        println!();
        println!("  BREAKDOWN");
        println!("  ───────────────────────────────────");
        for (label, b) in [
            ("bullish", &s.bullish),
            ("bearish", &s.bearish),
            ("high conf", &s.high_confidence),
            ("low conf", &s.low_confidence),
        ] {
            println!(
                "  {:>10}: {} trades | {}W/{}L | WR {:.0}%",
                label, b.trades, b.wins, b.losses, b.win_rate
            );
        }
        println!(
            "  Best symbol: {} | Worst symbol: {}",
            fmt_symbol(&s.best_symbol),
            fmt_symbol(&s.worst_symbol)
        );

        if !self.by_symbol.is_empty() {
            println!();
            println!("  BY SYMBOL");
            println!("  ───────────────────────────────────");
            for g in &self.by_symbol {
                println!(
                    "  {:>10}: {} trades | {}W/{}L | {} pending | WR {:.0}%",
                    g.key, g.trades, g.wins, g.losses, g.pending, g.win_rate
                );
            }
        }

        if !self.by_strategy.is_empty() {
            println!();
            println!("  BY STRATEGY");
            println!("  ───────────────────────────────────");
            for g in &self.by_strategy {
                println!(
                    "  {:>16}: {} trades | {}W/{}L | WR {:.0}%",
                    g.key, g.trades, g.wins, g.losses, g.win_rate
                );
            }
        }

        if !self.monthly.is_empty() {
            println!();
            println!("  BY MONTH");
            println!("  ───────────────────────────────────");
            for m in &self.monthly {
                println!(
                    "  {}: {} trades | {} wins | WR {:.0}% | PnL {:+.2}%",
                    m.month, m.trades, m.wins, m.win_rate, m.total_pnl_percent
                );
            }
        }

        println!("{}", "=".repeat(70));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Direction;
    use crate::test_helpers::{prediction, resolved, ts};

    #[test]
    fn groups_by_symbol_and_strategy() {
        let mut call = resolved("AAPL", PredictionStatus::Won, 4.0, ts("2024-05-02T00:00:00Z"), 2);
        call.option_strategy = Some("long_call".to_string());
        let mut put = resolved("AAPL", PredictionStatus::Lost, -3.0, ts("2024-05-03T00:00:00Z"), 2);
        put.option_strategy = Some("long_put".to_string());
        let fx = resolved("EURUSD", PredictionStatus::Partial, 0.2, ts("2024-05-04T00:00:00Z"), 2);
        let open = prediction("AAPL", Direction::Bullish, ts("2024-05-05T00:00:00Z"));

        let summary = summarize(
            &[call, put, fx, open],
            ts("2024-06-01T00:00:00Z"),
            &StatsOptions::default(),
        );

        let aapl = &summary.by_symbol[0];
        assert_eq!(aapl.key, "AAPL");
        assert_eq!((aapl.trades, aapl.wins, aapl.losses, aapl.pending), (3, 1, 1, 1));
        assert!((aapl.win_rate - 50.0).abs() < 1e-9);

        let keys: Vec<&str> = summary.by_strategy.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["forex", "long_call", "long_put"]);
        let forex = &summary.by_strategy[0];
        assert_eq!((forex.trades, forex.wins, forex.pending), (2, 1, 1));
    }

    #[test]
    fn months_are_chronological_and_skip_undecided() {
        let records = vec![
            resolved("AAPL", PredictionStatus::Won, 5.0, ts("2024-03-15T00:00:00Z"), 2),
            resolved("AAPL", PredictionStatus::Lost, -2.0, ts("2024-01-31T23:59:00Z"), 2),
            resolved("AAPL", PredictionStatus::Won, 1.5, ts("2024-01-02T00:00:00Z"), 2),
            resolved("AAPL", PredictionStatus::Expired, 0.5, ts("2024-03-01T00:00:00Z"), 14),
            prediction("AAPL", Direction::Bullish, ts("2024-02-10T00:00:00Z")),
        ];
        let summary = summarize(&records, ts("2024-04-01T00:00:00Z"), &StatsOptions::default());

        let months: Vec<&str> = summary.monthly.iter().map(|m| m.month.as_str()).collect();
        assert_eq!(months, vec!["2024-01", "2024-03"]);

        let jan = &summary.monthly[0];
        assert_eq!((jan.trades, jan.wins), (2, 1));
        assert!((jan.win_rate - 50.0).abs() < 1e-9);
        assert!((jan.total_pnl_percent + 0.5).abs() < 1e-9);

        let mar = &summary.monthly[1];
        assert_eq!((mar.trades, mar.wins), (1, 1));
        assert!((mar.win_rate - 100.0).abs() < 1e-9);
        assert!((mar.total_pnl_percent - 5.0).abs() < 1e-9);
    }

    #[test]
    fn recent_trades_are_newest_first_and_capped() {
        let records: Vec<Prediction> = (0..15)
            .map(|i| {
                prediction(
                    "AAPL",
                    Direction::Bullish,
                    ts("2024-05-01T00:00:00Z") + chrono::Duration::days(i),
                )
            })
            .collect();
        let opts = StatsOptions {
            recent_limit: 5,
            ..Default::default()
        };
        let summary = summarize(&records, ts("2024-06-01T00:00:00Z"), &opts);
        assert_eq!(summary.recent_trades.len(), 5);
        assert_eq!(
            summary.recent_trades[0].prediction_date,
            ts("2024-05-15T00:00:00Z")
        );
        assert_eq!(summary.stats.total_trades, 15);
    }
}
