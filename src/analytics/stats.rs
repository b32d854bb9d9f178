use chrono::{DateTime, Duration, Utc};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::config::DEFAULT_MIN_SYMBOL_TRADES;
use crate::models::{Direction, Prediction, PredictionStatus};

/// Confidence strictly above this is "high".
pub const HIGH_CONFIDENCE_THRESHOLD: f64 = 70.0;
const RECENT_TRADE_WINDOW: usize = 10;
const RECENT_DAYS_WINDOW: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsOptions {
    /// Decisive trades a symbol needs before it can be best/worst.
    pub min_symbol_trades: usize,
    /// How many records the summary lists as recent.
    pub recent_limit: usize,
}

impl Default for StatsOptions {
    fn default() -> Self {
        Self {
            min_symbol_trades: DEFAULT_MIN_SYMBOL_TRADES,
            recent_limit: 10,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BreakdownStats {
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BacktestStats {
    pub total_trades: usize,
    pub won_trades: usize,
    pub lost_trades: usize,
    pub partial_trades: usize,
    pub expired_trades: usize,
    pub pending_trades: usize,

    pub win_rate: f64,
    pub avg_win_percent: f64,
    pub avg_loss_percent: f64,
    pub total_pnl_percent: f64,
    /// `f64::INFINITY` when there are gains but no losses.
    #[serde(serialize_with = "serialize_ratio")]
    pub profit_factor: f64,

    pub bullish: BreakdownStats,
    pub bearish: BreakdownStats,
    pub high_confidence: BreakdownStats,
    pub low_confidence: BreakdownStats,

    pub avg_trade_duration_days: f64,
    pub last_10_trades_win_rate: f64,
    pub last_30_days_win_rate: f64,

    pub best_trade_percent: f64,
    pub worst_trade_percent: f64,
    pub best_symbol: Option<String>,
    pub worst_symbol: Option<String>,
}

fn serialize_ratio<S: Serializer>(value: &f64, s: S) -> Result<S::Ok, S::Error> {
    if value.is_infinite() {
        s.serialize_str(if *value > 0.0 { "Infinity" } else { "-Infinity" })
    } else {
        s.serialize_f64(*value)
    }
}

/// wins / (wins + losses) * 100, or 0 when nothing is decisive.
pub(crate) fn win_rate(wins: usize, losses: usize) -> f64 {
    let decisive = wins + losses;
    if decisive == 0 {
        0.0
    } else {
        wins as f64 * 100.0 / decisive as f64
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn pnl(p: &Prediction) -> f64 {
    p.pnl_percent.unwrap_or(0.0)
}

fn breakdown<'a, I>(records: I) -> BreakdownStats
where
    I: IntoIterator<Item = &'a Prediction>,
{
    let mut out = BreakdownStats::default();
    for p in records {
        out.trades += 1;
        if p.status.is_win() {
            out.wins += 1;
        } else if p.status == PredictionStatus::Lost {
            out.losses += 1;
        }
    }
    out.win_rate = win_rate(out.wins, out.losses);
    out
}

fn rate_of<'a, I>(records: I) -> f64
where
    I: IntoIterator<Item = &'a Prediction>,
{
    let b = breakdown(records);
    win_rate(b.wins, b.losses)
}

/// Compute performance statistics over an immutable record set.
pub fn compute(records: &[Prediction], now: DateTime<Utc>, opts: &StatsOptions) -> BacktestStats {
    let count = |status: PredictionStatus| records.iter().filter(|p| p.status == status).count();

    let winners: Vec<f64> = records
        .iter()
        .filter(|p| p.status.is_win())
        .map(pnl)
        .collect();
    let losers: Vec<f64> = records
        .iter()
        .filter(|p| p.status == PredictionStatus::Lost)
        .map(pnl)
        .collect();

    let win_sum: f64 = winners.iter().sum();
    let loss_sum: f64 = losers.iter().sum();
    let profit_factor = if loss_sum != 0.0 {
        win_sum / loss_sum.abs()
    } else if win_sum > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };

    // Won, partial and lost only; expired and pending never move the numbers
    let mut decisive: Vec<&Prediction> =
        records.iter().filter(|p| p.status.is_decisive()).collect();
    decisive.sort_by(|a, b| b.prediction_date.cmp(&a.prediction_date));

    let durations: Vec<f64> = decisive.iter().filter_map(|p| p.duration_days()).collect();
    let decisive_pnls: Vec<f64> = decisive.iter().filter_map(|p| p.pnl_percent).collect();

    let cutoff = now - Duration::days(RECENT_DAYS_WINDOW);
    let (best_symbol, worst_symbol) = rank_symbols(&decisive, opts.min_symbol_trades);

    BacktestStats {
        total_trades: records.len(),
        won_trades: count(PredictionStatus::Won),
        lost_trades: count(PredictionStatus::Lost),
        partial_trades: count(PredictionStatus::Partial),
        expired_trades: count(PredictionStatus::Expired),
        pending_trades: count(PredictionStatus::Pending),

        win_rate: win_rate(winners.len(), losers.len()),
        avg_win_percent: mean(&winners),
        avg_loss_percent: mean(&losers),
        total_pnl_percent: decisive_pnls.iter().sum(),
        profit_factor,

        bullish: breakdown(records.iter().filter(|p| p.direction == Direction::Bullish)),
        bearish: breakdown(records.iter().filter(|p| p.direction == Direction::Bearish)),
        high_confidence: breakdown(
            records
                .iter()
                .filter(|p| p.confidence > HIGH_CONFIDENCE_THRESHOLD),
        ),
        low_confidence: breakdown(
            records
                .iter()
                .filter(|p| p.confidence <= HIGH_CONFIDENCE_THRESHOLD),
        ),

        avg_trade_duration_days: mean(&durations),
        last_10_trades_win_rate: rate_of(decisive.iter().copied().take(RECENT_TRADE_WINDOW)),
        last_30_days_win_rate: rate_of(
            decisive
                .iter()
                .copied()
                .filter(|p| p.prediction_date >= cutoff && p.prediction_date <= now),
        ),

        best_trade_percent: decisive_pnls.iter().copied().reduce(f64::max).unwrap_or(0.0),
        worst_trade_percent: decisive_pnls.iter().copied().reduce(f64::min).unwrap_or(0.0),
        best_symbol,
        worst_symbol,
    }
}

/// Best and worst symbol by win rate among symbols with enough decisive
/// trades. Ties go to the larger sample, then alphabetical order.
fn rank_symbols(decisive: &[&Prediction], min_trades: usize) -> (Option<String>, Option<String>) {
    let mut per_symbol: HashMap<&str, (usize, usize)> = HashMap::new();
    for p in decisive {
        let entry = per_symbol.entry(p.symbol.as_str()).or_default();
        if p.status.is_win() {
            entry.0 += 1;
        } else {
            entry.1 += 1;
        }
    }

    let eligible: Vec<(&str, usize, f64)> = per_symbol
        .into_iter()
        .filter(|(_, (w, l))| w + l >= min_trades.max(1))
        .map(|(s, (w, l))| (s, w + l, win_rate(w, l)))
        .collect();

    let best = eligible
        .iter()
        .min_by(|a, b| {
            b.2.partial_cmp(&a.2)
                .unwrap_or(Ordering::Equal)
                .then_with(|| tie_order(a, b))
        })
        .map(|e| e.0.to_string());
    let worst = eligible
        .iter()
        .min_by(|a, b| {
            a.2.partial_cmp(&b.2)
                .unwrap_or(Ordering::Equal)
                .then_with(|| tie_order(a, b))
        })
        .map(|e| e.0.to_string());

    (best, worst)
}

fn tie_order(a: &(&str, usize, f64), b: &(&str, usize, f64)) -> Ordering {
    b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0))
}
