use chrono::{DateTime, Utc};

use crate::config::{TieBreak, DEFAULT_NOTIONAL_UNIT, DEFAULT_TIE_BREAK};
use crate::models::{AssetType, Direction, Outcome, Prediction, PriceCheck, PredictionStatus};

/// Knobs for the resolution rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutcomePolicy {
    pub notional_unit: f64,
    pub tie_break: TieBreak,
}

impl Default for OutcomePolicy {
    fn default() -> Self {
        Self {
            notional_unit: DEFAULT_NOTIONAL_UNIT,
            tie_break: DEFAULT_TIE_BREAK,
        }
    }
}

fn target_crossed(direction: Direction, check: &PriceCheck, level: f64) -> bool {
    match direction {
        Direction::Bullish => check.high_since_entry >= level,
        Direction::Bearish => check.low_since_entry <= level,
        Direction::Neutral => false,
    }
}

fn stop_crossed(direction: Direction, check: &PriceCheck, stop: f64) -> bool {
    match direction {
        Direction::Bullish => check.low_since_entry <= stop,
        Direction::Bearish => check.high_since_entry >= stop,
        Direction::Neutral => false,
    }
}

fn round4(x: f64) -> f64 {
    (x * 10000.0).round() / 10000.0
}

struct Resolution {
    status: PredictionStatus,
    exit_price: f64,
    pnl_percent: f64,
    note: String,
}

#[derive(Default)]
struct Hits {
    target: bool,
    stop: bool,
    tp: [bool; 3],
}

/// Decide whether `p` resolves given the latest price check. Returns `None`
/// when the prediction stays pending (or is already terminal).
pub fn evaluate(
    p: &Prediction,
    check: &PriceCheck,
    now: DateTime<Utc>,
    policy: &OutcomePolicy,
) -> Option<Outcome> {
    if p.status.is_terminal() {
        return None;
    }
    let expired = now > p.expiry_date;
    let direction = p.direction;

    let mut hits = Hits {
        target: target_crossed(direction, check, p.target_price),
        stop: stop_crossed(direction, check, p.stop_loss),
        ..Default::default()
    };
    for (slot, level) in hits.tp.iter_mut().zip([p.tp1, p.tp2, p.tp3]) {
        *slot = level.is_some_and(|l| target_crossed(direction, check, l));
    }

    let resolution = match (direction, p.asset_type) {
        (Direction::Neutral, _) => expired.then(|| Resolution {
            status: PredictionStatus::Expired,
            exit_price: check.current_price,
            pnl_percent: 0.0,
            note: "neutral call reached expiry".to_string(),
        }),
        (_, AssetType::Forex) => resolve_ladder(p, check, &hits, expired, policy.tie_break),
        (_, AssetType::Stock) => resolve_single(p, check, &hits, expired, policy.tie_break),
    }?;

    let pnl_percent = round4(resolution.pnl_percent);
    Some(Outcome {
        status: resolution.status,
        exit_price: resolution.exit_price,
        exit_date: check.checked_at,
        pnl_percent,
        pnl_amount: round4(pnl_percent / 100.0 * policy.notional_unit),
        hit_target: hits.target,
        hit_stop: hits.stop,
        hit_tp1: hits.tp[0],
        hit_tp2: hits.tp[1],
        hit_tp3: hits.tp[2],
        notes: Some(resolution.note),
    })
}

fn resolve_single(
    p: &Prediction,
    check: &PriceCheck,
    hits: &Hits,
    expired: bool,
    tie_break: TieBreak,
) -> Option<Resolution> {
    let stop_wins = hits.stop && (!hits.target || tie_break == TieBreak::StopFirst);
    if stop_wins {
        return Some(Resolution {
            status: PredictionStatus::Lost,
            exit_price: p.stop_loss,
            pnl_percent: p.direction.pnl_percent(p.entry_price, p.stop_loss),
            note: if hits.target {
                "target and stop crossed in the same check; stop charged first".to_string()
            } else {
                "stop loss hit".to_string()
            },
        });
    }
    if hits.target {
        return Some(Resolution {
            status: PredictionStatus::Won,
            exit_price: p.target_price,
            pnl_percent: p.direction.pnl_percent(p.entry_price, p.target_price),
            note: "target hit".to_string(),
        });
    }
    expired.then(|| Resolution {
        status: PredictionStatus::Expired,
        exit_price: check.current_price,
        pnl_percent: p.direction.pnl_percent(p.entry_price, check.current_price),
        note: "expired without touching target or stop".to_string(),
    })
}

/// Equal-weight legs across the configured ladder. A hit level closes its
/// leg at the level, an unhit leg closes at `exit_price`.
fn ladder_pnl(p: &Prediction, levels: &[(f64, bool)], exit_price: f64) -> f64 {
    if levels.is_empty() {
        return p.direction.pnl_percent(p.entry_price, exit_price);
    }
    let total: f64 = levels
        .iter()
        .map(|&(level, hit)| {
            let leg_exit = if hit { level } else { exit_price };
            p.direction.pnl_percent(p.entry_price, leg_exit)
        })
        .sum();
    total / levels.len() as f64
}

fn resolve_ladder(
    p: &Prediction,
    check: &PriceCheck,
    hits: &Hits,
    expired: bool,
    tie_break: TieBreak,
) -> Option<Resolution> {
    let configured: Vec<(f64, bool)> = [p.tp1, p.tp2, p.tp3]
        .into_iter()
        .zip(hits.tp)
        .filter_map(|(level, hit)| level.map(|l| (l, hit)))
        .collect();
    let levels = if configured.is_empty() {
        vec![(p.target_price, hits.target)]
    } else {
        configured
    };

    let hit_count = levels.iter().filter(|(_, hit)| *hit).count();
    let all_hit = hit_count == levels.len();

    if hits.stop && (!all_hit || tie_break == TieBreak::StopFirst) {
        return Some(Resolution {
            status: PredictionStatus::Lost,
            exit_price: p.stop_loss,
            pnl_percent: p.direction.pnl_percent(p.entry_price, p.stop_loss),
            note: format!(
                "stop loss hit with {}/{} take-profits reached",
                hit_count,
                levels.len()
            ),
        });
    }
    if all_hit {
        let exit_price = levels.last().map(|(l, _)| *l).unwrap_or(p.target_price);
        return Some(Resolution {
            status: PredictionStatus::Won,
            exit_price,
            pnl_percent: ladder_pnl(p, &levels, exit_price),
            note: format!("all {} take-profits hit", levels.len()),
        });
    }
    if !expired {
        return None;
    }
    if hit_count > 0 {
        Some(Resolution {
            status: PredictionStatus::Partial,
            exit_price: check.current_price,
            pnl_percent: ladder_pnl(p, &levels, check.current_price),
            note: format!(
                "expired with {}/{} take-profits hit",
                hit_count,
                levels.len()
            ),
        })
    } else {
        Some(Resolution {
            status: PredictionStatus::Expired,
            exit_price: check.current_price,
            pnl_percent: p.direction.pnl_percent(p.entry_price, check.current_price),
            note: "expired without reaching a take-profit".to_string(),
        })
    }
}
