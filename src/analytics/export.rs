use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::ExportError;
use crate::models::Prediction;

pub const CSV_COLUMNS: [&str; 31] = [
    "id",
    "job_id",
    "user_id",
    "symbol",
    "asset_type",
    "direction",
    "entry_price",
    "target_price",
    "stop_loss",
    "timeframe",
    "expiry_date",
    "confidence",
    "prediction_date",
    "option_strategy",
    "option_expiration",
    "tp1",
    "tp2",
    "tp3",
    "status",
    "exit_price",
    "exit_date",
    "pnl_percent",
    "pnl_amount",
    "hit_target",
    "hit_stop",
    "hit_tp1",
    "hit_tp2",
    "hit_tp3",
    "notes",
    "created_at",
    "updated_at",
];

fn date(d: DateTime<Utc>) -> String {
    d.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn opt_date(d: Option<DateTime<Utc>>) -> String {
    d.map(date).unwrap_or_default()
}

fn price(v: Option<f64>) -> String {
    v.map(|p| p.to_string()).unwrap_or_default()
}

fn two_dp(v: Option<f64>) -> String {
    v.map(|p| format!("{:.2}", p)).unwrap_or_default()
}

fn row(p: &Prediction) -> [String; 31] {
    [
        p.id.to_string(),
        p.job_id.clone(),
        p.user_id.clone(),
        p.symbol.clone(),
        p.asset_type.to_string(),
        p.direction.to_string(),
        p.entry_price.to_string(),
        p.target_price.to_string(),
        p.stop_loss.to_string(),
        p.timeframe.clone(),
        date(p.expiry_date),
        format!("{:.2}", p.confidence),
        date(p.prediction_date),
        p.option_strategy.clone().unwrap_or_default(),
        p.option_expiration
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        price(p.tp1),
        price(p.tp2),
        price(p.tp3),
        p.status.to_string(),
        price(p.exit_price),
        opt_date(p.exit_date),
        two_dp(p.pnl_percent),
        price(p.pnl_amount),
        p.hit_target.to_string(),
        p.hit_stop.to_string(),
        p.hit_tp1.to_string(),
        p.hit_tp2.to_string(),
        p.hit_tp3.to_string(),
        p.notes.clone().unwrap_or_default(),
        date(p.created_at),
        date(p.updated_at),
    ]
}

/// Serialize records to CSV in the order given, header first. Fields with
/// commas, quotes or newlines are quoted with inner quotes doubled.
pub fn export_csv(records: &[Prediction]) -> Result<String, ExportError> {
    let mut wtr = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(Vec::new());

    wtr.write_record(CSV_COLUMNS)?;
    for p in records {
        wtr.write_record(row(p))?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| ExportError::Buffer(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ExportError::Buffer(e.to_string()))
}
