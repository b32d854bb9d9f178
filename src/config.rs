use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Notional position size used to turn pnl_percent into pnl_amount.
pub const DEFAULT_NOTIONAL_UNIT: f64 = 1.0;

/// Stop is charged first when target and stop are both crossed in one pass.
pub const DEFAULT_TIE_BREAK: TieBreak = TieBreak::StopFirst;

/// Minimum decisive trades a symbol needs to be ranked best/worst.
pub const DEFAULT_MIN_SYMBOL_TRADES: usize = 3;

/// Resolution order when both the target side and the stop were crossed
/// inside the same high/low window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    StopFirst,
    TargetFirst,
}

impl fmt::Display for TieBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TieBreak::StopFirst => write!(f, "stop_first"),
            TieBreak::TargetFirst => write!(f, "target_first"),
        }
    }
}

impl FromStr for TieBreak {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stop_first" | "stop" => Ok(TieBreak::StopFirst),
            "target_first" | "target" => Ok(TieBreak::TargetFirst),
            other => Err(format!("unknown tie-break policy: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // HTTP
    pub bind_addr: String,

    // Storage
    pub ledger_file: String,

    // Market data
    pub market_data_url: String,
    pub max_concurrent_fetches: usize,
    pub fetch_timeout_secs: u64,

    // Outcome rules
    pub notional_unit: f64,
    pub tie_break: TieBreak,

    // Statistics
    pub min_symbol_trades: usize,
    pub recent_trades_limit: usize,

    // Scheduling
    pub check_interval_secs: u64,

    /// Shared secret the analysis pipeline and scheduler present on the
    /// write routes. Unset means those routes refuse every caller.
    pub ingest_token: Option<String>,

    // Logging
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let env = |key: &str, default: &str| -> String {
            std::env::var(key).unwrap_or_else(|_| default.to_string())
        };

        Config {
            bind_addr: env("BIND_ADDR", "0.0.0.0:8080"),
            ledger_file: env("LEDGER_FILE", "data/predictions.json"),
            market_data_url: env("MARKET_DATA_URL", "https://api.coinbase.com"),
            max_concurrent_fetches: env("MAX_CONCURRENT_FETCHES", "4")
                .parse()
                .unwrap_or(4)
                .max(1),
            fetch_timeout_secs: env("FETCH_TIMEOUT_SECS", "10").parse().unwrap_or(10),
            notional_unit: env("NOTIONAL_UNIT", "1.0")
                .parse()
                .unwrap_or(DEFAULT_NOTIONAL_UNIT),
            tie_break: env("TIE_BREAK", "stop_first")
                .parse()
                .unwrap_or(DEFAULT_TIE_BREAK),
            min_symbol_trades: env("MIN_SYMBOL_TRADES", "3")
                .parse()
                .unwrap_or(DEFAULT_MIN_SYMBOL_TRADES),
            recent_trades_limit: env("RECENT_TRADES_LIMIT", "10").parse().unwrap_or(10),
            check_interval_secs: env("CHECK_INTERVAL_SECS", "900").parse().unwrap_or(900),
            ingest_token: std::env::var("INGEST_TOKEN")
                .ok()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            log_level: env("LOG_LEVEL", "info"),
        }
    }
}
