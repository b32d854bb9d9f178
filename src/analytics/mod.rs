pub mod export;
pub mod stats;
pub mod summary;

pub use export::{export_csv, CSV_COLUMNS};
pub use stats::{compute, BacktestStats, BreakdownStats, StatsOptions};
pub use summary::{summarize, BacktestSummary, GroupStats, MonthlyStats};
