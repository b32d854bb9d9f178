pub mod historical;
pub mod rest;

pub use historical::HistoricalMarketData;
pub use rest::RestMarketData;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::MarketDataError;
use crate::models::{PriceRange, Quote};

/// Price source consumed by the outcome evaluator. Failures are always
/// reported as errors, never as a zero price.
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn get_quote(&self, symbol: &str) -> Result<Quote, MarketDataError>;

    /// High and low traded between `since` and `until`.
    async fn get_range(
        &self,
        symbol: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<PriceRange, MarketDataError>;
}
