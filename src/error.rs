use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid prediction: {0}")]
    Validation(String),

    /// The update target does not exist or is no longer pending.
    #[error("prediction {0} not found or already resolved")]
    NotFound(Uuid),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Storage(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("request for {symbol} failed: {message}")]
    Request { symbol: String, message: String },

    #[error("provider returned {status} for {symbol}")]
    Status { symbol: String, status: u16 },

    #[error("could not parse provider response for {symbol}: {message}")]
    Parse { symbol: String, message: String },

    #[error("no price data for {0}")]
    NoData(String),

    #[error("market data for {0} timed out")]
    Timeout(String),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("export buffer error: {0}")]
    Buffer(String),
}
