pub mod candle;
pub mod direction;
pub mod filters;
pub mod granularity;
pub mod prediction;
pub mod price;

pub use candle::Candle;
pub use direction::*;
pub use filters::{AssetFilter, BacktestFilters, PredictionQuery, StatusFilter};
pub use granularity::Granularity;
pub use prediction::{NewPrediction, Outcome, Prediction};
pub use price::{PriceCheck, PriceRange, Quote};
