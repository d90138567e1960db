pub mod fetcher;
pub mod price_series;

// Re-export the series types for convenient access (e.g. `use crate::market_data::PriceSeries`).
pub use fetcher::fetch_price_series;
pub use price_series::{Kline, PriceRow, PriceSeries};
