pub mod client;
pub mod rate_limit;

pub use client::{ApiError, BinanceClient};
