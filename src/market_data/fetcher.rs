// =============================================================================
// Price Series Fetcher
// =============================================================================
//
// One klines request per call. Failures never propagate: the caller always
// gets a series (possibly empty) plus the message to show the user.
//
// Exchange-reported errors read "Error fetching data: <msg>"; transport,
// timeout and payload failures read "Exception fetching data: <chain>".
// =============================================================================

use tracing::{error, info};

use crate::binance::{ApiError, BinanceClient};
use crate::market_data::PriceSeries;
use crate::runtime_config::DashboardConfig;

/// Result of a single fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub series: PriceSeries,
    /// User-facing error text when the fetch failed. `series` is empty then.
    pub error: Option<String>,
}

impl FetchOutcome {
    fn failed(message: String) -> Self {
        Self {
            series: PriceSeries::empty(),
            error: Some(message),
        }
    }
}

/// Fetch `config.symbol` klines and convert them into a [`PriceSeries`] in the
/// configured display offset.
pub async fn fetch_price_series(client: &BinanceClient, config: &DashboardConfig) -> FetchOutcome {
    let limit = config.effective_limit();

    match client.get_klines(&config.symbol, &config.interval, limit).await {
        Ok(klines) => {
            let series = PriceSeries::from_klines(&klines, &config.local_offset());
            info!(
                symbol = %config.symbol,
                interval = %config.interval,
                rows = series.len(),
                "price series fetched"
            );
            FetchOutcome {
                series,
                error: None,
            }
        }
        Err(e) => {
            let message = match e.downcast_ref::<ApiError>() {
                Some(api) => format!("Error fetching data: {}", api.msg),
                None => format!("Exception fetching data: {e:#}"),
            };
            error!(symbol = %config.symbol, error = %message, "price series fetch failed");
            FetchOutcome::failed(message)
        }
    }
}
