// =============================================================================
// Pipeline — one stateless refresh cycle
// =============================================================================
//
//   fetch -> sort -> crossover signals -> take-profit flags -> table view
//
// Nothing is carried between calls; the refresh host simply calls
// `run_cycle` again on its next tick.
// =============================================================================

use serde::Serialize;
use tracing::{debug, warn};

use crate::binance::BinanceClient;
use crate::dashboard::TableView;
use crate::market_data::{fetch_price_series, PriceSeries};
use crate::runtime_config::DashboardConfig;
use crate::signals::{derive_signals, derive_take_profit};

/// Message shown when the exchange returned zero candles.
pub const NO_DATA_MESSAGE: &str = "No data returned from the API";

/// What one cycle produced.
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    Table(TableView),
    /// The fetch succeeded but had no rows; derivation was skipped.
    NoData(String),
    /// The fetch failed; the message is user-facing.
    FetchFailed(String),
}

/// Serialisable status tag for the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Ok,
    NoData,
    FetchFailed,
}

impl CycleOutcome {
    pub fn status(&self) -> CycleStatus {
        match self {
            Self::Table(_) => CycleStatus::Ok,
            Self::NoData(_) => CycleStatus::NoData,
            Self::FetchFailed(_) => CycleStatus::FetchFailed,
        }
    }

    /// The user-facing error text, if the cycle did not produce a table.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Table(_) => None,
            Self::NoData(msg) | Self::FetchFailed(msg) => Some(msg),
        }
    }
}

/// Run derivation and presentation over an already fetched series.
pub fn derive_and_present(mut series: PriceSeries, config: &DashboardConfig) -> CycleOutcome {
    if series.is_empty() {
        warn!(symbol = %config.symbol, "no candles to process");
        return CycleOutcome::NoData(NO_DATA_MESSAGE.to_string());
    }

    series.sort_by_timestamp();
    derive_signals(&mut series);
    derive_take_profit(&mut series, config.profit_threshold);

    let view = TableView::build(&series, &config.symbol, &config.interval, config.display_rows);
    debug!(
        rows = view.rows.len(),
        buys = view.buy_count,
        sells = view.sell_count,
        take_profits = view.take_profit_count,
        "table view built"
    );
    CycleOutcome::Table(view)
}

/// Fetch, derive and present once.
pub async fn run_cycle(client: &BinanceClient, config: &DashboardConfig) -> CycleOutcome {
    let fetched = fetch_price_series(client, config).await;
    if let Some(message) = fetched.error {
        return CycleOutcome::FetchFailed(message);
    }
    derive_and_present(fetched.series, config)
}
