use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::{Signal, TakeProfit};

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single OHLCV kline as returned by `GET /api/v3/klines`, numeric fields
/// already coerced to `f64`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kline {
    pub open_time: i64,
    pub close_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub quote_volume: f64,
    pub trades_count: u64,
}

/// One candle of the working series, with derived columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceRow {
    pub timestamp: DateTime<FixedOffset>,
    pub open_time_ms: i64,
    pub close_time_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub quote_volume: f64,
    pub trades: u64,
    pub signal: Signal,
    pub take_profit: TakeProfit,
}

impl PriceRow {
    /// Convert a raw kline, shifting its UTC open time into `offset`.
    ///
    /// Returns `None` when the open time is outside chrono's representable
    /// range.
    pub fn from_kline(kline: &Kline, offset: &FixedOffset) -> Option<Self> {
        let utc = Utc.timestamp_millis_opt(kline.open_time).single()?;
        Some(Self {
            timestamp: utc.with_timezone(offset),
            open_time_ms: kline.open_time,
            close_time_ms: kline.close_time,
            open: kline.open,
            high: kline.high,
            low: kline.low,
            close: kline.close,
            volume: kline.volume,
            quote_volume: kline.quote_volume,
            trades: kline.trades_count,
            signal: Signal::None,
            take_profit: TakeProfit::None,
        })
    }
}

// ---------------------------------------------------------------------------
// PriceSeries
// ---------------------------------------------------------------------------

/// Candles for one fetch cycle. Built fresh every cycle and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PriceSeries {
    rows: Vec<PriceRow>,
}

impl PriceSeries {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a series from raw klines. Klines with an unrepresentable open
    /// time are dropped with a warning.
    pub fn from_klines(klines: &[Kline], offset: &FixedOffset) -> Self {
        let rows = klines
            .iter()
            .filter_map(|k| {
                let row = PriceRow::from_kline(k, offset);
                if row.is_none() {
                    warn!(open_time = k.open_time, "dropping kline with out-of-range open time");
                }
                row
            })
            .collect();
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[PriceRow] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [PriceRow] {
        &mut self.rows
    }

    /// Stable sort, ascending by timestamp.
    pub fn sort_by_timestamp(&mut self) {
        self.rows.sort_by_key(|r| r.timestamp);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
