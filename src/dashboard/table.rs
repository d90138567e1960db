// =============================================================================
// Presenter — trailing-rows table view
// =============================================================================
//
// Turns a fully derived price series into the table shown to the user: rows
// sorted ascending by time, only the last `max_rows` kept, and only the
// display columns exposed. The source series is never modified.
// =============================================================================

use std::fmt::Write as _;

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;

use crate::market_data::{PriceRow, PriceSeries};
use crate::types::{Signal, TakeProfit};

/// One displayed row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub timestamp: DateTime<FixedOffset>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub signal: Signal,
    pub take_profit: TakeProfit,
}

impl From<&PriceRow> for TableRow {
    fn from(row: &PriceRow) -> Self {
        Self {
            timestamp: row.timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            signal: row.signal,
            take_profit: row.take_profit,
        }
    }
}

/// The rendered table plus a little context for the dashboard header.
#[derive(Debug, Clone, Serialize)]
pub struct TableView {
    pub title: String,
    pub symbol: String,
    pub interval: String,
    pub generated_at: DateTime<Utc>,
    /// Rows in the source series before slicing.
    pub source_rows: usize,
    pub buy_count: usize,
    pub sell_count: usize,
    pub take_profit_count: usize,
    pub rows: Vec<TableRow>,
}

impl TableView {
    /// Build the view from `series`, keeping the trailing `max_rows` rows.
    pub fn build(series: &PriceSeries, symbol: &str, interval: &str, max_rows: usize) -> Self {
        let mut ordered: Vec<&PriceRow> = series.rows().iter().collect();
        ordered.sort_by_key(|r| r.timestamp);

        let start = ordered.len().saturating_sub(max_rows);
        let rows: Vec<TableRow> = ordered[start..].iter().map(|r| TableRow::from(*r)).collect();

        let buy_count = rows.iter().filter(|r| r.signal == Signal::Buy).count();
        let sell_count = rows.iter().filter(|r| r.signal == Signal::Sell).count();
        let take_profit_count = rows.iter().filter(|r| r.take_profit == TakeProfit::Tp).count();

        Self {
            title: format!("Real-Time {symbol} Data Table with Signals"),
            symbol: symbol.to_string(),
            interval: interval.to_string(),
            generated_at: Utc::now(),
            source_rows: series.len(),
            buy_count,
            sell_count,
            take_profit_count,
            rows,
        }
    }

    pub fn latest(&self) -> Option<&TableRow> {
        self.rows.last()
    }

    /// Fixed-width text rendering for the terminal.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.title);
        let _ = writeln!(
            out,
            "{} {} — last {} of {} candles | BUY {} | SELL {} | TP {}",
            self.symbol,
            self.interval,
            self.rows.len(),
            self.source_rows,
            self.buy_count,
            self.sell_count,
            self.take_profit_count
        );
        let _ = writeln!(
            out,
            "{:<25} {:>14} {:>14} {:>14} {:>14} {:<6} {:<4}",
            "timestamp", "open", "high", "low", "close", "signal", "tp"
        );
        for row in &self.rows {
            let _ = writeln!(
                out,
                "{:<25} {:>14} {:>14} {:>14} {:>14} {:<6} {:<4}",
                row.timestamp.format("%Y-%m-%d %H:%M:%S%:z"),
                fmt_price(row.open),
                fmt_price(row.high),
                fmt_price(row.low),
                fmt_price(row.close),
                row.signal.label(),
                row.take_profit.label()
            );
        }
        out
    }
}

/// Two decimals for ordinary prices, eight for sub-unit ones.
fn fmt_price(v: f64) -> String {
    if v.abs() >= 1.0 {
        format!("{v:.2}")
    } else {
        format!("{v:.8}")
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::Kline;

    fn series_at(open_times: &[i64]) -> PriceSeries {
        let klines: Vec<Kline> = open_times
            .iter()
            .map(|&t| Kline {
                open_time: t,
                close_time: t + 299_999,
                open: t as f64,
                high: t as f64 + 1.0,
                low: t as f64 - 1.0,
                close: t as f64,
                volume: 1.0,
                quote_volume: 1.0,
                trades_count: 1,
            })
            .collect();
        PriceSeries::from_klines(&klines, &FixedOffset::east_opt(7 * 3600).unwrap())
    }

    #[test]
    fn keeps_trailing_rows_in_ascending_order() {
        let times: Vec<i64> = (0..80).rev().map(|i| i * 300_000).collect();
        let series = series_at(&times);

        let view = TableView::build(&series, "PAXGUSDT", "5m", 50);
        assert_eq!(view.rows.len(), 50);
        assert_eq!(view.source_rows, 80);
        assert_eq!(view.rows[0].timestamp.timestamp_millis(), 30 * 300_000);
        assert_eq!(view.latest().unwrap().timestamp.timestamp_millis(), 79 * 300_000);
        assert!(view.rows.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn source_series_is_not_reordered() {
        let series = series_at(&[600_000, 0, 300_000]);
        let before = series.clone();
        let _ = TableView::build(&series, "PAXGUSDT", "5m", 50);
        assert_eq!(series, before);
    }

    #[test]
    fn short_series_is_shown_whole() {
        let series = series_at(&[0, 300_000]);
        let view = TableView::build(&series, "PAXGUSDT", "5m", 50);
        assert_eq!(view.rows.len(), 2);
    }

    #[test]
    fn counts_signals_in_visible_window() {
        let mut series = series_at(&[0, 300_000, 600_000, 900_000]);
        {
            let rows = series.rows_mut();
            rows[0].signal = Signal::Buy; // sliced away below
            rows[1].signal = Signal::Buy;
            rows[2].signal = Signal::Sell;
            rows[2].take_profit = TakeProfit::Tp;
        }
        let view = TableView::build(&series, "PAXGUSDT", "5m", 3);
        assert_eq!(view.buy_count, 1);
        assert_eq!(view.sell_count, 1);
        assert_eq!(view.take_profit_count, 1);
    }

    #[test]
    fn text_render_contains_title_and_labels() {
        let mut series = series_at(&[1_700_000_000_000]);
        series.rows_mut()[0].signal = Signal::Sell;
        let view = TableView::build(&series, "PAXGUSDT", "5m", 50);
        let text = view.render_text();
        assert!(text.starts_with("Real-Time PAXGUSDT Data Table with Signals"));
        assert!(text.contains("2023-11-15 05:13:20+07:00"));
        assert!(text.contains("SELL"));
    }

    #[test]
    fn json_exposes_display_columns_only() {
        let series = series_at(&[0]);
        let view = TableView::build(&series, "PAXGUSDT", "5m", 50);
        let json = serde_json::to_value(&view).unwrap();
        let row = json["rows"][0].as_object().unwrap();
        let mut keys: Vec<&str> = row.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec!["close", "high", "low", "open", "signal", "take_profit", "timestamp"]
        );
        assert_eq!(row["signal"], "");
    }

    #[test]
    fn price_formatting_keeps_small_prices_readable() {
        assert_eq!(fmt_price(2034.5), "2034.50");
        assert_eq!(fmt_price(0.00001234), "0.00001234");
    }
}
