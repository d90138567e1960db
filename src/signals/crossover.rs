// =============================================================================
// Crossover Signal Deriver
// =============================================================================
//
// Labels each candle from a two-candle window:
//
//   BUY  : close_i > open_i  AND close_{i-1} <= open_{i-1}
//   SELL : close_i < open_i  AND close_{i-1} >= open_{i-1}
//
// The current candle comparison is strict; the prior candle comparison is
// not, so a flat prior candle counts as neither bullish nor bearish. The first
// candle has no predecessor and is always unlabelled.
// =============================================================================

use crate::market_data::{PriceRow, PriceSeries};
use crate::types::Signal;

/// One entry of the ordered rule table: the first matching rule labels the
/// candle.
struct SignalRule {
    label: Signal,
    matches: fn(prev: &PriceRow, cur: &PriceRow) -> bool,
}

fn bullish_edge(prev: &PriceRow, cur: &PriceRow) -> bool {
    cur.close > cur.open && prev.close <= prev.open
}

fn bearish_edge(prev: &PriceRow, cur: &PriceRow) -> bool {
    cur.close < cur.open && prev.close >= prev.open
}

const RULES: &[SignalRule] = &[
    SignalRule {
        label: Signal::Buy,
        matches: bullish_edge,
    },
    SignalRule {
        label: Signal::Sell,
        matches: bearish_edge,
    },
];

/// Classify `cur` given its predecessor `prev`.
pub fn classify(prev: &PriceRow, cur: &PriceRow) -> Signal {
    RULES
        .iter()
        .find(|rule| (rule.matches)(prev, cur))
        .map_or(Signal::None, |rule| rule.label)
}

/// Assign `signal` on every row of `series` in one forward pass.
///
/// Only `open`/`close` are read, so earlier assignments never influence later
/// ones.
pub fn derive_signals(series: &mut PriceSeries) {
    let rows = series.rows_mut();
    if let Some(first) = rows.first_mut() {
        first.signal = Signal::None;
    }
    for i in 1..rows.len() {
        let signal = classify(&rows[i - 1], &rows[i]);
        rows[i].signal = signal;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::Kline;
    use chrono::FixedOffset;

    /// Build a series from `(open, close)` pairs, one candle per 5 minutes.
    fn series_from(pairs: &[(f64, f64)]) -> PriceSeries {
        let klines: Vec<Kline> = pairs
            .iter()
            .enumerate()
            .map(|(i, &(open, close))| Kline {
                open_time: i as i64 * 300_000,
                close_time: i as i64 * 300_000 + 299_999,
                open,
                high: open.max(close),
                low: open.min(close),
                close,
                volume: 1.0,
                quote_volume: 1.0,
                trades_count: 1,
            })
            .collect();
        PriceSeries::from_klines(&klines, &FixedOffset::east_opt(0).unwrap())
    }

    fn signals(pairs: &[(f64, f64)]) -> Vec<Signal> {
        let mut series = series_from(pairs);
        derive_signals(&mut series);
        series.rows().iter().map(|r| r.signal).collect()
    }

    #[test]
    fn empty_and_single_row_series_are_unlabelled() {
        assert!(signals(&[]).is_empty());
        assert_eq!(signals(&[(10.0, 11.0)]), vec![Signal::None]);
    }

    #[test]
    fn bearish_then_bullish_is_buy() {
        assert_eq!(
            signals(&[(10.0, 9.0), (10.0, 11.0)]),
            vec![Signal::None, Signal::Buy]
        );
    }

    #[test]
    fn bullish_then_bearish_is_sell() {
        assert_eq!(
            signals(&[(10.0, 11.0), (10.0, 9.0)]),
            vec![Signal::None, Signal::Sell]
        );
    }

    #[test]
    fn consecutive_bullish_candles_are_not_a_crossover() {
        assert_eq!(
            signals(&[(10.0, 11.0), (10.0, 11.0)]),
            vec![Signal::None, Signal::None]
        );
        assert_eq!(
            signals(&[(10.0, 9.0), (10.0, 9.0)]),
            vec![Signal::None, Signal::None]
        );
    }

    #[test]
    fn flat_prior_candle_allows_both_edges() {
        // prior close == prior open is neither bullish nor bearish.
        assert_eq!(signals(&[(10.0, 10.0), (10.0, 11.0)])[1], Signal::Buy);
        assert_eq!(signals(&[(10.0, 10.0), (10.0, 9.0)])[1], Signal::Sell);
    }

    #[test]
    fn flat_current_candle_is_never_labelled() {
        assert_eq!(signals(&[(10.0, 9.0), (10.0, 10.0)])[1], Signal::None);
        assert_eq!(signals(&[(10.0, 11.0), (10.0, 10.0)])[1], Signal::None);
    }

    #[test]
    fn alternating_candles_alternate_signals() {
        let out = signals(&[(10.0, 9.0), (9.0, 11.0), (11.0, 10.0), (10.0, 12.0), (12.0, 13.0)]);
        assert_eq!(
            out,
            vec![Signal::None, Signal::Buy, Signal::Sell, Signal::Buy, Signal::None]
        );
    }

    #[test]
    fn first_row_is_reset_even_if_preset() {
        let mut series = series_from(&[(10.0, 11.0), (10.0, 9.0)]);
        series.rows_mut()[0].signal = Signal::Buy;
        derive_signals(&mut series);
        assert_eq!(series.rows()[0].signal, Signal::None);
    }

    #[test]
    fn nan_prices_produce_no_signal() {
        assert_eq!(signals(&[(10.0, 9.0), (f64::NAN, 11.0)])[1], Signal::None);
    }
}
