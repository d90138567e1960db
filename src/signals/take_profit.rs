// =============================================================================
// Take-Profit Deriver
// =============================================================================
//
// A candle is flagged TP when the candle before it carried a signal and price
// has since moved at least `profit_threshold` in the signal's direction:
//
//   prev BUY  : close_i >= close_{i-1} * (1 + threshold)
//   prev SELL : close_i <= close_{i-1} * (1 - threshold)
//
// Both comparisons are inclusive. Must run after `derive_signals`.
// =============================================================================

use crate::market_data::{PriceRow, PriceSeries};
use crate::types::{Signal, TakeProfit};

/// Default move required to flag a take-profit (2 %).
pub const DEFAULT_PROFIT_THRESHOLD: f64 = 0.02;

/// Decide the take-profit flag for `cur` from its predecessor `prev`.
pub fn evaluate(prev: &PriceRow, cur: &PriceRow, profit_threshold: f64) -> TakeProfit {
    let hit = match prev.signal {
        Signal::Buy => cur.close >= prev.close * (1.0 + profit_threshold),
        Signal::Sell => cur.close <= prev.close * (1.0 - profit_threshold),
        Signal::None => false,
    };
    if hit {
        TakeProfit::Tp
    } else {
        TakeProfit::None
    }
}

/// Assign `take_profit` on every row of `series`. Row 0 is always unflagged.
pub fn derive_take_profit(series: &mut PriceSeries, profit_threshold: f64) {
    let rows = series.rows_mut();
    if let Some(first) = rows.first_mut() {
        first.take_profit = TakeProfit::None;
    }
    for i in 1..rows.len() {
        let flag = evaluate(&rows[i - 1], &rows[i], profit_threshold);
        rows[i].take_profit = flag;
    }
}
