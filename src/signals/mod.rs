// =============================================================================
// Signals Module
// =============================================================================
//
// Derived columns over a price series:
// - Crossover BUY/SELL signal (two-candle window)
// - Take-profit flag following a signal candle

pub mod crossover;
pub mod take_profit;

pub use crossover::derive_signals;
pub use take_profit::{derive_take_profit, DEFAULT_PROFIT_THRESHOLD};
