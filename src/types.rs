// =============================================================================
// Shared types used across the signal board
// =============================================================================

use serde::{Deserialize, Serialize};

/// Crossover signal attached to a single candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
    #[serde(rename = "")]
    None,
}

impl Default for Signal {
    fn default() -> Self {
        Self::None
    }
}

impl Signal {
    /// Label shown in the table. `None` renders as an empty cell.
    pub fn label(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::None => "",
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Take-profit flag attached to a single candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TakeProfit {
    #[serde(rename = "TP")]
    Tp,
    #[serde(rename = "")]
    None,
}

impl Default for TakeProfit {
    fn default() -> Self {
        Self::None
    }
}

impl TakeProfit {
    pub fn label(self) -> &'static str {
        match self {
            Self::Tp => "TP",
            Self::None => "",
        }
    }
}

impl std::fmt::Display for TakeProfit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
