// =============================================================================
// Runtime Configuration — Dashboard settings with atomic save
// =============================================================================
//
// Every tunable of the signal board lives here: what to fetch, how to derive
// take-profit flags, how often to refresh, and where the dashboard API binds.
//
// All fields carry `#[serde(default)]` so that a partial (or empty) JSON file
// loads cleanly.  Persistence uses a tmp + rename pattern.
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::signals::DEFAULT_PROFIT_THRESHOLD;

/// Binance caps `/api/v3/klines` at 1000 rows per request.
pub const MAX_KLINE_LIMIT: u32 = 1000;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_symbol() -> String {
    "PAXGUSDT".to_string()
}

fn default_interval() -> String {
    "5m".to_string()
}

fn default_limit() -> u32 {
    200
}

fn default_profit_threshold() -> f64 {
    DEFAULT_PROFIT_THRESHOLD
}

fn default_refresh_interval_ms() -> u64 {
    10_000
}

fn default_refresh_limit() -> u32 {
    100
}

fn default_display_rows() -> usize {
    50
}

fn default_utc_offset_hours() -> i32 {
    // Asia/Bangkok, no DST.
    7
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_base_url() -> String {
    "https://api.binance.com".to_string()
}

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

// =============================================================================
// DashboardConfig
// =============================================================================

/// Top-level configuration for the signal board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    // --- What to fetch --------------------------------------------------------

    /// Trading pair, e.g. "PAXGUSDT".
    #[serde(default = "default_symbol")]
    pub symbol: String,

    /// Kline interval string, e.g. "5m".
    #[serde(default = "default_interval")]
    pub interval: String,

    /// Rows requested per fetch. Clamped to `1..=1000` at request time.
    #[serde(default = "default_limit")]
    pub limit: u32,

    // --- Derivation -----------------------------------------------------------

    /// Fractional move required after a BUY/SELL candle to flag a take-profit
    /// (0.02 means 2 %).
    #[serde(default = "default_profit_threshold")]
    pub profit_threshold: f64,

    // --- Refresh --------------------------------------------------------------

    /// Milliseconds between pipeline runs.
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,

    /// Total pipeline runs before refreshing stops. 0 means no cap.
    #[serde(default = "default_refresh_limit")]
    pub refresh_limit: u32,

    // --- Presentation ---------------------------------------------------------

    /// Trailing rows kept in the table view.
    #[serde(default = "default_display_rows")]
    pub display_rows: usize,

    /// Fixed offset applied to kline open times before display.
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,

    // --- Transport ------------------------------------------------------------

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Address for the read-only dashboard API.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            interval: default_interval(),
            limit: default_limit(),
            profit_threshold: default_profit_threshold(),
            refresh_interval_ms: default_refresh_interval_ms(),
            refresh_limit: default_refresh_limit(),
            display_rows: default_display_rows(),
            utc_offset_hours: default_utc_offset_hours(),
            request_timeout_secs: default_request_timeout_secs(),
            base_url: default_base_url(),
            bind_addr: default_bind_addr(),
        }
    }
}

impl DashboardConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// A missing file is an error so the caller can fall back to defaults
    /// with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read dashboard config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse dashboard config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbol = %config.symbol,
            interval = %config.interval,
            "dashboard config loaded"
        );

        Ok(config)
    }

    /// Persist the configuration to `path` (write `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise dashboard config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "dashboard config saved (atomic)");
        Ok(())
    }

    /// Apply `BOARD_SYMBOL`, `BOARD_INTERVAL` and `BOARD_BIND_ADDR` overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(sym) = std::env::var("BOARD_SYMBOL") {
            let sym = sym.trim().to_uppercase();
            if !sym.is_empty() {
                self.symbol = sym;
            }
        }
        if let Ok(iv) = std::env::var("BOARD_INTERVAL") {
            let iv = iv.trim().to_string();
            if !iv.is_empty() {
                self.interval = iv;
            }
        }
        if let Ok(addr) = std::env::var("BOARD_BIND_ADDR") {
            if !addr.trim().is_empty() {
                self.bind_addr = addr.trim().to_string();
            }
        }
    }

    /// Pull `limit` into 1..=1000, warning when it had to move. Called once
    /// after the config is resolved; returns whether anything changed.
    pub fn clamp_limit(&mut self) -> bool {
        let clamped = self.effective_limit();
        if clamped == self.limit {
            return false;
        }
        warn!(
            requested = self.limit,
            used = clamped,
            "kline limit outside 1..=1000 — clamped"
        );
        self.limit = clamped;
        true
    }

    /// Row limit actually sent to the exchange.
    pub fn effective_limit(&self) -> u32 {
        self.limit.clamp(1, MAX_KLINE_LIMIT)
    }

    /// Display offset for kline timestamps. Falls back to UTC when the
    /// configured hours are out of range.
    pub fn local_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_hours.saturating_mul(3600)).unwrap_or_else(|| {
            warn!(
                utc_offset_hours = self.utc_offset_hours,
                "invalid UTC offset — using UTC"
            );
            Utc.fix()
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn refresh_period(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms.max(1))
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = DashboardConfig::default();
        assert_eq!(cfg.symbol, "PAXGUSDT");
        assert_eq!(cfg.interval, "5m");
        assert_eq!(cfg.limit, 200);
        assert!((cfg.profit_threshold - 0.02).abs() < f64::EPSILON);
        assert_eq!(cfg.refresh_interval_ms, 10_000);
        assert_eq!(cfg.refresh_limit, 100);
        assert_eq!(cfg.display_rows, 50);
        assert_eq!(cfg.utc_offset_hours, 7);
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: DashboardConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.symbol, "PAXGUSDT");
        assert_eq!(cfg.base_url, "https://api.binance.com");
        assert_eq!(cfg.request_timeout_secs, 10);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "symbol": "BTCUSDT", "profit_threshold": 0.05 }"#;
        let cfg: DashboardConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.symbol, "BTCUSDT");
        assert!((cfg.profit_threshold - 0.05).abs() < f64::EPSILON);
        assert_eq!(cfg.interval, "5m");
        assert_eq!(cfg.limit, 200);
    }

    #[test]
    fn limit_is_clamped_to_exchange_range() {
        let mut cfg = DashboardConfig::default();
        cfg.limit = 5000;
        assert_eq!(cfg.effective_limit(), 1000);
        cfg.limit = 0;
        assert_eq!(cfg.effective_limit(), 1);
        cfg.limit = 200;
        assert_eq!(cfg.effective_limit(), 200);
    }

    #[test]
    fn clamp_limit_rewrites_out_of_range_value_once() {
        let mut cfg = DashboardConfig::default();
        cfg.limit = 5000;
        assert!(cfg.clamp_limit());
        assert_eq!(cfg.limit, 1000);
        assert!(!cfg.clamp_limit());
        assert_eq!(cfg.effective_limit(), 1000);
    }

    #[test]
    fn local_offset_defaults_to_bangkok() {
        let cfg = DashboardConfig::default();
        assert_eq!(cfg.local_offset().local_minus_utc(), 7 * 3600);
    }

    #[test]
    fn out_of_range_offset_falls_back_to_utc() {
        let mut cfg = DashboardConfig::default();
        cfg.utc_offset_hours = 48;
        assert_eq!(cfg.local_offset().local_minus_utc(), 0);
    }

    #[test]
    fn save_then_load_preserves_fields() {
        let dir = std::env::temp_dir().join(format!("board-cfg-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("dashboard_config.json");

        let mut cfg = DashboardConfig::default();
        cfg.symbol = "ETHUSDT".into();
        cfg.refresh_limit = 7;
        cfg.save(&path).unwrap();

        let loaded = DashboardConfig::load(&path).unwrap();
        assert_eq!(loaded.symbol, "ETHUSDT");
        assert_eq!(loaded.refresh_limit, 7);
        assert!(!path.with_extension("json.tmp").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_missing_file_is_error() {
        assert!(DashboardConfig::load("/nonexistent/dashboard_config.json").is_err());
    }
}
