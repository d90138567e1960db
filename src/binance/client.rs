// =============================================================================
// Binance REST API Client — public market data
// =============================================================================
//
// Only unsigned endpoints are used, so no API key is sent. Every request is
// bounded by an explicit timeout and checked against the rate-limit tracker
// before it goes out.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, instrument, warn};

use crate::binance::rate_limit::RateLimitTracker;
use crate::market_data::Kline;

/// Request weight Binance charges for `/api/v3/klines`.
const KLINES_WEIGHT: u32 = 2;

/// Minimum fields needed to build a [`Kline`] (open time .. volume).
const MIN_KLINE_FIELDS: usize = 6;

/// Binance REST API client for public endpoints.
#[derive(Clone)]
pub struct BinanceClient {
    base_url: String,
    client: reqwest::Client,
    rate_limit: Arc<RateLimitTracker>,
}

impl BinanceClient {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Create a client against `base_url` (normally `https://api.binance.com`)
    /// whose requests give up after `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        debug!(base_url = %base_url, timeout_ms = timeout.as_millis() as u64, "BinanceClient initialised");

        Ok(Self {
            base_url,
            client,
            rate_limit: Arc::new(RateLimitTracker::new()),
        })
    }

    pub fn rate_limit(&self) -> &RateLimitTracker {
        &self.rate_limit
    }

    // -------------------------------------------------------------------------
    // Public market data
    // -------------------------------------------------------------------------

    /// GET /api/v3/klines (public — no signature required).
    ///
    /// Array indices of each entry:
    ///   [0] openTime, [1] open, [2] high, [3] low, [4] close, [5] volume,
    ///   [6] closeTime, [7] quoteAssetVolume, [8] numberOfTrades, ...
    ///
    /// An error payload (`{"code": .., "msg": ..}`) or a non-2xx status becomes
    /// an [`ApiError`]; everything else that goes wrong is a plain `anyhow` chain.
    #[instrument(skip(self), name = "binance::get_klines")]
    pub async fn get_klines(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Kline>> {
        if !self.rate_limit.can_send_request(KLINES_WEIGHT) {
            anyhow::bail!("request weight budget exhausted — skipping klines request");
        }

        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url, symbol, interval, limit
        );

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("GET /api/v3/klines request failed")?;

        self.rate_limit.update_from_headers(resp.headers());

        let status = resp.status();
        let text = resp
            .text()
            .await
            .context("failed to read klines response body")?;
        let body = serde_json::from_str::<serde_json::Value>(&text);

        if let Ok(ref value) = body {
            if let Some((code, msg)) = api_error(value) {
                return Err(ApiError { status: Some(status.as_u16()), code, msg }.into());
            }
        }

        if !status.is_success() {
            return Err(ApiError {
                status: Some(status.as_u16()),
                code: 0,
                msg: format!("HTTP {status}: {}", text.trim()),
            }
            .into());
        }

        let body = body.context("failed to parse klines response")?;
        let klines = parse_klines(&body)?;
        debug!(symbol, interval, count = klines.len(), "klines fetched");
        Ok(klines)
    }
}

impl std::fmt::Debug for BinanceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceClient")
            .field("base_url", &self.base_url)
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Exchange-reported errors
// -----------------------------------------------------------------------------

/// An error the exchange reported, either as a `{code, msg}` payload or as a
/// non-2xx status. Callers can tell it apart from transport/parse failures
/// with `anyhow::Error::downcast_ref`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub status: Option<u16>,
    /// Exchange error code; 0 when the status line was all we got.
    pub code: i64,
    pub msg: String,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.code != 0 {
            write!(f, "Binance API error {}: {}", self.code, self.msg)
        } else {
            write!(f, "Binance API error: {}", self.msg)
        }
    }
}

impl std::error::Error for ApiError {}

// -----------------------------------------------------------------------------
// Payload helpers
// -----------------------------------------------------------------------------

/// Extract `(code, msg)` from an error payload. A zero or missing `code` is
/// not an error.
pub fn api_error(body: &serde_json::Value) -> Option<(i64, String)> {
    let obj = body.as_object()?;
    let code = obj.get("code").and_then(serde_json::Value::as_i64)?;
    if code == 0 {
        return None;
    }
    let msg = obj
        .get("msg")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("Unknown error")
        .to_string();
    Some((code, msg))
}

/// Parse Binance's array-of-arrays kline payload.
///
/// Entries shorter than [`MIN_KLINE_FIELDS`] are skipped; any numeric field
/// that is present but does not parse fails the whole payload.
pub fn parse_klines(body: &serde_json::Value) -> Result<Vec<Kline>> {
    let raw = body.as_array().context("klines response is not an array")?;

    let mut klines = Vec::with_capacity(raw.len());

    for (idx, entry) in raw.iter().enumerate() {
        let arr = entry
            .as_array()
            .with_context(|| format!("kline entry {idx} is not an array"))?;

        if arr.len() < MIN_KLINE_FIELDS {
            warn!(index = idx, fields = arr.len(), "skipping malformed kline entry");
            continue;
        }

        let open_time = arr[0]
            .as_i64()
            .with_context(|| format!("kline entry {idx} has no integer open time"))?;
        let open = parse_str_f64(&arr[1], "open")?;
        let high = parse_str_f64(&arr[2], "high")?;
        let low = parse_str_f64(&arr[3], "low")?;
        let close = parse_str_f64(&arr[4], "close")?;
        let volume = parse_str_f64(&arr[5], "volume")?;

        // Optional trailing fields: absent is fine, present-but-invalid is not.
        let close_time = match arr.get(6) {
            Some(v) => v
                .as_i64()
                .with_context(|| format!("kline entry {idx} has non-integer close time: {v}"))?,
            None => 0,
        };
        let quote_volume = match arr.get(7) {
            Some(v) => parse_str_f64(v, "quote_volume")?,
            None => 0.0,
        };
        let trades_count = match arr.get(8) {
            Some(v) => v
                .as_u64()
                .with_context(|| format!("kline entry {idx} has non-integer trade count: {v}"))?,
            None => 0,
        };

        klines.push(Kline {
            open_time,
            close_time,
            open,
            high,
            low,
            close,
            volume,
            quote_volume,
            trades_count,
        });
    }

    Ok(klines)
}

/// Binance sends prices as JSON strings; accept plain numbers too.
fn parse_str_f64(val: &serde_json::Value, name: &str) -> Result<f64> {
    match val {
        serde_json::Value::String(s) => s
            .parse::<f64>()
            .with_context(|| format!("failed to parse {name} as f64: '{s}'")),
        serde_json::Value::Number(n) => n
            .as_f64()
            .with_context(|| format!("field {name} is not a valid f64")),
        _ => anyhow::bail!("field {name} has unexpected JSON type: {val}"),
    }
}

// =============================================================================
// Tests
// =============================================================================
