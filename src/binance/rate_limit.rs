// =============================================================================
// Rate-Limit Tracker — monitors Binance request weight to avoid 429s
// =============================================================================
//
// Binance allows 6000 request weight per minute per IP; we hard-cap ourselves
// far lower since the board only ever needs one klines call per cycle.
//
// The tracker reads the `X-MBX-USED-WEIGHT-1M` response header after every
// request. The header value is scoped to the UTC minute in which it was seen;
// once that minute has passed the known weight is treated as zero.
// =============================================================================

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use tracing::{debug, warn};

/// Hard ceiling at which we refuse to send additional requests.
const WEIGHT_HARD_LIMIT: u32 = 1000;
/// Soft warning threshold.
const WEIGHT_WARN_THRESHOLD: u32 = 800;

/// Thread-safe rate-limit tracker backed by atomic counters.
pub struct RateLimitTracker {
    used_weight_1m: AtomicU32,
    /// UTC minute (unix seconds / 60) in which `used_weight_1m` was recorded.
    weight_minute: AtomicU64,
}

/// Immutable snapshot of the current rate-limit state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
    pub used_weight_1m: u32,
    pub hard_limit: u32,
}

fn current_minute() -> u64 {
    (chrono::Utc::now().timestamp().max(0) as u64) / 60
}

impl RateLimitTracker {
    /// Create a new tracker with the counter at zero.
    pub fn new() -> Self {
        Self {
            used_weight_1m: AtomicU32::new(0),
            weight_minute: AtomicU64::new(current_minute()),
        }
    }

    // -------------------------------------------------------------------------
    // Header-based updates
    // -------------------------------------------------------------------------

    /// Update the weight counter from the HTTP response headers returned by
    /// Binance.
    pub fn update_from_headers(&self, headers: &reqwest::header::HeaderMap) {
        let Some(weight) = headers
            .get("X-MBX-USED-WEIGHT-1M")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u32>().ok())
        else {
            return;
        };

        let prev = self.current_weight();
        self.record_weight(weight);

        if weight >= WEIGHT_WARN_THRESHOLD && prev < WEIGHT_WARN_THRESHOLD {
            warn!(
                used_weight = weight,
                hard_limit = WEIGHT_HARD_LIMIT,
                "rate-limit weight crossed warning threshold"
            );
        }
        debug!(used_weight_1m = weight, "rate-limit weight updated from header");
    }

    /// Store `weight` as the usage for the current minute.
    pub fn record_weight(&self, weight: u32) {
        self.weight_minute.store(current_minute(), Ordering::Relaxed);
        self.used_weight_1m.store(weight, Ordering::Relaxed);
    }

    /// Known usage for the current minute; zero once the minute rolled over.
    fn current_weight(&self) -> u32 {
        if self.weight_minute.load(Ordering::Relaxed) != current_minute() {
            return 0;
        }
        self.used_weight_1m.load(Ordering::Relaxed)
    }

    // -------------------------------------------------------------------------
    // Pre-flight checks
    // -------------------------------------------------------------------------

    /// Return `true` if we can afford to spend `weight` more request weight
    /// without exceeding the hard limit.
    pub fn can_send_request(&self, weight: u32) -> bool {
        let current = self.current_weight();
        let allowed = current.saturating_add(weight) <= WEIGHT_HARD_LIMIT;
        if !allowed {
            warn!(
                current_weight = current,
                requested_weight = weight,
                hard_limit = WEIGHT_HARD_LIMIT,
                "request blocked — would exceed rate-limit"
            );
        }
        allowed
    }

    // -------------------------------------------------------------------------
    // Snapshot
    // -------------------------------------------------------------------------

    pub fn snapshot(&self) -> RateLimitSnapshot {
        RateLimitSnapshot {
            used_weight_1m: self.current_weight(),
            hard_limit: WEIGHT_HARD_LIMIT,
        }
    }
}

impl Default for RateLimitTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RateLimitTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitTracker")
            .field("used_weight_1m", &self.current_weight())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    #[test]
    fn fresh_tracker_allows_requests() {
        let t = RateLimitTracker::new();
        assert!(t.can_send_request(2));
        assert_eq!(t.snapshot().used_weight_1m, 0);
    }

    #[test]
    fn header_updates_weight() {
        let t = RateLimitTracker::new();
        let mut headers = HeaderMap::new();
        headers.insert("X-MBX-USED-WEIGHT-1M", HeaderValue::from_static("850"));
        t.update_from_headers(&headers);
        assert_eq!(t.snapshot().used_weight_1m, 850);
    }

    #[test]
    fn garbage_header_is_ignored() {
        let t = RateLimitTracker::new();
        t.record_weight(5);
        let mut headers = HeaderMap::new();
        headers.insert("X-MBX-USED-WEIGHT-1M", HeaderValue::from_static("lots"));
        t.update_from_headers(&headers);
        assert_eq!(t.snapshot().used_weight_1m, 5);
    }

    #[test]
    fn blocks_at_hard_limit() {
        let t = RateLimitTracker::new();
        t.record_weight(998);
        assert!(t.can_send_request(2));
        t.record_weight(999);
        assert!(!t.can_send_request(2));
    }

    #[test]
    fn stale_minute_resets_weight() {
        let t = RateLimitTracker::new();
        t.record_weight(999);
        t.weight_minute.store(0, Ordering::Relaxed);
        assert!(t.can_send_request(2));
    }
}
