// =============================================================================
// Central Application State — Signal Board
// =============================================================================
//
// Written only by the refresh task (one cycle outcome at a time) and read by
// the dashboard API. The pipeline itself never touches this; it is the host's
// record of what was last shown.
//
// Thread safety:
//   - Atomic counters for lock-free version / refresh tracking.
//   - parking_lot::RwLock for the published cycle result and the error log.
//     Table, status and message share one lock so readers never see a
//     status from one cycle paired with a table from another.
// =============================================================================

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;

use crate::dashboard::TableView;
use crate::pipeline::{CycleOutcome, CycleStatus};
use crate::runtime_config::DashboardConfig;

// =============================================================================
// Error Record
// =============================================================================

/// A recorded error event for the dashboard error log.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    /// Human-readable error message.
    pub message: String,
    /// Refresh cycle (1-based) that produced it.
    pub cycle: u32,
    /// ISO 8601 timestamp.
    pub at: String,
}

// =============================================================================
// Published cycle result
// =============================================================================

/// What the last refresh cycle left on screen.
#[derive(Debug, Clone, Default)]
pub struct Published {
    pub table: Option<TableView>,
    pub status: Option<CycleStatus>,
    pub message: Option<String>,
}

// =============================================================================
// AppState
// =============================================================================

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

pub struct AppState {
    // ── Version tracking ────────────────────────────────────────────────
    /// Incremented on every published change; the WebSocket feed pushes
    /// when it moves.
    pub state_version: AtomicU64,

    /// WebSocket message sequence number (incremented per message sent).
    pub ws_sequence_number: AtomicU64,

    /// Currently connected WebSocket clients.
    pub ws_clients: AtomicU64,

    // ── Configuration ───────────────────────────────────────────────────
    pub config: DashboardConfig,

    // ── Refresh results ─────────────────────────────────────────────────
    pub refresh_count: AtomicU32,
    pub published: RwLock<Published>,

    // ── Error Log ───────────────────────────────────────────────────────
    pub recent_errors: RwLock<Vec<ErrorRecord>>,

    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(config: DashboardConfig) -> Self {
        Self {
            state_version: AtomicU64::new(1),
            ws_sequence_number: AtomicU64::new(0),
            ws_clients: AtomicU64::new(0),
            config,
            refresh_count: AtomicU32::new(0),
            published: RwLock::new(Published::default()),
            recent_errors: RwLock::new(Vec::new()),
            start_time: std::time::Instant::now(),
        }
    }

    // ── Version Management ──────────────────────────────────────────────

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    pub fn refresh_count(&self) -> u32 {
        self.refresh_count.load(Ordering::SeqCst)
    }

    // ── Error Logging ───────────────────────────────────────────────────

    /// Record an error message. Oldest entries are evicted past
    /// [`MAX_RECENT_ERRORS`].
    pub fn push_error(&self, msg: String) {
        let record = ErrorRecord {
            message: msg,
            cycle: self.refresh_count(),
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        errors.push(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }
        drop(errors);

        self.increment_version();
    }

    // ── Cycle publication ───────────────────────────────────────────────

    /// Publish the outcome of one refresh cycle.
    ///
    /// A failed cycle clears the table: the dashboard shows the error
    /// instead of stale rows.
    pub fn record_outcome(&self, outcome: CycleOutcome) {
        self.refresh_count.fetch_add(1, Ordering::SeqCst);
        let status = Some(outcome.status());

        match outcome {
            CycleOutcome::Table(view) => {
                *self.published.write() = Published {
                    table: Some(view),
                    status,
                    message: None,
                };
                self.increment_version();
            }
            CycleOutcome::NoData(msg) | CycleOutcome::FetchFailed(msg) => {
                *self.published.write() = Published {
                    table: None,
                    status,
                    message: Some(msg.clone()),
                };
                self.push_error(msg);
            }
        }
    }

    // ── Snapshot Builder ────────────────────────────────────────────────

    /// Serialisable snapshot served by `GET /api/v1/state` and the
    /// WebSocket feed.
    pub fn build_snapshot(&self) -> DashboardSnapshot {
        let published = self.published.read().clone();
        DashboardSnapshot {
            state_version: self.current_state_version(),
            server_time: Utc::now().timestamp_millis(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            symbol: self.config.symbol.clone(),
            interval: self.config.interval.clone(),
            profit_threshold: self.config.profit_threshold,
            refresh_interval_ms: self.config.refresh_interval_ms,
            refresh_limit: self.config.refresh_limit,
            refresh_count: self.refresh_count(),
            last_status: published.status,
            last_message: published.message,
            table: published.table,
            recent_errors: self.recent_errors.read().clone(),
            ws_clients: self.ws_clients.load(Ordering::Relaxed),
        }
    }
}

// =============================================================================
// Snapshot
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub state_version: u64,
    pub server_time: i64,
    pub uptime_secs: u64,
    pub symbol: String,
    pub interval: String,
    pub profit_threshold: f64,
    pub refresh_interval_ms: u64,
    pub refresh_limit: u32,
    pub refresh_count: u32,
    pub last_status: Option<CycleStatus>,
    pub last_message: Option<String>,
    pub table: Option<TableView>,
    pub recent_errors: Vec<ErrorRecord>,
    pub ws_clients: u64,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::PriceSeries;

    fn some_table() -> TableView {
        TableView::build(&PriceSeries::empty(), "PAXGUSDT", "5m", 50)
    }

    #[test]
    fn table_outcome_is_published() {
        let state = AppState::new(DashboardConfig::default());
        let v0 = state.current_state_version();

        state.record_outcome(CycleOutcome::Table(some_table()));

        assert_eq!(state.refresh_count(), 1);
        let published = state.published.read();
        assert!(published.table.is_some());
        assert_eq!(published.status, Some(CycleStatus::Ok));
        drop(published);
        assert!(state.current_state_version() > v0);
        assert!(state.recent_errors.read().is_empty());
    }

    #[test]
    fn failure_clears_table_and_logs_error() {
        let state = AppState::new(DashboardConfig::default());
        state.record_outcome(CycleOutcome::Table(some_table()));
        state.record_outcome(CycleOutcome::FetchFailed("Error fetching data: bad symbol".into()));

        assert_eq!(state.refresh_count(), 2);
        assert!(state.published.read().table.is_none());
        let errors = state.recent_errors.read();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].cycle, 2);
        assert!(errors[0].message.contains("bad symbol"));
    }

    #[test]
    fn concurrent_snapshots_never_mix_cycles() {
        use std::sync::Arc;

        let state = Arc::new(AppState::new(DashboardConfig::default()));
        let writer = {
            let state = state.clone();
            std::thread::spawn(move || {
                for i in 0..500 {
                    if i % 2 == 0 {
                        state.record_outcome(CycleOutcome::Table(some_table()));
                    } else {
                        state.record_outcome(CycleOutcome::FetchFailed(format!("err {i}")));
                    }
                }
            })
        };

        while !writer.is_finished() {
            let snap = state.build_snapshot();
            match snap.last_status {
                Some(CycleStatus::Ok) => {
                    assert!(snap.table.is_some());
                    assert!(snap.last_message.is_none());
                }
                Some(_) => {
                    assert!(snap.table.is_none());
                    assert!(snap.last_message.is_some());
                }
                None => assert!(snap.table.is_none()),
            }
        }
        writer.join().unwrap();
    }

    #[test]
    fn error_log_is_capped() {
        let state = AppState::new(DashboardConfig::default());
        for i in 0..(MAX_RECENT_ERRORS + 10) {
            state.push_error(format!("err {i}"));
        }
        let errors = state.recent_errors.read();
        assert_eq!(errors.len(), MAX_RECENT_ERRORS);
        assert_eq!(errors[0].message, "err 10");
    }

    #[test]
    fn snapshot_reflects_config_and_outcome() {
        let state = AppState::new(DashboardConfig::default());
        state.record_outcome(CycleOutcome::NoData("No data returned from the API".into()));

        let snap = state.build_snapshot();
        assert_eq!(snap.symbol, "PAXGUSDT");
        assert_eq!(snap.refresh_limit, 100);
        assert_eq!(snap.refresh_count, 1);
        assert_eq!(snap.last_status, Some(CycleStatus::NoData));
        assert!(snap.table.is_none());
        assert_eq!(snap.recent_errors.len(), 1);
    }
}
