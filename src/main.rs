// =============================================================================
// Kline Signal Board — Main Entry Point
// =============================================================================
//
// Polls Binance klines on a fixed timer, derives crossover signals and
// take-profit flags, prints the latest rows, and serves them read-only over
// HTTP/WebSocket. Each refresh cycle is independent; a failed cycle never
// stops the next one.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod binance;
mod dashboard;
mod market_data;
mod pipeline;
mod runtime_config;
mod signals;
mod types;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::binance::BinanceClient;
use crate::pipeline::CycleOutcome;
use crate::runtime_config::DashboardConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Kline Signal Board — starting up");

    let config_path = std::env::var("BOARD_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("dashboard_config.json"));

    let mut config = if config_path.exists() {
        DashboardConfig::load(&config_path).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load config, using defaults");
            DashboardConfig::default()
        })
    } else {
        let defaults = DashboardConfig::default();
        if let Err(e) = defaults.save(&config_path) {
            warn!(error = %e, "Failed to write default config");
        }
        defaults
    };
    config.apply_env_overrides();
    config.clamp_limit();

    info!(
        symbol = %config.symbol,
        interval = %config.interval,
        limit = config.limit,
        profit_threshold = config.profit_threshold,
        refresh_interval_ms = config.refresh_interval_ms,
        refresh_limit = config.refresh_limit,
        "Configuration resolved"
    );

    // ── 2. Shared state & client ─────────────────────────────────────────
    let state = Arc::new(AppState::new(config.clone()));
    let client = BinanceClient::new(&config.base_url, config.request_timeout())?;

    // ── 3. Dashboard API ─────────────────────────────────────────────────
    let api_state = state.clone();
    let bind_addr = config.bind_addr.clone();
    tokio::spawn(async move {
        let app = api::rest::router(api_state);
        let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
            Ok(l) => l,
            Err(e) => {
                error!(addr = %bind_addr, error = %e, "Failed to bind dashboard API — continuing without it");
                return;
            }
        };
        info!(addr = %bind_addr, "Dashboard API listening");
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Dashboard API server failed");
        }
    });

    // ── 4. Refresh loop ──────────────────────────────────────────────────
    let refresh = tokio::spawn(run_refresh_loop(state.clone(), client, config));

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 5. Shutdown ──────────────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received — stopping");
    refresh.abort();

    info!(
        refresh_count = state.refresh_count(),
        "Kline Signal Board shut down complete."
    );
    Ok(())
}

/// Re-run the pipeline every `refresh_interval_ms` until `refresh_limit`
/// cycles have run (0 = forever). Each cycle is awaited before the next tick,
/// so a slow fetch delays rather than overlaps the following cycle.
async fn run_refresh_loop(state: Arc<AppState>, client: BinanceClient, config: DashboardConfig) {
    let mut ticker = tokio::time::interval(config.refresh_period());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut cycle: u32 = 0;
    loop {
        if config.refresh_limit != 0 && cycle >= config.refresh_limit {
            info!(cycles = cycle, "Refresh limit reached — table frozen");
            break;
        }
        ticker.tick().await;
        cycle += 1;

        let outcome = pipeline::run_cycle(&client, &config).await;
        if let CycleOutcome::Table(view) = &outcome {
            println!("{}", view.render_text());
            info!(
                cycle,
                rows = view.rows.len(),
                last_close = ?view.latest().map(|r| r.close),
                used_weight_1m = client.rate_limit().snapshot().used_weight_1m,
                "Table refreshed"
            );
        } else if let Some(msg) = outcome.error_message() {
            println!("{msg}");
            error!(cycle, message = %msg, "Cycle produced no table");
        }
        state.record_outcome(outcome);
    }
}
