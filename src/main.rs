//! CPMM Kelly Engine - Backtest Entry Point
//!
//! Replays historical bets through every configured strategy and
//! prints (or writes) a markdown report comparing simulated and actual
//! profit.
//!
//! Wiring sequence:
//! 1. Load config.toml + validate (path from the first CLI argument)
//! 2. Init tracing (JSON structured logging)
//! 3. Load the JSON dataset of historical bets
//! 4. Run every strategy on a blocking worker
//! 5. Render the report to stdout or `backtest.report_path`

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use cpmm_kelly_engine::adapters::dataset::{load_dataset, write_report};
use cpmm_kelly_engine::config;
use cpmm_kelly_engine::domain::value::Usd;
use cpmm_kelly_engine::usecases::backtest::Backtester;

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = config::loader::load_config(&config_path).context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.engine.log_level)),
        )
        .json()
        .init();

    info!(
        name = %config.engine.name,
        version = env!("CARGO_PKG_VERSION"),
        strategies = config.strategies.len(),
        "Starting CPMM Kelly engine"
    );

    // ── 3. Load historical bets ─────────────────────────────
    let bets = Arc::new(load_dataset(&config.backtest.dataset_path).await?);

    // ── 4. Replay strategies ────────────────────────────────
    let backtester = Backtester::new(Usd::new(config.backtest.bankroll), config.solver);
    let report = backtester.run_all(&config.strategies, bets).await?;

    if let Some(best) = report.best() {
        info!(
            strategy = %best.strategy,
            profit = best.simulated_profit.value(),
            actual = report.actual_profit.value(),
            "Best strategy"
        );
    }

    // ── 5. Render report ────────────────────────────────────
    let markdown = report.to_markdown();
    match &config.backtest.report_path {
        Some(path) => write_report(path, &markdown).await?,
        None => println!("{markdown}"),
    }

    info!("Backtest complete");
    Ok(())
}
