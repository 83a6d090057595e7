//! Configuration Module - TOML-based Engine Configuration
//!
//! Loads and validates configuration from `config.toml`. Solver
//! constants, the backtest dataset and the strategy line-up are
//! externalized here; nothing is hardcoded in the usecases layer.

pub mod loader;

use serde::Deserialize;

use crate::domain::cpmm::SearchParams;
use crate::usecases::betting_strategy::StrategyKind;

/// Top-level engine configuration.
///
/// Loaded from `config.toml` at startup and validated before any
/// strategy runs.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Engine identity and logging.
  pub engine: EngineConfig,
  /// Numeric solver controls.
  #[serde(default)]
  pub solver: SolverConfig,
  /// Backtest inputs and outputs.
  pub backtest: BacktestConfig,
  /// Strategies to evaluate, in report order.
  pub strategies: Vec<StrategyKind>,
}

/// Engine identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
  /// Human-readable engine name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

/// Numeric solver configuration.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SolverConfig {
  /// Iteration cap of the market-moving bet search.
  #[serde(default = "default_max_iters")]
  pub max_iters: usize,
  /// Probability tolerance of the market-moving bet search.
  #[serde(default = "default_tolerance")]
  pub tolerance: f64,
  /// Grid size of the step-down profitability cap.
  #[serde(default = "default_profitability_steps")]
  pub profitability_steps: usize,
  /// Relative tolerance of the price-impact cap.
  #[serde(default = "default_price_impact_tolerance")]
  pub price_impact_tolerance: f64,
}

impl SolverConfig {
  /// Search controls for market-moving bets.
  pub const fn search_params(&self) -> SearchParams {
    SearchParams {
      max_iters: self.max_iters,
      tolerance: self.tolerance,
    }
  }
}

impl Default for SolverConfig {
  fn default() -> Self {
    Self {
      max_iters: default_max_iters(),
      tolerance: default_tolerance(),
      profitability_steps: default_profitability_steps(),
      price_impact_tolerance: default_price_impact_tolerance(),
    }
  }
}

/// Backtest configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BacktestConfig {
  /// JSON file holding the historical bets.
  pub dataset_path: String,
  /// Where to write the markdown report. Printed to stdout when absent.
  #[serde(default)]
  pub report_path: Option<String>,
  /// Bankroll (USD) that proportional bet amounts resolve against.
  #[serde(default = "default_bankroll")]
  pub bankroll: f64,
}

// ── Default value functions ──

fn default_log_level() -> String {
  "info".to_string()
}

const fn default_max_iters() -> usize {
  100
}

const fn default_tolerance() -> f64 {
  1e-6
}

const fn default_profitability_steps() -> usize {
  100
}

const fn default_price_impact_tolerance() -> f64 {
  1e-3
}

const fn default_bankroll() -> f64 {
  100.0
}
