//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;
use crate::domain::bet_utils::BetAmount;
use crate::domain::value::Usd;

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content)?;

  info!(
    strategies = config.strategies.len(),
    dataset = %config.backtest.dataset_path,
    bankroll = config.backtest.bankroll,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig = toml::from_str(content).with_context(|| "Failed to parse config.toml")?;
  validate_config(&config)?;
  Ok(config)
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Positive solver controls
/// - Bet amounts positive, proportions in (0, 1]
/// - Price-impact caps positive
/// - At least one strategy
fn validate_config(config: &AppConfig) -> Result<()> {
  anyhow::ensure!(!config.engine.name.is_empty(), "engine.name must not be empty");

  // Solver validation
  anyhow::ensure!(config.solver.max_iters > 0, "solver.max_iters must be positive");
  anyhow::ensure!(
    config.solver.tolerance > 0.0 && config.solver.tolerance < 1.0,
    "solver.tolerance must be in (0, 1), got {}",
    config.solver.tolerance
  );
  anyhow::ensure!(
    config.solver.profitability_steps > 0,
    "solver.profitability_steps must be positive"
  );
  anyhow::ensure!(
    config.solver.price_impact_tolerance > 0.0 && config.solver.price_impact_tolerance < 1.0,
    "solver.price_impact_tolerance must be in (0, 1), got {}",
    config.solver.price_impact_tolerance
  );

  // Backtest validation
  anyhow::ensure!(
    !config.backtest.dataset_path.is_empty(),
    "backtest.dataset_path must not be empty"
  );
  anyhow::ensure!(
    config.backtest.bankroll.is_finite() && config.backtest.bankroll > 0.0,
    "backtest.bankroll must be positive, got {}",
    config.backtest.bankroll
  );

  // Strategy validation
  anyhow::ensure!(
    !config.strategies.is_empty(),
    "At least one strategy must be configured"
  );

  let bankroll = Usd::new(config.backtest.bankroll);
  for (i, strategy) in config.strategies.iter().enumerate() {
    match strategy.bet_amount() {
      BetAmount::Static(amount) => anyhow::ensure!(
        amount.is_finite() && *amount > 0.0,
        "Strategy {} ({}) needs a positive bet amount, got {}",
        i,
        strategy,
        amount
      ),
      BetAmount::Proportion(fraction) => anyhow::ensure!(
        *fraction > 0.0 && *fraction <= 1.0,
        "Strategy {} ({}) bet proportion must be in (0, 1], got {}",
        i,
        strategy,
        fraction
      ),
    }
    if let Some(min_bet) = strategy.min_bet_amount() {
      let (min, max) = (min_bet.resolve(bankroll), strategy.bet_amount().resolve(bankroll));
      anyhow::ensure!(
        min.is_finite() && min > 0.0 && min <= max,
        "Strategy {} ({}) min_bet_amount must be positive and at most the bet amount, got {} > {}",
        i,
        strategy,
        min,
        max
      );
    }
    if let Some(max_impact) = strategy.max_price_impact() {
      anyhow::ensure!(
        max_impact.is_finite() && max_impact > 0.0,
        "Strategy {} ({}) max_price_impact must be positive, got {}",
        i,
        strategy,
        max_impact
      );
    }
  }

  Ok(())
}
