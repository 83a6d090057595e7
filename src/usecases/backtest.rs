//! Backtest - Replay Historical Bets Through Strategies
//!
//! Each historical bet carries the market snapshot the agent saw, the
//! agent's belief, how the market resolved and what the agent actually
//! did. Every configured strategy is replayed over the same bets on its
//! own blocking worker, and the results are rendered side by side with
//! the actual profit.

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::adapters::market_snapshot::MarketSnapshot;
use crate::config::SolverConfig;
use crate::domain::cpmm::{sell_amount_in_collateral, target_probability_bet_amount};
use crate::domain::error::StrategyError;
use crate::domain::trade::{CategoricalProbabilisticAnswer, ExistingPosition, OutcomeStr, Trade, TradeType};
use crate::domain::value::{OutcomeToken, Usd};
use crate::ports::market::AgentMarket;

use super::betting_strategy::{BettingStrategy, StrategyKind};

/// One resolved bet from the agent's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalBet {
  pub market: MarketSnapshot,
  pub answer: CategoricalProbabilisticAnswer,
  pub resolved_outcome: OutcomeStr,
  #[serde(default)]
  pub existing_position: Option<ExistingPosition>,
  pub actual_amount: Usd,
  pub actual_outcome: OutcomeStr,
  pub actual_profit: Usd,
  pub placed_at: DateTime<Utc>,
}

/// Outcome of replaying one strategy.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StrategyReport {
  pub strategy: String,
  pub bets_total: usize,
  /// Bets that produced at least one trade.
  pub bets_placed: usize,
  /// Bets skipped on a guaranteed loss.
  pub bets_skipped: usize,
  /// Bets the strategy rejected for any other reason.
  pub bets_failed: usize,
  /// Placed bets whose first buy was on the resolved outcome.
  pub bets_won: usize,
  pub invested: Usd,
  pub simulated_profit: Usd,
}

impl StrategyReport {
  /// Profit over invested amount; zero when nothing was invested.
  pub fn roi(&self) -> f64 {
    if self.invested <= 0.0 {
      0.0
    } else {
      self.simulated_profit / self.invested
    }
  }

  /// Share of placed bets that won.
  #[allow(clippy::cast_precision_loss)]
  pub fn accuracy(&self) -> f64 {
    if self.bets_placed == 0 {
      0.0
    } else {
      self.bets_won as f64 / self.bets_placed as f64
    }
  }
}

/// Bet that would move a binary market to the agent's belief.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketMovingRow {
  pub market_id: String,
  pub market_p_yes: f64,
  pub estimated_p_yes: f64,
  pub direction: bool,
  pub size: f64,
}

/// Full backtest output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestReport {
  pub generated_at: DateTime<Utc>,
  pub bets: usize,
  pub actual_invested: Usd,
  pub actual_profit: Usd,
  pub strategies: Vec<StrategyReport>,
  pub market_moving: Vec<MarketMovingRow>,
}

impl BacktestReport {
  /// Strategy with the highest simulated profit.
  pub fn best(&self) -> Option<&StrategyReport> {
    self
      .strategies
      .iter()
      .max_by(|a, b| a.simulated_profit.value().total_cmp(&b.simulated_profit.value()))
  }

  /// Markdown rendering of simulated vs. actual profit.
  pub fn to_markdown(&self) -> String {
    self.to_string()
  }
}

impl fmt::Display for BacktestReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "# Backtest report\n")?;
    writeln!(
      f,
      "Generated at {}. {} bets, actual profit {:.2} USD on {:.2} USD invested.\n",
      self.generated_at.to_rfc3339(),
      self.bets,
      self.actual_profit.value(),
      self.actual_invested.value(),
    )?;

    writeln!(
      f,
      "| Strategy | Placed | Skipped | Failed | Accuracy | Invested (USD) | Profit (USD) | ROI |"
    )?;
    writeln!(f, "|---|---:|---:|---:|---:|---:|---:|---:|")?;
    for report in &self.strategies {
      writeln!(
        f,
        "| {} | {} | {} | {} | {:.1}% | {:.2} | {:.2} | {:.2}% |",
        report.strategy,
        report.bets_placed,
        report.bets_skipped,
        report.bets_failed,
        report.accuracy() * 100.0,
        report.invested.value(),
        report.simulated_profit.value(),
        report.roi() * 100.0,
      )?;
    }

    if !self.market_moving.is_empty() {
      writeln!(f, "\n## Market-moving bets\n")?;
      writeln!(f, "| Market | Market p_yes | Belief p_yes | Direction | Size |")?;
      writeln!(f, "|---|---:|---:|---|---:|")?;
      for row in &self.market_moving {
        writeln!(
          f,
          "| {} | {:.3} | {:.3} | {} | {:.2} |",
          row.market_id,
          row.market_p_yes,
          row.estimated_p_yes,
          if row.direction { "YES" } else { "NO" },
          row.size,
        )?;
      }
    }
    Ok(())
  }
}

/// Reserves of `outcome` and of the other outcome in a binary pool.
fn binary_reserves(market: &dyn AgentMarket, outcome: &OutcomeStr) -> Option<(OutcomeToken, OutcomeToken)> {
  let pool = market.outcome_token_pool()?;
  if pool.len() != 2 {
    return None;
  }
  let index = market.get_outcome_index(outcome).ok()?;
  Some((*pool.get(index)?, *pool.get(1 - index)?))
}

/// Profit of one trade once the market resolves to `resolved`.
fn trade_profit(trade: &Trade, market: &dyn AgentMarket, resolved: &OutcomeStr) -> Result<Usd, StrategyError> {
  let wins = trade.outcome == *resolved;
  match trade.trade_type {
    TradeType::Buy => {
      let tokens = market.get_buy_token_amount(trade.amount, &trade.outcome)?;
      let payout = if wins { market.get_in_usd(tokens.as_token()) } else { Usd::zero() };
      Ok(payout - trade.amount)
    }
    TradeType::Sell => {
      let price = market.probability_of(&trade.outcome)?.value();
      if price <= 0.0 {
        return Ok(trade.amount);
      }
      // Tokens worth `amount` at the current price.
      let shares = OutcomeToken::new(market.get_usd_in_token(trade.amount).value() / price);
      // Proceeds now, minus the payout the sold tokens would have earned.
      let proceeds = match binary_reserves(market, &trade.outcome) {
        Some((held, other)) => market.get_in_usd(sell_amount_in_collateral(shares, held, other, &market.fees())?),
        None => trade.amount,
      };
      let forgone = if wins { market.get_in_usd(shares.as_token()) } else { Usd::zero() };
      Ok(proceeds - forgone)
    }
  }
}

/// Replays strategies over historical bets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backtester {
  bankroll: Usd,
  solver: SolverConfig,
}

impl Backtester {
  pub const fn new(bankroll: Usd, solver: SolverConfig) -> Self {
    Self { bankroll, solver }
  }

  /// Replay one strategy. Guaranteed losses count as skips, never fail.
  pub fn simulate(&self, label: &str, strategy: &dyn BettingStrategy, bets: &[HistoricalBet]) -> StrategyReport {
    let mut report = StrategyReport {
      strategy: label.to_string(),
      bets_total: bets.len(),
      ..StrategyReport::default()
    };

    for bet in bets {
      let trades = match strategy.calculate_trades(bet.existing_position.as_ref(), &bet.answer, &bet.market) {
        Ok(trades) => trades,
        Err(e) if e.is_guaranteed_loss() => {
          warn!(strategy = label, market = %bet.market.id, reason = %e, "Skipping market");
          report.bets_skipped += 1;
          continue;
        }
        Err(e) => {
          warn!(strategy = label, market = %bet.market.id, error = %e, "Strategy rejected market");
          report.bets_failed += 1;
          continue;
        }
      };
      if trades.is_empty() {
        continue;
      }

      let mut profit = Usd::zero();
      let mut invested = Usd::zero();
      let mut priced = true;
      for trade in &trades {
        match trade_profit(trade, &bet.market, &bet.resolved_outcome) {
          Ok(p) => profit += p,
          Err(e) => {
            warn!(strategy = label, market = %bet.market.id, error = %e, "Could not price trade");
            priced = false;
            break;
          }
        }
        if trade.trade_type == TradeType::Buy {
          invested += trade.amount;
        }
      }
      if !priced {
        report.bets_failed += 1;
        continue;
      }

      debug!(strategy = label, market = %bet.market.id, trades = trades.len(), profit = profit.value(), "Bet simulated");
      report.bets_placed += 1;
      report.invested += invested;
      report.simulated_profit += profit;
      let won = trades
        .iter()
        .find(|t| t.trade_type == TradeType::Buy)
        .is_some_and(|t| t.outcome == bet.resolved_outcome);
      if won {
        report.bets_won += 1;
      }
    }
    report
  }

  /// Market-moving bet towards the belief, for every binary pool market.
  pub fn market_moving_rows(&self, bets: &[HistoricalBet]) -> Vec<MarketMovingRow> {
    let params = self.solver.search_params();
    bets
      .iter()
      .filter_map(|bet| {
        let market = &bet.market;
        if !market.is_binary() {
          return None;
        }
        let pool = market.outcome_token_pool()?;
        let yes = market.get_outcome_index(&OutcomeStr::yes()).ok()?;
        let no = market.get_outcome_index(&OutcomeStr::no()).ok()?;
        let estimated = bet.answer.p_yes()?;
        let market_p_yes = market.current_p_yes().ok()?.value();
        let (yes_pool, no_pool) = (*pool.get(yes)?, *pool.get(no)?);
        let moving = target_probability_bet_amount(yes_pool, no_pool, estimated, &market.fees(), &params).ok()?;
        Some(MarketMovingRow {
          market_id: market.id.clone(),
          market_p_yes,
          estimated_p_yes: estimated.value(),
          direction: moving.direction,
          size: moving.size.value(),
        })
      })
      .collect()
  }

  /// Replay every strategy on its own blocking worker. Reports keep the
  /// order of `strategies`.
  #[instrument(skip_all, fields(strategies = strategies.len(), bets = bets.len()))]
  pub async fn run_all(&self, strategies: &[StrategyKind], bets: Arc<Vec<HistoricalBet>>) -> Result<BacktestReport> {
    let handles: Vec<_> = strategies
      .iter()
      .cloned()
      .map(|kind| {
        let backtester = *self;
        let bets = Arc::clone(&bets);
        tokio::task::spawn_blocking(move || {
          let strategy = kind.build(backtester.bankroll, &backtester.solver);
          backtester.simulate(&kind.to_string(), strategy.as_ref(), &bets)
        })
      })
      .collect();

    let mut reports = Vec::with_capacity(handles.len());
    for handle in handles {
      let report = handle.await.context("Backtest worker panicked")?;
      info!(
        strategy = %report.strategy,
        placed = report.bets_placed,
        skipped = report.bets_skipped,
        profit = report.simulated_profit.value(),
        "Strategy evaluated"
      );
      reports.push(report);
    }

    Ok(BacktestReport {
      generated_at: Utc::now(),
      bets: bets.len(),
      actual_invested: bets.iter().map(|b| b.actual_amount).sum(),
      actual_profit: bets.iter().map(|b| b.actual_profit).sum(),
      strategies: reports,
      market_moving: self.market_moving_rows(&bets),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::fees::MarketFees;
  use crate::usecases::max_accuracy::MaxAccuracyBettingStrategy;

  fn bet(p_yes: f64, resolved: OutcomeStr, fee: f64) -> HistoricalBet {
    HistoricalBet {
      market: MarketSnapshot::binary(
        "0xmarket",
        OutcomeToken::new(10.0),
        OutcomeToken::new(10.0),
        MarketFees::new(fee, 0.0).unwrap(),
      ),
      answer: CategoricalProbabilisticAnswer::binary(p_yes, 1.0).unwrap(),
      resolved_outcome: resolved,
      existing_position: None,
      actual_amount: Usd::new(1.0),
      actual_outcome: OutcomeStr::yes(),
      actual_profit: Usd::new(0.5),
      placed_at: Utc::now(),
    }
  }

  #[test]
  fn test_simulate_counts_wins_and_losses() {
    let backtester = Backtester::new(Usd::new(100.0), SolverConfig::default());
    let strategy = MaxAccuracyBettingStrategy::new(Usd::new(10.0));
    let bets = vec![bet(0.8, OutcomeStr::yes(), 0.0), bet(0.8, OutcomeStr::no(), 0.0)];
    let report = backtester.simulate("max_accuracy", &strategy, &bets);

    assert_eq!(report.bets_placed, 2);
    assert_eq!(report.bets_won, 1);
    assert_eq!(report.invested, Usd::new(20.0));
    // The winning bet buys 15 tokens for 10; the losing one forfeits 10.
    assert!((report.simulated_profit.value() - (5.0 - 10.0)).abs() < 1e-9);
    assert!((report.accuracy() - 0.5).abs() < 1e-12);
  }

  #[test]
  fn test_simulate_skips_guaranteed_loss() {
    let backtester = Backtester::new(Usd::new(100.0), SolverConfig::default());
    let strategy = MaxAccuracyBettingStrategy::new(Usd::new(1.0));
    let report = backtester.simulate("max_accuracy", &strategy, &[bet(0.8, OutcomeStr::yes(), 0.99)]);
    assert_eq!(report.bets_skipped, 1);
    assert_eq!(report.bets_placed, 0);
    assert_eq!(report.roi(), 0.0);
  }

  #[test]
  fn test_sell_pays_pool_price_with_slippage() {
    let sell = Trade::sell(OutcomeStr::yes(), Usd::new(1.0));
    let market = bet(0.5, OutcomeStr::no(), 0.0).market;

    // Two YES tokens sold into a 10/10 pool.
    let kept = trade_profit(&sell, &market, &OutcomeStr::no()).unwrap();
    let expected = 40.0 / (22.0 + 404.0_f64.sqrt()) * 0.999_999;
    assert!((kept.value() - expected).abs() < 1e-12, "{kept:?}");
    assert!(kept < 1.0);

    let forgone = trade_profit(&sell, &market, &OutcomeStr::yes()).unwrap();
    assert!((forgone.value() - (expected - 2.0)).abs() < 1e-12);
  }

  #[test]
  fn test_sell_without_pool_uses_quoted_price() {
    let market = MarketSnapshot::quoted(
      "0xquoted",
      vec![OutcomeStr::yes(), OutcomeStr::no()],
      vec![
        crate::domain::probability::Probability::new(0.25).unwrap(),
        crate::domain::probability::Probability::new(0.75).unwrap(),
      ],
      MarketFees::zero(),
    );
    let sell = Trade::sell(OutcomeStr::yes(), Usd::new(1.0));
    assert_eq!(trade_profit(&sell, &market, &OutcomeStr::no()).unwrap(), Usd::new(1.0));
    assert_eq!(trade_profit(&sell, &market, &OutcomeStr::yes()).unwrap(), Usd::new(-3.0));
  }

  #[test]
  fn test_market_moving_rows() {
    let backtester = Backtester::new(Usd::new(100.0), SolverConfig::default());
    let rows = backtester.market_moving_rows(&[bet(0.7, OutcomeStr::yes(), 0.0)]);
    assert_eq!(rows.len(), 1);
    assert!(rows[0].direction);
    assert!(rows[0].size > 0.0);
  }

  #[test]
  fn test_markdown_lists_strategies() {
    let report = BacktestReport {
      generated_at: Utc::now(),
      bets: 1,
      actual_invested: Usd::new(1.0),
      actual_profit: Usd::new(0.5),
      strategies: vec![StrategyReport {
        strategy: "Kelly(max_bet=5)".into(),
        bets_total: 1,
        bets_placed: 1,
        invested: Usd::new(2.0),
        simulated_profit: Usd::new(1.0),
        ..StrategyReport::default()
      }],
      market_moving: Vec::new(),
    };
    let md = report.to_markdown();
    assert!(md.contains("| Kelly(max_bet=5) | 1 | 0 | 0 |"));
    assert!(md.contains("50.00%"));
    assert_eq!(report.best().map(|r| r.strategy.as_str()), Some("Kelly(max_bet=5)"));
  }
}
