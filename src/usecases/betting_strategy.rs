//! Betting Strategy - Shared Contract and Rebalancing
//!
//! Every strategy turns a belief and a market into a list of trades.
//! Strategies only decide a *target* position; the helpers here net it
//! against what is already held, cap buys to profitable amounts and make
//! sure no emitted buy is a guaranteed loss.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::SolverConfig;
use crate::domain::bet_utils::BetAmount;
use crate::domain::error::StrategyError;
use crate::domain::trade::{
  CategoricalProbabilisticAnswer, ExistingPosition, OutcomeStr, Position, Trade, TradeType,
};
use crate::domain::value::Usd;
use crate::ports::market::AgentMarket;

use super::kelly::{KellyBettingStrategy, MaxAccuracyWithKellyScaledBetsStrategy};
use super::max_accuracy::{MaxAccuracyBettingStrategy, MaxExpectedValueBettingStrategy};

/// Position differences smaller than this (USD) are not traded.
pub const MIN_TRADE_AMOUNT: f64 = 1e-9;

/// Default grid size of [`cap_to_profitable_bet_amount`].
pub const DEFAULT_PROFITABILITY_STEPS: usize = 100;

/// Strategy contract.
///
/// Implementations are pure: the same inputs always produce the same
/// trades and nothing is mutated.
pub trait BettingStrategy: Send + Sync + fmt::Debug {
  /// Trades that move `existing_position` to this strategy's target.
  ///
  /// # Errors
  /// `StrategyError::GuaranteedLoss` when no profitable trade exists;
  /// callers skip the market.
  fn calculate_trades(
    &self,
    existing_position: Option<&ExistingPosition>,
    answer: &CategoricalProbabilisticAnswer,
    market: &dyn AgentMarket,
  ) -> Result<Vec<Trade>, StrategyError>;

  /// Largest amount a single call may put at risk.
  fn maximum_possible_bet_amount(&self) -> Usd;
}

/// Whether buying `bet_amount` of `outcome` pays back more than it costs
/// when the outcome resolves.
fn is_profitable(market: &dyn AgentMarket, bet_amount: Usd, outcome: &OutcomeStr) -> Result<bool, StrategyError> {
  let tokens = market.get_buy_token_amount(bet_amount, outcome)?;
  Ok(market.get_in_usd(tokens.as_token()) > bet_amount)
}

/// Largest amount not above `bet_amount` whose buy is profitable.
///
/// Steps down from `bet_amount` in `steps` equal decrements and returns
/// the first profitable amount, or zero when none is.
pub fn cap_to_profitable_bet_amount(
  market: &dyn AgentMarket,
  bet_amount: Usd,
  outcome: &OutcomeStr,
  steps: usize,
) -> Result<Usd, StrategyError> {
  if bet_amount <= 0.0 {
    return Ok(Usd::zero());
  }
  let steps = steps.max(1);
  for remaining in (1..=steps).rev() {
    #[allow(clippy::cast_precision_loss)]
    let candidate = bet_amount * (remaining as f64 / steps as f64);
    if is_profitable(market, candidate, outcome)? {
      return Ok(candidate);
    }
  }
  Ok(Usd::zero())
}

/// Reject trade lists containing a buy that cannot pay back its cost.
pub fn check_trades(trades: &[Trade], market: &dyn AgentMarket) -> Result<(), StrategyError> {
  for trade in trades.iter().filter(|t| t.trade_type == TradeType::Buy) {
    if !is_profitable(market, trade.amount, &trade.outcome)? {
      return Err(StrategyError::GuaranteedLoss(format!(
        "buying {} USD of {} in market {} cannot be profitable",
        trade.amount,
        trade.outcome,
        market.id()
      )));
    }
  }
  Ok(())
}

/// Trades moving `existing` to `target`.
///
/// One trade per outcome whose amount differs; buys come before sells.
/// Each buy is capped with [`cap_to_profitable_bet_amount`], and a buy
/// with no profitable amount fails the whole call.
pub fn build_rebalance_trades(
  existing: Option<&ExistingPosition>,
  target: &Position,
  market: &dyn AgentMarket,
  profitability_steps: usize,
) -> Result<Vec<Trade>, StrategyError> {
  let mut outcomes: Vec<OutcomeStr> = market.outcomes();
  let mut seen: HashSet<OutcomeStr> = outcomes.iter().cloned().collect();
  // Outcomes the target names but the market lists under another order.
  for outcome in target.amounts_current.keys() {
    if seen.insert(outcome.clone()) {
      outcomes.push(outcome.clone());
    }
  }

  let mut buys = Vec::new();
  let mut sells = Vec::new();

  for outcome in outcomes {
    let held = existing.map_or_else(Usd::zero, |position| position.amount(&outcome));
    let diff = target.amount(&outcome) - held;
    if diff.abs() < MIN_TRADE_AMOUNT {
      continue;
    }

    if diff > 0.0 {
      let capped = cap_to_profitable_bet_amount(market, diff, &outcome, profitability_steps)?;
      if capped <= 0.0 {
        return Err(StrategyError::GuaranteedLoss(format!(
          "no profitable amount up to {diff} USD of {outcome} in market {}",
          market.id()
        )));
      }
      buys.push(Trade::buy(outcome, capped));
    } else {
      sells.push(Trade::sell(outcome, diff.abs()));
    }
  }

  buys.extend(sells);
  check_trades(&buys, market)?;
  Ok(buys)
}

/// Outcome the answer favors, never the market's invalid outcome.
pub fn most_likely_valid_outcome(
  answer: &CategoricalProbabilisticAnswer,
  market: &dyn AgentMarket,
) -> Result<OutcomeStr, StrategyError> {
  let outcomes = market.outcomes();
  let invalid = market.invalid_outcome_index().and_then(|i| outcomes.get(i));
  let best = outcomes
    .iter()
    .filter(|o| Some(*o) != invalid)
    .filter_map(|o| answer.probability_for(o).map(|p| (o, p)))
    .max_by(|(_, a), (_, b)| a.value().total_cmp(&b.value()));
  best
    .map(|(outcome, _)| outcome.clone())
    .ok_or_else(|| StrategyError::MissingOutcome(format!("answer covers no outcome of market {}", market.id())))
}

// ────────────────────────────────────────────────────────────
// Strategy dispatch
// ────────────────────────────────────────────────────────────

/// Configured strategy, selected by its `kind` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyKind {
  MaxAccuracy {
    bet_amount: BetAmount,
    /// Stretch the bet between this and `bet_amount` by the belief.
    #[serde(default)]
    min_bet_amount: Option<BetAmount>,
  },
  MaxExpectedValue {
    bet_amount: BetAmount,
  },
  Kelly {
    max_bet_amount: BetAmount,
    #[serde(default)]
    max_price_impact: Option<f64>,
    #[serde(default)]
    allow_multiple_bets: bool,
    #[serde(default)]
    allow_shorting: bool,
    #[serde(default)]
    force_simplified_calculation: bool,
  },
  MaxAccuracyWithKellyScaledBets {
    max_bet_amount: BetAmount,
    #[serde(default)]
    max_price_impact: Option<f64>,
  },
}

impl StrategyKind {
  /// Instantiate against a bankroll; proportional amounts resolve here.
  pub fn build(&self, bankroll: Usd, solver: &SolverConfig) -> Box<dyn BettingStrategy> {
    let steps = solver.profitability_steps;
    match self {
      Self::MaxAccuracy {
        bet_amount,
        min_bet_amount,
      } => Box::new(
        MaxAccuracyBettingStrategy::new(bet_amount.resolve(bankroll))
          .with_min_bet_amount(min_bet_amount.map(|min| min.resolve(bankroll)))
          .with_profitability_steps(steps),
      ),
      Self::MaxExpectedValue { bet_amount } => {
        Box::new(MaxExpectedValueBettingStrategy::new(bet_amount.resolve(bankroll)).with_profitability_steps(steps))
      }
      Self::Kelly {
        max_bet_amount,
        max_price_impact,
        allow_multiple_bets,
        allow_shorting,
        force_simplified_calculation,
      } => Box::new(
        KellyBettingStrategy::new(max_bet_amount.resolve(bankroll))
          .with_max_price_impact(*max_price_impact)
          .with_multiple_bets(*allow_multiple_bets)
          .with_shorting(*allow_shorting)
          .with_simplified_calculation(*force_simplified_calculation)
          .with_solver(solver),
      ),
      Self::MaxAccuracyWithKellyScaledBets {
        max_bet_amount,
        max_price_impact,
      } => Box::new(
        MaxAccuracyWithKellyScaledBetsStrategy::new(max_bet_amount.resolve(bankroll))
          .with_max_price_impact(*max_price_impact)
          .with_solver(solver),
      ),
    }
  }

  /// Bet amount setting, for validation.
  pub const fn bet_amount(&self) -> &BetAmount {
    match self {
      Self::MaxAccuracy { bet_amount, .. } | Self::MaxExpectedValue { bet_amount } => bet_amount,
      Self::Kelly { max_bet_amount, .. } | Self::MaxAccuracyWithKellyScaledBets { max_bet_amount, .. } => {
        max_bet_amount
      }
    }
  }

  /// Price-impact cap setting, for validation.
  pub const fn max_price_impact(&self) -> Option<f64> {
    match self {
      Self::Kelly { max_price_impact, .. } | Self::MaxAccuracyWithKellyScaledBets { max_price_impact, .. } => {
        *max_price_impact
      }
      Self::MaxAccuracy { .. } | Self::MaxExpectedValue { .. } => None,
    }
  }

  /// Minimum bet setting, for validation.
  pub const fn min_bet_amount(&self) -> Option<&BetAmount> {
    match self {
      Self::MaxAccuracy { min_bet_amount, .. } => min_bet_amount.as_ref(),
      _ => None,
    }
  }
}

fn fmt_amount(amount: &BetAmount) -> String {
  match amount {
    BetAmount::Static(usd) => format!("{usd}"),
    BetAmount::Proportion(fraction) => format!("{:.1}%", fraction * 100.0),
  }
}

fn fmt_impact(impact: Option<f64>) -> String {
  impact.map_or_else(|| "none".to_string(), |i| format!("{i}"))
}

impl fmt::Display for StrategyKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::MaxAccuracy {
        bet_amount,
        min_bet_amount: None,
      } => write!(f, "MaxAccuracy(bet={})", fmt_amount(bet_amount)),
      Self::MaxAccuracy {
        bet_amount,
        min_bet_amount: Some(min),
      } => write!(f, "MaxAccuracy(bet={}, min_bet={})", fmt_amount(bet_amount), fmt_amount(min)),
      Self::MaxExpectedValue { bet_amount } => write!(f, "MaxExpectedValue(bet={})", fmt_amount(bet_amount)),
      Self::Kelly {
        max_bet_amount,
        max_price_impact,
        allow_multiple_bets,
        allow_shorting,
        force_simplified_calculation,
      } => write!(
        f,
        "Kelly(max_bet={}, max_price_impact={}, multiple={allow_multiple_bets}, shorting={allow_shorting}, simplified={force_simplified_calculation})",
        fmt_amount(max_bet_amount),
        fmt_impact(*max_price_impact),
      ),
      Self::MaxAccuracyWithKellyScaledBets {
        max_bet_amount,
        max_price_impact,
      } => write!(
        f,
        "MaxAccuracyWithKellyScaledBets(max_bet={}, max_price_impact={})",
        fmt_amount(max_bet_amount),
        fmt_impact(*max_price_impact),
      ),
    }
  }
}
