//! Kelly Strategies - Kelly-Sized Bets with a Price-Impact Cap
//!
//! `KellyBettingStrategy` sizes every outcome with the Kelly solver
//! (full CPMM-aware solver when the market has a pool, simplified
//! otherwise) and then optionally shrinks each bet until its price
//! impact is at most `max_price_impact`.
//!
//! `MaxAccuracyWithKellyScaledBetsStrategy` picks the outcome the belief
//! favors and lets Kelly, run as if that outcome were certain, decide
//! how much of the bankroll the pool can absorb.

use crate::config::SolverConfig;
use crate::domain::cpmm::price_impact;
use crate::domain::error::StrategyError;
use crate::domain::fees::MarketFees;
use crate::domain::kelly::{
  CategoricalKellyBet, CategoricalPolicy, kelly_bet_full, kelly_bet_simplified, kelly_bets_categorical_full,
  kelly_bets_categorical_simplified,
};
use crate::domain::probability::Probability;
use crate::domain::trade::{CategoricalProbabilisticAnswer, ExistingPosition, OutcomeStr, Position, Trade};
use crate::domain::value::{CollateralToken, OutcomeToken, Usd};
use crate::ports::market::AgentMarket;

use super::betting_strategy::{
  BettingStrategy, DEFAULT_PROFITABILITY_STEPS, build_rebalance_trades, most_likely_valid_outcome,
};

const DEFAULT_PRICE_IMPACT_TOLERANCE: f64 = 1e-3;
const DEFAULT_PRICE_IMPACT_MAX_ITERS: usize = 100;

/// Largest bet not above `bet_amount` whose price impact on outcome
/// `index` is at most `max_price_impact`.
///
/// Bisects `price_impact(bet) - max_price_impact` on `[0, bet_amount]`
/// until the relative error is below `tolerance`. Never grows the bet.
pub fn calculate_price_impact_for_max_bet(
  pool: &[OutcomeToken],
  bet_amount: CollateralToken,
  index: usize,
  fees: &MarketFees,
  max_price_impact: f64,
  tolerance: f64,
  max_iters: usize,
) -> Result<CollateralToken, StrategyError> {
  if bet_amount <= 0.0 || price_impact(pool, bet_amount, index, fees)? <= max_price_impact {
    return Ok(bet_amount.max(CollateralToken::zero()));
  }

  let scale = max_price_impact.abs().max(f64::EPSILON);
  let mut lo = CollateralToken::zero();
  let mut hi = bet_amount;
  for _ in 0..max_iters {
    let mid = (lo + hi) / 2.0;
    let impact = price_impact(pool, mid, index, fees)?;
    if ((impact - max_price_impact) / scale).abs() < tolerance {
      return Ok(mid);
    }
    if impact > max_price_impact {
      hi = mid;
    } else {
      lo = mid;
    }
  }
  Ok(lo)
}

/// Belief per market outcome, aligned with `market.outcomes()`.
///
/// The invalid outcome, when the answer leaves it out, is priced at the
/// market so it never carries an edge.
fn estimated_probabilities(
  answer: &CategoricalProbabilisticAnswer,
  market: &dyn AgentMarket,
) -> Result<Vec<Probability>, StrategyError> {
  let market_ps = market.probabilities();
  let invalid = market.invalid_outcome_index();
  market
    .outcomes()
    .iter()
    .enumerate()
    .map(|(index, outcome)| {
      if Some(index) == invalid {
        return Ok(market_ps.get(index).copied().unwrap_or(Probability::ZERO));
      }
      answer
        .probability_for(outcome)
        .ok_or_else(|| StrategyError::MissingOutcome(outcome.to_string()))
    })
    .collect()
}

/// Signed Kelly bet per outcome.
fn kelly_bets(
  market: &dyn AgentMarket,
  estimated: &[Probability],
  confidence: f64,
  max_bet: CollateralToken,
  policy: &CategoricalPolicy,
  force_simplified: bool,
) -> Result<Vec<CategoricalKellyBet>, StrategyError> {
  let fees = market.fees();
  let pool = if force_simplified {
    None
  } else {
    market.outcome_token_pool()
  };

  if market.is_binary() {
    let yes = market.get_outcome_index(&OutcomeStr::yes())?;
    let no = market.get_outcome_index(&OutcomeStr::no())?;
    let estimated_p_yes = estimated[yes].value();
    let reserves = pool.as_ref().and_then(|pool| Some((*pool.get(yes)?, *pool.get(no)?)));
    let bet = match reserves {
      Some((yes_pool, no_pool)) => kelly_bet_full(yes_pool, no_pool, estimated_p_yes, confidence, max_bet, &fees)?,
      None => kelly_bet_simplified(max_bet, market.current_p_yes()?.value(), estimated_p_yes, confidence)?,
    };
    let chosen = if bet.direction { yes } else { no };
    return Ok(
      (0..2)
        .map(|index| CategoricalKellyBet {
          index,
          size: if index == chosen { bet.size } else { CollateralToken::zero() },
        })
        .collect(),
    );
  }

  let bets = match pool {
    Some(pool) => kelly_bets_categorical_full(&pool, estimated, confidence, max_bet, &fees, policy)?,
    None => kelly_bets_categorical_simplified(&market.probabilities(), estimated, confidence, max_bet, policy)?,
  };
  Ok(bets)
}

/// Shared sizing knobs of both Kelly strategies.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Sizing {
  max_price_impact: Option<f64>,
  profitability_steps: usize,
  price_impact_tolerance: f64,
  price_impact_max_iters: usize,
}

impl Default for Sizing {
  fn default() -> Self {
    Self {
      max_price_impact: None,
      profitability_steps: DEFAULT_PROFITABILITY_STEPS,
      price_impact_tolerance: DEFAULT_PRICE_IMPACT_TOLERANCE,
      price_impact_max_iters: DEFAULT_PRICE_IMPACT_MAX_ITERS,
    }
  }
}

impl Sizing {
  fn apply_solver(&mut self, solver: &SolverConfig) {
    self.profitability_steps = solver.profitability_steps;
    self.price_impact_tolerance = solver.price_impact_tolerance;
    self.price_impact_max_iters = solver.max_iters;
  }

  /// Trades for a set of signed Kelly bets.
  ///
  /// Positive bets become the target holding of their outcome (after the
  /// price-impact cap). Negative bets reduce what is already held, never
  /// below zero, so shorting an outcome the agent does not hold trades
  /// nothing.
  fn trades(
    &self,
    bets: &[CategoricalKellyBet],
    existing: Option<&ExistingPosition>,
    market: &dyn AgentMarket,
  ) -> Result<Vec<Trade>, StrategyError> {
    let outcomes = market.outcomes();
    let pool = market.outcome_token_pool();
    let fees = market.fees();
    let mut target = Position::new(market.id());

    for bet in bets {
      let Some(outcome) = outcomes.get(bet.index) else {
        continue;
      };
      if bet.size > 0.0 {
        let size = match (self.max_price_impact, &pool) {
          (Some(max_impact), Some(pool)) => calculate_price_impact_for_max_bet(
            pool,
            bet.size,
            bet.index,
            &fees,
            max_impact,
            self.price_impact_tolerance,
            self.price_impact_max_iters,
          )?,
          _ => bet.size,
        };
        target = target.with_amount(outcome.clone(), market.get_in_usd(size));
      } else if bet.size < 0.0 {
        let held = existing.map_or_else(Usd::zero, |position| position.amount(outcome));
        let remaining = (held - market.get_in_usd(bet.size.abs())).max(Usd::zero());
        target = target.with_amount(outcome.clone(), remaining);
      }
    }

    build_rebalance_trades(existing, &target, market, self.profitability_steps)
  }
}

/// Kelly-sized bets, optionally capped by price impact.
#[derive(Debug, Clone, PartialEq)]
pub struct KellyBettingStrategy {
  max_bet_amount: Usd,
  policy: CategoricalPolicy,
  force_simplified_calculation: bool,
  sizing: Sizing,
}

impl KellyBettingStrategy {
  pub fn new(max_bet_amount: Usd) -> Self {
    Self {
      max_bet_amount,
      policy: CategoricalPolicy::default(),
      force_simplified_calculation: false,
      sizing: Sizing::default(),
    }
  }

  #[must_use]
  pub const fn with_max_price_impact(mut self, max_price_impact: Option<f64>) -> Self {
    self.sizing.max_price_impact = max_price_impact;
    self
  }

  #[must_use]
  pub const fn with_multiple_bets(mut self, allow: bool) -> Self {
    self.policy.allow_multiple_bets = allow;
    self
  }

  #[must_use]
  pub const fn with_shorting(mut self, allow: bool) -> Self {
    self.policy.allow_shorting = allow;
    self
  }

  #[must_use]
  pub const fn with_simplified_calculation(mut self, force: bool) -> Self {
    self.force_simplified_calculation = force;
    self
  }

  #[must_use]
  pub fn with_solver(mut self, solver: &SolverConfig) -> Self {
    self.sizing.apply_solver(solver);
    self
  }
}

impl BettingStrategy for KellyBettingStrategy {
  fn calculate_trades(
    &self,
    existing_position: Option<&ExistingPosition>,
    answer: &CategoricalProbabilisticAnswer,
    market: &dyn AgentMarket,
  ) -> Result<Vec<Trade>, StrategyError> {
    let estimated = estimated_probabilities(answer, market)?;
    let max_bet = market.get_usd_in_token(self.max_bet_amount);
    let bets = kelly_bets(
      market,
      &estimated,
      answer.confidence.value(),
      max_bet,
      &self.policy,
      self.force_simplified_calculation,
    )?;
    self.sizing.trades(&bets, existing_position, market)
  }

  fn maximum_possible_bet_amount(&self) -> Usd {
    self.max_bet_amount
  }
}

/// Bets on the most likely outcome, sized by Kelly at full conviction.
#[derive(Debug, Clone, PartialEq)]
pub struct MaxAccuracyWithKellyScaledBetsStrategy {
  max_bet_amount: Usd,
  sizing: Sizing,
}

impl MaxAccuracyWithKellyScaledBetsStrategy {
  pub fn new(max_bet_amount: Usd) -> Self {
    Self {
      max_bet_amount,
      sizing: Sizing::default(),
    }
  }

  #[must_use]
  pub const fn with_max_price_impact(mut self, max_price_impact: Option<f64>) -> Self {
    self.sizing.max_price_impact = max_price_impact;
    self
  }

  #[must_use]
  pub fn with_solver(mut self, solver: &SolverConfig) -> Self {
    self.sizing.apply_solver(solver);
    self
  }
}

impl BettingStrategy for MaxAccuracyWithKellyScaledBetsStrategy {
  fn calculate_trades(
    &self,
    existing_position: Option<&ExistingPosition>,
    answer: &CategoricalProbabilisticAnswer,
    market: &dyn AgentMarket,
  ) -> Result<Vec<Trade>, StrategyError> {
    let favored = most_likely_valid_outcome(answer, market)?;
    let estimated: Vec<Probability> = market
      .outcomes()
      .iter()
      .map(|o| if *o == favored { Probability::ONE } else { Probability::ZERO })
      .collect();
    let max_bet = market.get_usd_in_token(self.max_bet_amount);
    let bets = kelly_bets(market, &estimated, 1.0, max_bet, &CategoricalPolicy::default(), false)?;
    self.sizing.trades(&bets, existing_position, market)
  }

  fn maximum_possible_bet_amount(&self) -> Usd {
    self.max_bet_amount
  }
}
