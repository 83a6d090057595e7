//! Fixed-Amount Strategies - Accuracy and Expected Value
//!
//! Both strategies risk a fixed amount per market and differ only in how
//! they pick the outcome:
//! - `MaxAccuracyBettingStrategy`: the outcome the belief favors
//! - `MaxExpectedValueBettingStrategy`: the outcome with the highest
//!   expected profit net of fees and slippage, or nothing

use crate::domain::bet_utils::stretch_bet_between;
use crate::domain::error::StrategyError;
use crate::domain::trade::{CategoricalProbabilisticAnswer, ExistingPosition, OutcomeStr, Position, Trade};
use crate::domain::value::Usd;
use crate::ports::market::AgentMarket;

use super::betting_strategy::{
  BettingStrategy, DEFAULT_PROFITABILITY_STEPS, build_rebalance_trades, most_likely_valid_outcome,
};

/// Always holds `bet_amount` of the most likely outcome.
///
/// With a minimum bet set, the held amount is stretched between the
/// minimum and `bet_amount` by the belief in that outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct MaxAccuracyBettingStrategy {
  bet_amount: Usd,
  min_bet_amount: Option<Usd>,
  profitability_steps: usize,
}

impl MaxAccuracyBettingStrategy {
  pub const fn new(bet_amount: Usd) -> Self {
    Self {
      bet_amount,
      min_bet_amount: None,
      profitability_steps: DEFAULT_PROFITABILITY_STEPS,
    }
  }

  #[must_use]
  pub const fn with_min_bet_amount(mut self, min_bet_amount: Option<Usd>) -> Self {
    self.min_bet_amount = min_bet_amount;
    self
  }

  #[must_use]
  pub const fn with_profitability_steps(mut self, steps: usize) -> Self {
    self.profitability_steps = steps;
    self
  }
}

impl BettingStrategy for MaxAccuracyBettingStrategy {
  fn calculate_trades(
    &self,
    existing_position: Option<&ExistingPosition>,
    answer: &CategoricalProbabilisticAnswer,
    market: &dyn AgentMarket,
  ) -> Result<Vec<Trade>, StrategyError> {
    let outcome = most_likely_valid_outcome(answer, market)?;
    let amount = match self.min_bet_amount {
      Some(min_bet) => {
        let probability = answer
          .probability_for(&outcome)
          .ok_or_else(|| StrategyError::MissingOutcome(outcome.to_string()))?;
        stretch_bet_between(probability, min_bet, self.bet_amount)?
      }
      None => self.bet_amount,
    };
    let target = Position::new(market.id()).with_amount(outcome, amount);
    build_rebalance_trades(existing_position, &target, market, self.profitability_steps)
  }

  fn maximum_possible_bet_amount(&self) -> Usd {
    self.bet_amount
  }
}

/// Holds `bet_amount` of the outcome with the highest positive expected
/// value, or trades nothing when no outcome has one.
#[derive(Debug, Clone, PartialEq)]
pub struct MaxExpectedValueBettingStrategy {
  bet_amount: Usd,
  profitability_steps: usize,
}

impl MaxExpectedValueBettingStrategy {
  pub const fn new(bet_amount: Usd) -> Self {
    Self {
      bet_amount,
      profitability_steps: DEFAULT_PROFITABILITY_STEPS,
    }
  }

  #[must_use]
  pub const fn with_profitability_steps(mut self, steps: usize) -> Self {
    self.profitability_steps = steps;
    self
  }

  /// Expected profit (USD) of buying `bet_amount` of `outcome`.
  fn expected_value(
    &self,
    outcome: &OutcomeStr,
    answer: &CategoricalProbabilisticAnswer,
    market: &dyn AgentMarket,
  ) -> Result<Option<f64>, StrategyError> {
    let Some(p) = answer.probability_for(outcome) else {
      return Ok(None);
    };
    let tokens = market.get_buy_token_amount(self.bet_amount, outcome)?;
    let payout = market.get_in_usd(tokens.as_token());
    Ok(Some((payout * p.value() - self.bet_amount).value()))
  }
}

impl BettingStrategy for MaxExpectedValueBettingStrategy {
  fn calculate_trades(
    &self,
    existing_position: Option<&ExistingPosition>,
    answer: &CategoricalProbabilisticAnswer,
    market: &dyn AgentMarket,
  ) -> Result<Vec<Trade>, StrategyError> {
    let outcomes = market.outcomes();
    let invalid = market.invalid_outcome_index();

    let mut best: Option<(OutcomeStr, f64)> = None;
    for (index, outcome) in outcomes.into_iter().enumerate() {
      if Some(index) == invalid {
        continue;
      }
      let Some(ev) = self.expected_value(&outcome, answer, market)? else {
        continue;
      };
      if ev > 0.0 && best.as_ref().is_none_or(|(_, top)| ev > *top) {
        best = Some((outcome, ev));
      }
    }

    let Some((outcome, _)) = best else {
      return Ok(Vec::new());
    };
    let target = Position::new(market.id()).with_amount(outcome, self.bet_amount);
    build_rebalance_trades(existing_position, &target, market, self.profitability_steps)
  }

  fn maximum_possible_bet_amount(&self) -> Usd {
    self.bet_amount
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::adapters::market_snapshot::MarketSnapshot;
  use crate::domain::fees::MarketFees;
  use crate::domain::trade::TradeType;
  use crate::domain::value::OutcomeToken;

  fn market(yes: f64, no: f64, fee: f64) -> MarketSnapshot {
    MarketSnapshot::binary(
      "0xmarket",
      OutcomeToken::new(yes),
      OutcomeToken::new(no),
      MarketFees::new(fee, 0.0).unwrap(),
    )
  }

  #[test]
  fn test_max_accuracy_bets_on_favored_side() {
    let strategy = MaxAccuracyBettingStrategy::new(Usd::new(1.0));
    let answer = CategoricalProbabilisticAnswer::binary(0.3, 0.8).unwrap();
    let trades = strategy.calculate_trades(None, &answer, &market(10.0, 10.0, 0.02)).unwrap();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].trade_type, TradeType::Buy);
    assert_eq!(trades[0].outcome, OutcomeStr::no());
    assert_eq!(trades[0].amount, Usd::new(1.0));
  }

  #[test]
  fn test_max_accuracy_existing_position_is_netted() {
    let strategy = MaxAccuracyBettingStrategy::new(Usd::new(1.0));
    let answer = CategoricalProbabilisticAnswer::binary(0.9, 1.0).unwrap();
    let existing = Position::new("0xmarket").with_amount(OutcomeStr::yes(), Usd::new(1.0));
    let trades = strategy
      .calculate_trades(Some(&existing), &answer, &market(10.0, 10.0, 0.0))
      .unwrap();
    assert!(trades.is_empty());
  }

  #[test]
  fn test_max_accuracy_guaranteed_loss() {
    let strategy = MaxAccuracyBettingStrategy::new(Usd::new(1.0));
    let answer = CategoricalProbabilisticAnswer::binary(0.9, 1.0).unwrap();
    let err = strategy
      .calculate_trades(None, &answer, &market(10.0, 10.0, 0.99))
      .unwrap_err();
    assert!(err.is_guaranteed_loss());
  }

  #[test]
  fn test_max_accuracy_stretches_between_min_and_max() {
    let strategy = MaxAccuracyBettingStrategy::new(Usd::new(5.0)).with_min_bet_amount(Some(Usd::new(1.0)));
    let answer = CategoricalProbabilisticAnswer::binary(0.25, 1.0).unwrap();
    let trades = strategy.calculate_trades(None, &answer, &market(10.0, 10.0, 0.0)).unwrap();
    // Favors NO at 0.75: 1 + (5 - 1) * 0.75.
    assert_eq!(trades, vec![Trade::buy(OutcomeStr::no(), Usd::new(4.0))]);
  }

  #[test]
  fn test_max_accuracy_rejects_min_above_max() {
    let strategy = MaxAccuracyBettingStrategy::new(Usd::new(1.0)).with_min_bet_amount(Some(Usd::new(2.0)));
    let answer = CategoricalProbabilisticAnswer::binary(0.9, 1.0).unwrap();
    let err = strategy
      .calculate_trades(None, &answer, &market(10.0, 10.0, 0.0))
      .unwrap_err();
    assert!(matches!(err, StrategyError::Validation(_)), "{err}");
  }

  #[test]
  fn test_max_expected_value_picks_underpriced_side() {
    // Market says 0.5, belief says 0.8 for YES.
    let strategy = MaxExpectedValueBettingStrategy::new(Usd::new(1.0));
    let answer = CategoricalProbabilisticAnswer::binary(0.8, 1.0).unwrap();
    let trades = strategy.calculate_trades(None, &answer, &market(10.0, 10.0, 0.02)).unwrap();
    assert_eq!(trades, vec![Trade::buy(OutcomeStr::yes(), Usd::new(1.0))]);
  }

  #[test]
  fn test_max_expected_value_no_trade_at_fair_price() {
    // With a fee, buying at a fair price has negative expected value.
    let strategy = MaxExpectedValueBettingStrategy::new(Usd::new(1.0));
    let answer = CategoricalProbabilisticAnswer::binary(0.5, 1.0).unwrap();
    let trades = strategy.calculate_trades(None, &answer, &market(10.0, 10.0, 0.02)).unwrap();
    assert!(trades.is_empty());
  }
}
