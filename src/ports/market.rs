//! Agent Market Port - Market State Consumed by Strategies
//!
//! Strategies never talk to a venue directly. They read reserves, prices,
//! fees and currency conversion through this trait, which also exposes
//! the market's own token-amount calculation as a cross-check oracle for
//! the CPMM math.

use crate::domain::bet_utils::minimum_bet_to_win;
use crate::domain::cpmm::{marginal_probabilities, pool_after_buy};
use crate::domain::error::StrategyError;
use crate::domain::fees::MarketFees;
use crate::domain::probability::Probability;
use crate::domain::trade::{MarketId, OutcomeStr};
use crate::domain::value::{CollateralToken, OutcomeToken, Usd};

/// Read-only view of a prediction market.
///
/// Implementations must be pure: every call on the same instance returns
/// the same answer, and nothing is mutated.
pub trait AgentMarket: Send + Sync {
  /// Market identifier.
  fn id(&self) -> MarketId;

  /// Outcome labels, in pool order.
  fn outcomes(&self) -> Vec<OutcomeStr>;

  /// Current market probability per outcome, aligned with `outcomes()`.
  fn probabilities(&self) -> Vec<Probability>;

  /// CPMM reserves aligned with `outcomes()`. `None` for markets that are
  /// not backed by a constant-product pool.
  fn outcome_token_pool(&self) -> Option<Vec<OutcomeToken>>;

  /// Fee schedule applied to every buy.
  fn fees(&self) -> MarketFees;

  /// Index of the "invalid" outcome, if the market has one. Strategies
  /// never bet on it.
  fn invalid_outcome_index(&self) -> Option<usize>;

  /// Outcome tokens received for spending `bet_amount` on `outcome`.
  fn get_buy_token_amount(&self, bet_amount: Usd, outcome: &OutcomeStr) -> Result<OutcomeToken, StrategyError>;

  /// Convert collateral to USD.
  fn get_in_usd(&self, amount: CollateralToken) -> Usd;

  /// Convert USD to collateral.
  fn get_usd_in_token(&self, amount: Usd) -> CollateralToken;

  /// Position of `outcome` in `outcomes()`.
  fn get_outcome_index(&self, outcome: &OutcomeStr) -> Result<usize, StrategyError> {
    self
      .outcomes()
      .iter()
      .position(|o| o == outcome)
      .ok_or_else(|| StrategyError::MissingOutcome(outcome.to_string()))
  }

  /// Market probability of `outcome`.
  fn probability_of(&self, outcome: &OutcomeStr) -> Result<Probability, StrategyError> {
    let index = self.get_outcome_index(outcome)?;
    self
      .probabilities()
      .get(index)
      .copied()
      .ok_or_else(|| StrategyError::MissingOutcome(outcome.to_string()))
  }

  /// Probability of YES for a yes/no market.
  fn current_p_yes(&self) -> Result<Probability, StrategyError> {
    self.probability_of(&OutcomeStr::yes())
  }

  /// True for a two-outcome market labelled Yes/No.
  fn is_binary(&self) -> bool {
    let outcomes = self.outcomes();
    outcomes.len() == 2 && outcomes.contains(&OutcomeStr::yes()) && outcomes.contains(&OutcomeStr::no())
  }

  /// Probability of YES after buying `bet_amount` of `outcome`.
  ///
  /// `None` when the market has no pool to move.
  fn get_new_p_yes(&self, bet_amount: Usd, outcome: &OutcomeStr) -> Result<Option<Probability>, StrategyError> {
    let Some(pool) = self.outcome_token_pool() else {
      return Ok(None);
    };
    let index = self.get_outcome_index(outcome)?;
    let yes_index = self.get_outcome_index(&OutcomeStr::yes())?;
    let new_pool = pool_after_buy(&pool, self.get_usd_in_token(bet_amount), index, &self.fees())?;
    Ok(marginal_probabilities(&new_pool).get(yes_index).copied())
  }

  /// Smallest bet on `outcome` that profits `amount_to_win` if it resolves
  /// true, at the current price.
  fn get_minimum_bet_to_win(&self, outcome: &OutcomeStr, amount_to_win: Usd) -> Result<Usd, StrategyError> {
    let price = self.probability_of(outcome)?.value();
    let bet = minimum_bet_to_win(price, self.get_usd_in_token(amount_to_win))?;
    Ok(self.get_in_usd(bet))
  }
}
