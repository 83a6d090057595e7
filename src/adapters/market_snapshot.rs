//! Market Snapshot - In-Memory CPMM Market
//!
//! A frozen copy of a market's state (outcomes, reserves, fees and the
//! collateral/USD rate) that implements [`AgentMarket`] with the domain's
//! CPMM math. Backtests deserialize these from JSON datasets.

use serde::{Deserialize, Serialize};

use crate::domain::cpmm::{buy_amount, marginal_probabilities};
use crate::domain::error::{CpmmError, StrategyError, ValidationError};
use crate::domain::fees::MarketFees;
use crate::domain::probability::Probability;
use crate::domain::trade::{MarketId, OutcomeStr};
use crate::domain::value::{CollateralToken, OutcomeToken, Usd};
use crate::ports::market::AgentMarket;

fn default_usd_per_collateral() -> f64 {
    1.0
}

/// Frozen market state.
///
/// Either `outcome_token_pool` or `probabilities` must be present. With a
/// pool, prices are derived from the reserves; without one, buys execute
/// at the quoted price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub id: MarketId,
    #[serde(default)]
    pub question: String,
    pub outcomes: Vec<OutcomeStr>,
    #[serde(default)]
    pub outcome_token_pool: Option<Vec<OutcomeToken>>,
    #[serde(default)]
    pub probabilities: Option<Vec<Probability>>,
    #[serde(default)]
    pub fees: MarketFees,
    /// USD value of one unit of collateral (1.0 for xDai/sDai-like stablecoins).
    #[serde(default = "default_usd_per_collateral")]
    pub usd_per_collateral: f64,
    #[serde(default)]
    pub invalid_outcome_index: Option<usize>,
}

impl MarketSnapshot {
    /// Yes/no CPMM market.
    pub fn binary(id: impl Into<MarketId>, yes: OutcomeToken, no: OutcomeToken, fees: MarketFees) -> Self {
        Self::categorical(id, vec![OutcomeStr::yes(), OutcomeStr::no()], vec![yes, no], fees)
    }

    /// N-outcome CPMM market.
    pub fn categorical(
        id: impl Into<MarketId>,
        outcomes: Vec<OutcomeStr>,
        pool: Vec<OutcomeToken>,
        fees: MarketFees,
    ) -> Self {
        Self {
            id: id.into(),
            question: String::new(),
            outcomes,
            outcome_token_pool: Some(pool),
            probabilities: None,
            fees,
            usd_per_collateral: default_usd_per_collateral(),
            invalid_outcome_index: None,
        }
    }

    /// Market quoted by price only, without a pool.
    pub fn quoted(id: impl Into<MarketId>, outcomes: Vec<OutcomeStr>, probabilities: Vec<Probability>, fees: MarketFees) -> Self {
        Self {
            id: id.into(),
            question: String::new(),
            outcomes,
            outcome_token_pool: None,
            probabilities: Some(probabilities),
            fees,
            usd_per_collateral: default_usd_per_collateral(),
            invalid_outcome_index: None,
        }
    }

    #[must_use]
    pub fn with_usd_per_collateral(mut self, rate: f64) -> Self {
        self.usd_per_collateral = rate;
        self
    }

    #[must_use]
    pub fn with_question(mut self, question: impl Into<String>) -> Self {
        self.question = question.into();
        self
    }

    /// Check a deserialized snapshot before use.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let expected = self.outcomes.len();
        if expected < 2 {
            return Err(ValidationError::InvalidParameter(format!(
                "market {} needs at least 2 outcomes, got {expected}",
                self.id
            )));
        }
        match (&self.outcome_token_pool, &self.probabilities) {
            (Some(pool), _) if pool.len() != expected => {
                return Err(ValidationError::LengthMismatch {
                    expected,
                    actual: pool.len(),
                });
            }
            (None, Some(probabilities)) if probabilities.len() != expected => {
                return Err(ValidationError::LengthMismatch {
                    expected,
                    actual: probabilities.len(),
                });
            }
            (None, None) => {
                return Err(ValidationError::InvalidParameter(format!(
                    "market {} has neither a pool nor probabilities",
                    self.id
                )));
            }
            _ => {}
        }
        let bad_reserve = self
            .outcome_token_pool
            .as_ref()
            .is_some_and(|pool| pool.iter().any(|r| !r.is_finite() || *r < 0.0));
        if bad_reserve {
            return Err(ValidationError::InvalidParameter(format!(
                "market {} has a negative or non-finite reserve",
                self.id
            )));
        }
        if !(self.usd_per_collateral.is_finite() && self.usd_per_collateral > 0.0) {
            return Err(ValidationError::InvalidParameter(format!(
                "usd_per_collateral must be positive, got {}",
                self.usd_per_collateral
            )));
        }
        if let Some(index) = self.invalid_outcome_index.filter(|i| *i >= expected) {
            return Err(ValidationError::InvalidParameter(format!(
                "invalid_outcome_index {index} out of range"
            )));
        }
        self.fees.validated().map(|_| ())
    }
}

impl AgentMarket for MarketSnapshot {
    fn id(&self) -> MarketId {
        self.id.clone()
    }

    fn outcomes(&self) -> Vec<OutcomeStr> {
        self.outcomes.clone()
    }

    fn probabilities(&self) -> Vec<Probability> {
        match (&self.outcome_token_pool, &self.probabilities) {
            (Some(pool), _) => marginal_probabilities(pool),
            (None, Some(probabilities)) => probabilities.clone(),
            (None, None) => vec![Probability::ZERO; self.outcomes.len()],
        }
    }

    fn outcome_token_pool(&self) -> Option<Vec<OutcomeToken>> {
        self.outcome_token_pool.clone()
    }

    fn fees(&self) -> MarketFees {
        self.fees
    }

    fn invalid_outcome_index(&self) -> Option<usize> {
        self.invalid_outcome_index
    }

    fn get_buy_token_amount(&self, bet_amount: Usd, outcome: &OutcomeStr) -> Result<OutcomeToken, StrategyError> {
        let index = self.get_outcome_index(outcome)?;
        let collateral = self.get_usd_in_token(bet_amount);

        if let Some(pool) = &self.outcome_token_pool {
            return Ok(buy_amount(pool, collateral, index, &self.fees)?);
        }

        // Quoted market: buy at a constant price.
        let price = self.probability_of(outcome)?.value();
        if price <= 0.0 {
            return Err(CpmmError::EmptyPool.into());
        }
        let after_fees = self.fees.get_after_fees(collateral).max(CollateralToken::zero());
        Ok(OutcomeToken::from_token(after_fees / price))
    }

    fn get_in_usd(&self, amount: CollateralToken) -> Usd {
        Usd::new(amount.value() * self.usd_per_collateral)
    }

    fn get_usd_in_token(&self, amount: Usd) -> CollateralToken {
        CollateralToken::new(amount.value() / self.usd_per_collateral)
    }
}
