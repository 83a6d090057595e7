//! Small bet sizing helpers.

use serde::{Deserialize, Serialize};

use super::error::ValidationError;
use super::probability::{Probability, check_is_valid_probability};
use super::value::{CollateralToken, Usd};

/// Map a probability linearly onto `[min_bet, max_bet]`.
pub fn stretch_bet_between(probability: Probability, min_bet: Usd, max_bet: Usd) -> Result<Usd, ValidationError> {
    if min_bet > max_bet {
        return Err(ValidationError::InvertedBounds {
            min: min_bet.value(),
            max: max_bet.value(),
        });
    }
    Ok(min_bet + (max_bet - min_bet) * probability.value())
}

/// Bet needed to win `amount_to_win` at a constant `share_price`.
///
/// The price must be strictly inside `(0, 1)`; at 0 or 1 there is either
/// nothing to pay or nothing to win.
pub fn minimum_bet_to_win(share_price: f64, amount_to_win: CollateralToken) -> Result<CollateralToken, ValidationError> {
    check_is_valid_probability(share_price)?;
    if share_price <= 0.0 || share_price >= 1.0 {
        return Err(ValidationError::InvalidParameter(format!(
            "share price must be strictly between 0 and 1, got {share_price}"
        )));
    }
    Ok(amount_to_win / (1.0 / share_price - 1.0))
}

/// Bet amount as configured: a fixed sum, or a fraction of the bankroll.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum BetAmount {
    Static(Usd),
    Proportion(f64),
}

impl BetAmount {
    pub fn resolve(&self, bankroll: Usd) -> Usd {
        match self {
            Self::Static(amount) => *amount,
            Self::Proportion(fraction) => bankroll * *fraction,
        }
    }
}
