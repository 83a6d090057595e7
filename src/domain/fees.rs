//! Market fee schedule.
//!
//! CPMM markets charge a proportional fee on the bet amount and may add an
//! absolute fee on top. Fees are deducted before the bet enters the pool.

use serde::{Deserialize, Serialize};

use super::error::ValidationError;
use super::value::CollateralToken;

/// Proportional plus absolute fee charged on every buy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketFees {
    /// Proportion of the bet, `0 <= bet_proportion < 1`.
    bet_proportion: f64,
    /// Absolute fee in the collateral of the market.
    #[serde(default)]
    absolute: f64,
}

impl MarketFees {
    pub fn new(bet_proportion: f64, absolute: f64) -> Result<Self, ValidationError> {
        if !(0.0..1.0).contains(&bet_proportion) {
            return Err(ValidationError::InvalidFeeProportion(bet_proportion));
        }
        if !(absolute >= 0.0 && absolute.is_finite()) {
            return Err(ValidationError::InvalidAbsoluteFee(absolute));
        }
        Ok(Self {
            bet_proportion,
            absolute,
        })
    }

    pub const fn zero() -> Self {
        Self {
            bet_proportion: 0.0,
            absolute: 0.0,
        }
    }

    pub const fn bet_proportion(&self) -> f64 {
        self.bet_proportion
    }

    pub const fn absolute(&self) -> f64 {
        self.absolute
    }

    /// Total fee for `bet_amount`, proportional and fixed parts together.
    pub fn total_fee_absolute_value(&self, bet_amount: f64) -> f64 {
        self.bet_proportion * bet_amount + self.absolute
    }

    /// Total fee as a fraction of `bet_amount`. Zero for a zero bet.
    pub fn total_fee_relative_value(&self, bet_amount: f64) -> f64 {
        if bet_amount == 0.0 {
            return 0.0;
        }
        self.total_fee_absolute_value(bet_amount) / bet_amount
    }

    /// Amount that actually reaches the pool.
    pub fn get_after_fees(&self, bet_amount: CollateralToken) -> CollateralToken {
        bet_amount * (1.0 - self.bet_proportion) - CollateralToken::new(self.absolute)
    }

    /// Re-validate after deserialization.
    pub fn validated(self) -> Result<Self, ValidationError> {
        Self::new(self.bet_proportion, self.absolute)
    }
}

impl Default for MarketFees {
    fn default() -> Self {
        Self::zero()
    }
}
