//! Validated probabilities.
//!
//! Probabilities and confidences are checked once, at construction, so
//! solvers never see values outside `[0, 1]`.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use super::error::ValidationError;

/// Fail fast if `probability` is not in `[0, 1]` (NaN included).
pub fn check_is_valid_probability(probability: f64) -> Result<(), ValidationError> {
    if (0.0..=1.0).contains(&probability) {
        Ok(())
    } else {
        Err(ValidationError::ProbabilityOutOfRange(probability))
    }
}

/// A float constrained to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Probability(f64);

impl Probability {
    pub const ZERO: Self = Self(0.0);
    pub const ONE: Self = Self(1.0);

    pub fn new(value: f64) -> Result<Self, ValidationError> {
        check_is_valid_probability(value)?;
        Ok(Self(value))
    }

    /// Clamp into range instead of failing. Used for values produced by
    /// our own arithmetic, where float noise can leave `[0, 1]` by an ulp.
    pub fn clamped(value: f64) -> Self {
        if value.is_nan() {
            Self::ZERO
        } else {
            Self(value.clamp(0.0, 1.0))
        }
    }

    pub const fn value(self) -> f64 {
        self.0
    }

    #[must_use]
    pub fn complement(self) -> Self {
        Self(1.0 - self.0)
    }
}

impl fmt::Display for Probability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.0)
    }
}

impl TryFrom<f64> for Probability {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for Probability {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = f64::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}
