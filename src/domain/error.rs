//! Error types for the betting engine.
//!
//! Numeric degeneracy never shows up here: degenerate pools and
//! denominators short-circuit to zero-sized bets instead.

use thiserror::Error;

/// Boundary validation failures (bad probabilities, bad fee schedules).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A probability or confidence outside `[0, 1]`.
    #[error("probability must be between 0 and 1, got {0}")]
    ProbabilityOutOfRange(f64),

    /// Proportional fee outside `[0, 1)`.
    #[error("bet_proportion fee must be in [0, 1), got {0}")]
    InvalidFeeProportion(f64),

    /// Negative absolute fee.
    #[error("absolute fee must be non-negative, got {0}")]
    InvalidAbsoluteFee(f64),

    /// Input vectors that must line up do not.
    #[error("length mismatch: expected {expected} entries, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Lower bound above upper bound.
    #[error("minimum bet {min} cannot be greater than maximum bet {max}")]
    InvertedBounds { min: f64, max: f64 },

    /// Any other rejected parameter.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Failures of the CPMM pricing functions.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CpmmError {
    /// The pool has no reserves to trade against.
    #[error("outcome pool is empty")]
    EmptyPool,

    /// Outcome index not present in the pool.
    #[error("outcome index {index} out of range for pool of {len} outcomes")]
    OutcomeOutOfRange { index: usize, len: usize },

    /// Share counts for a sell must be strictly positive.
    #[error("all share arguments must be greater than 0")]
    NonPositiveShares,
}

/// Errors surfaced by betting strategies to their caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StrategyError {
    /// No trade can be profitable for the current fees and pool.
    /// Callers skip the market; this is not fatal.
    #[error("guaranteed loss: {0}")]
    GuaranteedLoss(String),

    /// An answer or market is missing an outcome the strategy needs.
    #[error("outcome {0:?} is missing")]
    MissingOutcome(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Cpmm(#[from] CpmmError),
}

impl StrategyError {
    /// True for errors that mean "skip this market".
    pub const fn is_guaranteed_loss(&self) -> bool {
        matches!(self, Self::GuaranteedLoss(_))
    }
}
