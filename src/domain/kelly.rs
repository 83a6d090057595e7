//! Kelly criterion bet sizing.
//!
//! Two binary solvers:
//!
//! - `kelly_bet_simplified` sizes with `edge / odds` at a constant price.
//!   It ignores that the bet moves the market, which is only accurate for
//!   bets that are small next to the pool.
//! - `kelly_bet_full` maximises expected log-wealth along the CPMM curve,
//!   so the bet's own price impact is priced in. Buying `s` collateral of
//!   an outcome with reserve `x` against reserve `y` yields
//!   `T(s) = s + x·s / (y + s)` tokens, and the optimum solves
//!
//!   ```text
//!   p·(b - s)·T'(s) = (1 - p)·(b - s + T(s)) + p·(b - s)
//!   ```
//!
//!   which without fees is the quadratic `α·s² + β·s + γ = 0` with
//!
//!   ```text
//!   α = (1 - p)(b + x)
//!   β = (1 - p)(2b + x)·y + p·x·y
//!   γ = (1 - p)·b·y² - p·x·y·b
//!   ```
//!
//!   `b` is the bankroll (max bet) and `p` the confidence-dampened belief
//!   in the bought outcome. With a proportional fee the condition turns
//!   cubic; the objective stays concave, so its derivative is bisected.
//!
//! Categorical markets are handled outcome by outcome (each outcome
//! against the rest), then filtered by [`CategoricalPolicy`].
//!
//! Confidence dampens the edge, not the probability: the solvers use
//! `p = market + confidence * (estimate - market)`, so a fairly priced
//! market yields a zero bet at any confidence.

use serde::{Deserialize, Serialize};

use super::cpmm::marginal_probabilities;
use super::error::ValidationError;
use super::fees::MarketFees;
use super::probability::{Probability, check_is_valid_probability};
use super::value::{CollateralToken, OutcomeToken};

/// Substitute for a zero market probability in the odds term.
const MIN_MARKET_PROBABILITY: f64 = 1e-10;

/// Binary Kelly decision. `size` is never negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinaryKellyBet {
    /// `true` buys YES, `false` buys NO.
    pub direction: bool,
    pub size: CollateralToken,
}

impl BinaryKellyBet {
    pub const fn zero() -> Self {
        Self {
            direction: true,
            size: CollateralToken::zero(),
        }
    }
}

/// Per-outcome Kelly decision in a categorical market.
///
/// `size` is signed: negative means shorting (selling) the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoricalKellyBet {
    pub index: usize,
    pub size: CollateralToken,
}

/// Post-processing rules for categorical Kelly bets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CategoricalPolicy {
    /// Bet on every outcome with an edge instead of only the best one.
    #[serde(default)]
    pub allow_multiple_bets: bool,
    /// Keep negative (short) bets instead of clamping them to zero.
    #[serde(default)]
    pub allow_shorting: bool,
}

fn check_max_bet(max_bet: CollateralToken) -> Result<(), ValidationError> {
    if max_bet.is_finite() && max_bet >= 0.0 {
        Ok(())
    } else {
        Err(ValidationError::InvalidParameter(format!(
            "max_bet must be finite and non-negative, got {max_bet}"
        )))
    }
}

fn dampened(market_p: f64, estimated_p: f64, confidence: f64) -> f64 {
    market_p + confidence * (estimated_p - market_p)
}

/// Kelly fraction for buying one side at a constant price.
fn constant_price_fraction(my_prob: f64, market_prob: f64, confidence: f64) -> f64 {
    let edge = (my_prob - market_prob) * confidence;
    let market_prob = if market_prob == 0.0 {
        MIN_MARKET_PROBABILITY
    } else {
        market_prob
    };
    let odds = 1.0 / market_prob - 1.0;
    if odds <= 0.0 {
        // Price of 1: nothing left to win.
        return 0.0;
    }
    edge / odds
}

/// Kelly bet ignoring price impact.
///
/// Bets YES when the estimate is above the market, NO otherwise.
pub fn kelly_bet_simplified(
    max_bet: CollateralToken,
    market_p_yes: f64,
    estimated_p_yes: f64,
    confidence: f64,
) -> Result<BinaryKellyBet, ValidationError> {
    check_is_valid_probability(market_p_yes)?;
    check_is_valid_probability(estimated_p_yes)?;
    check_is_valid_probability(confidence)?;
    check_max_bet(max_bet)?;

    let direction = estimated_p_yes > market_p_yes;
    let (my_prob, market_prob) = if direction {
        (estimated_p_yes, market_p_yes)
    } else {
        (1.0 - estimated_p_yes, 1.0 - market_p_yes)
    };

    let fraction = constant_price_fraction(my_prob, market_prob, confidence);
    let size = (max_bet * fraction).clamp_between(CollateralToken::zero(), max_bet);

    Ok(BinaryKellyBet { direction, size })
}

/// Bisection steps for the fee-adjusted optimum.
const FULL_KELLY_BISECTION_STEPS: usize = 200;

/// Fee-free optimum for buying the outcome with reserve `x` against `y`
/// when `p` is above its marginal price. Conjugate root form, so there is
/// no cancellation near a fair price and `p = 1` gives exactly `b`.
fn fee_free_optimum(x: f64, y: f64, p: f64, b: f64) -> f64 {
    let alpha = (1.0 - p) * (b + x);
    let beta = (1.0 - p) * (2.0 * b + x) * y + p * x * y;
    let gamma = (1.0 - p) * b * y * y - p * x * y * b;
    if gamma >= 0.0 {
        return 0.0;
    }

    let discriminant = beta * beta - 4.0 * alpha * gamma;
    let denominator = beta + discriminant.max(0.0).sqrt();
    if denominator <= 0.0 {
        return 0.0;
    }
    -2.0 * gamma / denominator
}

/// Optimum with `g = 1 - fee` of every bet reaching the pool.
fn fee_adjusted_optimum(x: f64, y: f64, p: f64, b: f64, g: f64) -> f64 {
    // Derivative of p·ln(W_win) + (1 - p)·ln(W_lose), decreasing in s.
    let marginal_utility = |s: f64| {
        let e = g * s;
        let win_wealth = b - s + e + x * e / (y + e);
        let win_slope = -1.0 + g * (1.0 + x * y / ((y + e) * (y + e)));
        p * win_slope / win_wealth - (1.0 - p) / (b - s)
    };

    if marginal_utility(0.0) <= 0.0 {
        return 0.0;
    }
    let (mut lo, mut hi) = (0.0, b);
    for _ in 0..FULL_KELLY_BISECTION_STEPS {
        let mid = (lo + hi) / 2.0;
        if marginal_utility(mid) > 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    lo
}

/// Kelly bet accounting for the bet's own price impact on a binary CPMM.
///
/// The absolute fee is folded into an effective proportional fee relative
/// to `max_bet`. Degenerate inputs (zero bankroll, empty pool, fees that
/// eat the bankroll) produce a zero bet, never NaN.
pub fn kelly_bet_full(
    yes_outcome_pool_size: OutcomeToken,
    no_outcome_pool_size: OutcomeToken,
    estimated_p_yes: f64,
    confidence: f64,
    max_bet: CollateralToken,
    fees: &MarketFees,
) -> Result<BinaryKellyBet, ValidationError> {
    check_is_valid_probability(estimated_p_yes)?;
    check_is_valid_probability(confidence)?;
    check_max_bet(max_bet)?;

    if max_bet == 0.0 {
        return Ok(BinaryKellyBet::zero());
    }

    let x = yes_outcome_pool_size.value();
    let y = no_outcome_pool_size.value();

    if !(x > 0.0 && y > 0.0) {
        // No curve to move along; price at the marginal probability.
        let market_p_yes = marginal_probabilities(&[yes_outcome_pool_size, no_outcome_pool_size])[0].value();
        return kelly_bet_simplified(max_bet, market_p_yes, estimated_p_yes, confidence);
    }

    let b = max_bet.value();
    let market_p_yes = y / (x + y);
    let p = dampened(market_p_yes, estimated_p_yes, confidence);
    let g = 1.0 - fees.total_fee_relative_value(b);
    if g <= 0.0 {
        return Ok(BinaryKellyBet::zero());
    }

    // A side is worth buying only if its first unit pays: g·p > price.
    let (direction, bought, other, win_p) = if g * p > market_p_yes {
        (true, x, y, p)
    } else if g * (1.0 - p) > 1.0 - market_p_yes {
        (false, y, x, 1.0 - p)
    } else {
        return Ok(BinaryKellyBet::zero());
    };

    let size = if g >= 1.0 {
        fee_free_optimum(bought, other, win_p, b)
    } else {
        fee_adjusted_optimum(bought, other, win_p, b, g)
    };

    if !size.is_finite() {
        return Ok(BinaryKellyBet::zero());
    }

    Ok(BinaryKellyBet {
        direction,
        // Clip to max_bet to absorb rounding.
        size: CollateralToken::new(size.max(0.0)).min(max_bet),
    })
}

fn check_lengths(expected: usize, actual: usize) -> Result<(), ValidationError> {
    if expected == actual {
        Ok(())
    } else {
        Err(ValidationError::LengthMismatch { expected, actual })
    }
}

fn signed(bet: BinaryKellyBet) -> CollateralToken {
    if bet.direction { bet.size } else { -bet.size }
}

/// Apply shorting and multi-bet rules to raw signed per-outcome bets.
///
/// `edges[i]` is the dampened edge of outcome `i`. With multiple bets
/// disallowed only the buy with the largest positive edge survives and
/// every other entry, shorts included, is zeroed.
fn apply_policy(sizes: Vec<CollateralToken>, edges: &[f64], policy: &CategoricalPolicy) -> Vec<CategoricalKellyBet> {
    let mut sizes: Vec<CollateralToken> = sizes
        .into_iter()
        .map(|s| if policy.allow_shorting { s } else { s.max(CollateralToken::zero()) })
        .collect();

    if !policy.allow_multiple_bets {
        let best = sizes
            .iter()
            .enumerate()
            .filter(|(i, s)| **s > 0.0 && edges[*i] > 0.0)
            .max_by(|(i, _), (j, _)| edges[*i].total_cmp(&edges[*j]))
            .map(|(i, _)| i);
        for (i, size) in sizes.iter_mut().enumerate() {
            if Some(i) != best {
                *size = CollateralToken::zero();
            }
        }
    }

    sizes
        .into_iter()
        .enumerate()
        .map(|(index, size)| CategoricalKellyBet { index, size })
        .collect()
}

/// Per-outcome simplified Kelly for an N-outcome market.
pub fn kelly_bets_categorical_simplified(
    market_probabilities: &[Probability],
    estimated_probabilities: &[Probability],
    confidence: f64,
    max_bet: CollateralToken,
    policy: &CategoricalPolicy,
) -> Result<Vec<CategoricalKellyBet>, ValidationError> {
    check_lengths(market_probabilities.len(), estimated_probabilities.len())?;

    let mut sizes = Vec::with_capacity(market_probabilities.len());
    let mut edges = Vec::with_capacity(market_probabilities.len());
    for (market_p, estimated_p) in market_probabilities.iter().zip(estimated_probabilities) {
        let bet = kelly_bet_simplified(max_bet, market_p.value(), estimated_p.value(), confidence)?;
        sizes.push(signed(bet));
        edges.push((estimated_p.value() - market_p.value()) * confidence);
    }

    Ok(apply_policy(sizes, &edges, policy))
}

/// Per-outcome full Kelly for an N-outcome CPMM.
///
/// Outcome `i` is solved as a binary market of `i` against the rest: its
/// own reserve on the YES side and a synthetic NO reserve
/// `r_i * m_i / (1 - m_i)` that reproduces its marginal price `m_i`. For
/// two outcomes the synthetic reserve is exactly the other reserve.
pub fn kelly_bets_categorical_full(
    outcome_pool_sizes: &[OutcomeToken],
    estimated_probabilities: &[Probability],
    confidence: f64,
    max_bet: CollateralToken,
    fees: &MarketFees,
    policy: &CategoricalPolicy,
) -> Result<Vec<CategoricalKellyBet>, ValidationError> {
    check_lengths(outcome_pool_sizes.len(), estimated_probabilities.len())?;

    let market_probabilities = marginal_probabilities(outcome_pool_sizes);
    let mut sizes = Vec::with_capacity(outcome_pool_sizes.len());
    let mut edges = Vec::with_capacity(outcome_pool_sizes.len());

    for ((reserve, market_p), estimated_p) in outcome_pool_sizes
        .iter()
        .zip(&market_probabilities)
        .zip(estimated_probabilities)
    {
        let m = market_p.value();
        let bet = if *reserve > 0.0 && m > 0.0 && m < 1.0 {
            let rest = OutcomeToken::new(reserve.value() * m / (1.0 - m));
            kelly_bet_full(*reserve, rest, estimated_p.value(), confidence, max_bet, fees)?
        } else {
            kelly_bet_simplified(max_bet, m, estimated_p.value(), confidence)?
        };
        sizes.push(signed(bet));
        edges.push((estimated_p.value() - m) * confidence);
    }

    Ok(apply_policy(sizes, &edges, policy))
}
