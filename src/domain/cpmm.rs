//! Constant-product market maker (CPMM / FPMM) pricing.
//!
//! Pure functions over outcome-token reserves. A buy of `b` collateral on
//! outcome `i` works like the Omen FPMM contract:
//!
//! 1. fees are deducted, leaving `e = b * (1 - fee) - absolute`;
//! 2. `e` collateral is split into `e` tokens of every outcome, so every
//!    reserve grows by `e`;
//! 3. enough tokens of outcome `i` leave the pool to restore the product
//!    of all reserves, and those are what the buyer receives.
//!
//! The marginal price of outcome `i` is proportional to the product of
//! all *other* reserves.

use super::error::CpmmError;
use super::fees::MarketFees;
use super::probability::Probability;
use super::value::{CollateralToken, OutcomeToken};

/// Bisection controls for iterative solvers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchParams {
    /// Hard cap on iterations. Numeric safety valve only.
    pub max_iters: usize,
    /// Absolute probability tolerance at which the search stops.
    pub tolerance: f64,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            max_iters: 100,
            tolerance: 1e-6,
        }
    }
}

/// Bet that moves a binary market to a target probability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketMovingBet {
    /// `true` buys YES, `false` buys NO.
    pub direction: bool,
    pub size: CollateralToken,
}

fn check_index(pool: &[OutcomeToken], index: usize) -> Result<(), CpmmError> {
    if pool.is_empty() {
        return Err(CpmmError::EmptyPool);
    }
    if index >= pool.len() {
        return Err(CpmmError::OutcomeOutOfRange {
            index,
            len: pool.len(),
        });
    }
    Ok(())
}

/// Marginal probabilities implied by the reserves.
///
/// An all-zero pool (no liquidity) maps to all-zero probabilities.
pub fn marginal_probabilities(pool: &[OutcomeToken]) -> Vec<Probability> {
    let weights: Vec<f64> = (0..pool.len())
        .map(|i| {
            pool.iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, r)| r.value())
                .product()
        })
        .collect();
    let total: f64 = weights.iter().sum();

    if total <= 0.0 || !total.is_finite() {
        return vec![Probability::ZERO; pool.len()];
    }
    weights
        .into_iter()
        .map(|w| Probability::clamped(w / total))
        .collect()
}

/// Outcome tokens received for betting `bet_amount` on `outcome_index`.
///
/// A bet that does not survive the fees buys nothing. Two-outcome pools
/// take the closed form.
pub fn buy_amount(
    pool: &[OutcomeToken],
    bet_amount: CollateralToken,
    outcome_index: usize,
    fees: &MarketFees,
) -> Result<OutcomeToken, CpmmError> {
    check_index(pool, outcome_index)?;

    if let [yes, no] = pool {
        return Ok(binary_buy_amount(*yes, *no, bet_amount, outcome_index == 0, fees));
    }

    let effective = fees.get_after_fees(bet_amount).value();
    if effective <= 0.0 {
        return Ok(OutcomeToken::zero());
    }

    let target = pool[outcome_index].value();
    let ending_balance = pool
        .iter()
        .enumerate()
        .filter(|(j, _)| *j != outcome_index)
        .fold(target, |acc, (_, r)| {
            let r = r.value();
            acc * r / (r + effective)
        });

    Ok(OutcomeToken::new((target + effective - ending_balance).max(0.0)))
}

/// Closed form for binary markets: `(r_i + e) - k / (r_other + e)`.
pub fn binary_buy_amount(
    yes: OutcomeToken,
    no: OutcomeToken,
    bet_amount: CollateralToken,
    direction: bool,
    fees: &MarketFees,
) -> OutcomeToken {
    let effective = fees.get_after_fees(bet_amount).value();
    if effective <= 0.0 {
        return OutcomeToken::zero();
    }
    let (bought, other) = if direction { (yes, no) } else { (no, yes) };
    let k = bought.value() * other.value();
    OutcomeToken::new((bought.value() + effective - k / (other.value() + effective)).max(0.0))
}

/// Reserves after the buy has been settled.
pub fn pool_after_buy(
    pool: &[OutcomeToken],
    bet_amount: CollateralToken,
    outcome_index: usize,
    fees: &MarketFees,
) -> Result<Vec<OutcomeToken>, CpmmError> {
    let bought = buy_amount(pool, bet_amount, outcome_index, fees)?;
    let effective = fees.get_after_fees(bet_amount).as_outcome_token().max(OutcomeToken::zero());

    Ok(pool
        .iter()
        .enumerate()
        .map(|(j, r)| {
            let grown = *r + effective;
            if j == outcome_index { grown - bought } else { grown }
        })
        .collect())
}

/// Relative price impact of a bet: `(bet / bought - p_i) / p_i`.
///
/// A zero bet has no impact. A bet that buys nothing, or an outcome with
/// zero marginal price, reports `f64::MAX` so comparisons against a cap
/// stay well-defined.
pub fn price_impact(
    pool: &[OutcomeToken],
    bet_amount: CollateralToken,
    outcome_index: usize,
    fees: &MarketFees,
) -> Result<f64, CpmmError> {
    check_index(pool, outcome_index)?;
    if bet_amount <= 0.0 {
        return Ok(0.0);
    }

    let expected_price = marginal_probabilities(pool)[outcome_index].value();
    let bought = buy_amount(pool, bet_amount, outcome_index, fees)?;
    if bought <= 0.0 || expected_price <= 0.0 {
        return Ok(f64::MAX);
    }

    let actual_price = bet_amount.value() / bought.value();
    Ok((actual_price - expected_price) / expected_price)
}

/// Bisection for the bet that moves `p_yes` of a binary market to
/// `target_p_yes`.
///
/// The search interval is `[0, 100 * (yes + no)]`. It stops once the
/// post-trade probability is within `params.tolerance` of the target or
/// after `params.max_iters` halvings.
pub fn target_probability_bet_amount(
    yes: OutcomeToken,
    no: OutcomeToken,
    target_p_yes: Probability,
    fees: &MarketFees,
    params: &SearchParams,
) -> Result<MarketMovingBet, CpmmError> {
    let pool = [yes, no];
    let current = marginal_probabilities(&pool)[0].value();
    let target = target_p_yes.value();
    let direction = target > current;
    let outcome_index = usize::from(!direction);

    if (target - current).abs() < params.tolerance {
        return Ok(MarketMovingBet {
            direction,
            size: CollateralToken::zero(),
        });
    }

    let mut lo = CollateralToken::zero();
    let mut hi = (yes + no).as_token() * 100.0;
    let mut bet = (lo + hi) / 2.0;

    for _ in 0..params.max_iters {
        bet = (lo + hi) / 2.0;
        let new_pool = pool_after_buy(&pool, bet, outcome_index, fees)?;
        let new_p_yes = marginal_probabilities(&new_pool)[0].value();

        if (target - new_p_yes).abs() < params.tolerance {
            break;
        }
        // Buying YES raises p_yes; buying NO lowers it.
        let overshot = if direction {
            new_p_yes > target
        } else {
            new_p_yes < target
        };
        if overshot {
            hi = bet;
        } else {
            lo = bet;
        }
    }

    Ok(MarketMovingBet {
        direction,
        size: bet,
    })
}

/// Collateral returned for selling `shares` outcome tokens back to a
/// binary pool holding `holdings` of that outcome and `other_holdings` of
/// the other one.
///
/// Solves `(o - R)(h + s - R) = h * o` for the smaller root `R`, the
/// collateral removed from the pool before fees, then nets out the fees.
/// The result is shrunk by one part per million to avoid rounding above
/// what the contract would pay.
pub fn sell_amount_in_collateral(
    shares: OutcomeToken,
    holdings: OutcomeToken,
    other_holdings: OutcomeToken,
    fees: &MarketFees,
) -> Result<CollateralToken, CpmmError> {
    let (s, h, o) = (shares.value(), holdings.value(), other_holdings.value());
    if s <= 0.0 || h <= 0.0 || o <= 0.0 {
        return Err(CpmmError::NonPositiveShares);
    }

    let sum = o + h + s;
    let discriminant = (sum * sum - 4.0 * o * s).max(0.0);
    // Conjugate form of (sum - sqrt(disc)) / 2, free of cancellation.
    let removed = 2.0 * o * s / (sum + discriminant.sqrt());

    let received = removed * (1.0 - fees.bet_proportion()) - fees.absolute();
    Ok(CollateralToken::new(received.max(0.0) * 0.999_999))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ot(v: f64) -> OutcomeToken {
        OutcomeToken::new(v)
    }

    #[test]
    fn test_gnosis_cpmm_example() {
        // 10/10 pool, 10 collateral on YES buys 15 tokens.
        let pool = [ot(10.0), ot(10.0)];
        let bought = buy_amount(&pool, CollateralToken::new(10.0), 0, &MarketFees::zero()).unwrap();
        assert!((bought.value() - 15.0).abs() < 1e-12);

        let impact = price_impact(&pool, CollateralToken::new(10.0), 0, &MarketFees::zero()).unwrap();
        assert!((impact - 1.0 / 3.0).abs() < 1e-12, "impact {impact}");
    }

    #[test]
    fn test_gnosis_cpmm_follow_up_on_no() {
        let pool = [ot(5.0), ot(20.0)];
        let bought = buy_amount(&pool, CollateralToken::new(10.0), 1, &MarketFees::zero()).unwrap();
        assert!((bought.value() - (30.0 - 100.0 / 15.0)).abs() < 1e-9);

        let closed = binary_buy_amount(ot(5.0), ot(20.0), CollateralToken::new(10.0), false, &MarketFees::zero());
        assert!((closed - bought).abs().value() < 1e-9);
    }

    #[test]
    fn test_binary_closed_form_agrees_with_product_fold() {
        let fees = MarketFees::new(0.02, 0.1).unwrap();
        let pool = [ot(12.0), ot(7.0)];
        let bet = CollateralToken::new(3.0);
        let e = fees.get_after_fees(bet).value();
        for (index, (target, other)) in [(0, (12.0, 7.0)), (1, (7.0, 12.0))] {
            let folded = target + e - target * other / (other + e);
            let bought = buy_amount(&pool, bet, index, &fees).unwrap();
            assert!((bought.value() - folded).abs() < 1e-12, "index {index}");
        }
    }

    #[test]
    fn test_invariant_preserved_categorical() {
        let pool = [ot(7.0), ot(11.0), ot(3.5)];
        let fees = MarketFees::new(0.02, 0.0).unwrap();
        let before: f64 = pool.iter().map(|r| r.value()).product();
        let after: f64 = pool_after_buy(&pool, CollateralToken::new(4.0), 2, &fees)
            .unwrap()
            .iter()
            .map(|r| r.value())
            .product();
        assert!((before - after).abs() / before < 1e-9);
    }

    #[test]
    fn test_marginal_probabilities() {
        let probs = marginal_probabilities(&[ot(5.0), ot(20.0)]);
        assert!((probs[0].value() - 0.8).abs() < 1e-12);
        assert!((probs[1].value() - 0.2).abs() < 1e-12);

        let three = marginal_probabilities(&[ot(1.0), ot(2.0), ot(4.0)]);
        let sum: f64 = three.iter().map(|p| p.value()).sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!(three[0] > three[1] && three[1] > three[2]);
    }

    #[test]
    fn test_zero_pool_gives_zero_probabilities() {
        let probs = marginal_probabilities(&[ot(0.0), ot(0.0)]);
        assert!(probs.iter().all(|p| p.value() == 0.0));
    }

    #[test]
    fn test_bet_eaten_by_fees_buys_nothing() {
        let fees = MarketFees::new(0.0, 1.0).unwrap();
        let bought = buy_amount(&[ot(10.0), ot(10.0)], CollateralToken::new(0.5), 0, &fees).unwrap();
        assert_eq!(bought, 0.0);
    }

    #[test]
    fn test_out_of_range_index() {
        let err = buy_amount(&[ot(1.0), ot(1.0)], CollateralToken::new(1.0), 2, &MarketFees::zero());
        assert_eq!(err, Err(CpmmError::OutcomeOutOfRange { index: 2, len: 2 }));
        let empty = buy_amount(&[], CollateralToken::new(1.0), 0, &MarketFees::zero());
        assert_eq!(empty, Err(CpmmError::EmptyPool));
    }

    #[test]
    fn test_target_probability_moves_market() {
        let fees = MarketFees::new(0.02, 0.0).unwrap();
        let target = Probability::new(0.7).unwrap();
        let bet = target_probability_bet_amount(ot(10.0), ot(10.0), target, &fees, &SearchParams::default()).unwrap();
        assert!(bet.direction);
        assert!(bet.size > 0.0);

        let new_pool = pool_after_buy(&[ot(10.0), ot(10.0)], bet.size, 0, &fees).unwrap();
        let p_yes = marginal_probabilities(&new_pool)[0].value();
        assert!((p_yes - 0.7).abs() < 0.01, "p_yes {p_yes}");
    }

    #[test]
    fn test_target_probability_downwards() {
        let target = Probability::new(0.3).unwrap();
        let bet = target_probability_bet_amount(ot(10.0), ot(10.0), target, &MarketFees::zero(), &SearchParams::default())
            .unwrap();
        assert!(!bet.direction);
        let new_pool = pool_after_buy(&[ot(10.0), ot(10.0)], bet.size, 1, &MarketFees::zero()).unwrap();
        let p_yes = marginal_probabilities(&new_pool)[0].value();
        assert!((p_yes - 0.3).abs() < 1e-4, "p_yes {p_yes}");
    }

    #[test]
    fn test_target_already_reached() {
        let target = Probability::new(0.5).unwrap();
        let bet = target_probability_bet_amount(ot(10.0), ot(10.0), target, &MarketFees::zero(), &SearchParams::default())
            .unwrap();
        assert_eq!(bet.size, 0.0);
    }

    #[test]
    fn test_sell_reverses_buy() {
        // Buying 10 on YES from 10/10 leaves (5, 20) and 15 YES tokens.
        let received = sell_amount_in_collateral(ot(15.0), ot(5.0), ot(20.0), &MarketFees::zero()).unwrap();
        assert!((received.value() - 10.0).abs() < 1e-4);
        assert!(received.value() < 10.0);
    }

    #[test]
    fn test_sell_rejects_non_positive() {
        assert_eq!(
            sell_amount_in_collateral(ot(0.0), ot(5.0), ot(20.0), &MarketFees::zero()),
            Err(CpmmError::NonPositiveShares)
        );
    }
}
