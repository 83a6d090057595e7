//! Unit-tagged monetary values.
//!
//! `Value<U>` carries an `f64` tagged with a zero-sized unit marker, so
//! collateral, outcome tokens and USD can never be mixed by accident:
//! arithmetic is only implemented between identical units. Moving between
//! units always goes through a named conversion method.
//!
//! ```compile_fail
//! use cpmm_kelly_engine::domain::value::{CollateralToken, Usd};
//! let _ = CollateralToken::new(1.0) + Usd::new(1.0);
//! ```
//!
//! `Wei<U>` is the raw integer representation (18 decimals) used by
//! on-chain amounts. Scaling goes through `rust_decimal` so no precision
//! is lost for realistic amounts.

use std::cmp::Ordering;
use std::fmt;
use std::iter::Sum;
use std::marker::PhantomData;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Number of decimals used by wei-denominated amounts.
pub const WEI_DECIMALS: u32 = 18;

/// Marker trait for value units.
pub trait Unit: 'static {
    /// Short label used in `Display`.
    const SYMBOL: &'static str;
}

/// Collateral of the market (xDai, USDC, sDai, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Collateral;

/// Conditional outcome tokens of a single outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Outcome;

/// US dollars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Dollar;

/// Native xDai on Gnosis chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NativeXDai;

impl Unit for Collateral {
    const SYMBOL: &'static str = "collateral";
}

impl Unit for Outcome {
    const SYMBOL: &'static str = "outcome";
}

impl Unit for Dollar {
    const SYMBOL: &'static str = "USD";
}

impl Unit for NativeXDai {
    const SYMBOL: &'static str = "xDai";
}

/// A quantity tagged with unit `U`.
pub struct Value<U: Unit> {
    value: f64,
    unit: PhantomData<U>,
}

pub type CollateralToken = Value<Collateral>;
pub type OutcomeToken = Value<Outcome>;
pub type Usd = Value<Dollar>;
pub type XDai = Value<NativeXDai>;

impl<U: Unit> Value<U> {
    pub const fn new(value: f64) -> Self {
        Self {
            value,
            unit: PhantomData,
        }
    }

    /// Additive identity.
    pub const fn zero() -> Self {
        Self::new(0.0)
    }

    pub const fn value(&self) -> f64 {
        self.value
    }

    #[must_use]
    pub fn abs(self) -> Self {
        Self::new(self.value.abs())
    }

    #[must_use]
    pub fn max(self, other: Self) -> Self {
        Self::new(self.value.max(other.value))
    }

    #[must_use]
    pub fn min(self, other: Self) -> Self {
        Self::new(self.value.min(other.value))
    }

    /// Clamp into `[lo, hi]`. `lo` wins if the bounds are inverted.
    #[must_use]
    pub fn clamp_between(self, lo: Self, hi: Self) -> Self {
        self.min(hi).max(lo)
    }

    pub fn is_finite(&self) -> bool {
        self.value.is_finite()
    }

    /// Exact conversion to the integer wei representation.
    ///
    /// Returns `None` for non-finite values or amounts too large for
    /// 18-decimal fixed point.
    pub fn as_wei(&self) -> Option<Wei<U>> {
        let scaled = Decimal::from_f64(self.value)?.checked_mul(Decimal::from(10u64.pow(WEI_DECIMALS)))?;
        scaled.round().to_i128().map(Wei::new)
    }

    /// Decimal view for reporting.
    pub fn to_decimal(&self) -> Option<Decimal> {
        Decimal::from_f64(self.value)
    }
}

impl OutcomeToken {
    /// One outcome token redeems for one unit of collateral.
    pub const fn from_token(token: CollateralToken) -> Self {
        Self::new(token.value)
    }

    pub const fn as_token(&self) -> CollateralToken {
        CollateralToken::new(self.value)
    }
}

impl CollateralToken {
    pub const fn as_outcome_token(&self) -> OutcomeToken {
        OutcomeToken::new(self.value)
    }
}

// ── Trait impls written by hand so unit markers need no bounds ──

impl<U: Unit> Clone for Value<U> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<U: Unit> Copy for Value<U> {}

impl<U: Unit> Default for Value<U> {
    fn default() -> Self {
        Self::zero()
    }
}

impl<U: Unit> fmt::Debug for Value<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", U::SYMBOL, self.value)
    }
}

impl<U: Unit> fmt::Display for Value<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<U: Unit> PartialEq for Value<U> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<U: Unit> PartialOrd for Value<U> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.value.partial_cmp(&other.value)
    }
}

/// Lets `value == 0.0` style checks work in folds and guards.
impl<U: Unit> PartialEq<f64> for Value<U> {
    fn eq(&self, other: &f64) -> bool {
        self.value == *other
    }
}

impl<U: Unit> PartialOrd<f64> for Value<U> {
    fn partial_cmp(&self, other: &f64) -> Option<Ordering> {
        self.value.partial_cmp(other)
    }
}

impl<U: Unit> Add for Value<U> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.value + rhs.value)
    }
}

impl<U: Unit> Sub for Value<U> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.value - rhs.value)
    }
}

impl<U: Unit> AddAssign for Value<U> {
    fn add_assign(&mut self, rhs: Self) {
        self.value += rhs.value;
    }
}

impl<U: Unit> SubAssign for Value<U> {
    fn sub_assign(&mut self, rhs: Self) {
        self.value -= rhs.value;
    }
}

impl<U: Unit> Neg for Value<U> {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.value)
    }
}

impl<U: Unit> Mul<f64> for Value<U> {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::new(self.value * rhs)
    }
}

impl<U: Unit> Div<f64> for Value<U> {
    type Output = Self;

    fn div(self, rhs: f64) -> Self {
        Self::new(self.value / rhs)
    }
}

/// Same-unit division yields a plain ratio.
impl<U: Unit> Div for Value<U> {
    type Output = f64;

    fn div(self, rhs: Self) -> f64 {
        self.value / rhs.value
    }
}

impl<U: Unit> Sum for Value<U> {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), Add::add)
    }
}

impl<'a, U: Unit> Sum<&'a Self> for Value<U> {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl<U: Unit> Serialize for Value<U> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.value)
    }
}

impl<'de, U: Unit> Deserialize<'de> for Value<U> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        f64::deserialize(deserializer).map(Self::new)
    }
}

// ────────────────────────────────────────────
// Wei - raw integer amounts
// ────────────────────────────────────────────

/// Raw integer amount of unit `U` with [`WEI_DECIMALS`] decimals.
pub struct Wei<U: Unit> {
    raw: i128,
    unit: PhantomData<U>,
}

pub type CollateralWei = Wei<Collateral>;
pub type OutcomeWei = Wei<Outcome>;

impl<U: Unit> Wei<U> {
    pub const fn new(raw: i128) -> Self {
        Self {
            raw,
            unit: PhantomData,
        }
    }

    pub const fn raw(&self) -> i128 {
        self.raw
    }

    /// Scale back to a token amount.
    pub fn as_token(&self) -> Value<U> {
        let exact = Decimal::try_from_i128_with_scale(self.raw, WEI_DECIMALS)
            .ok()
            .and_then(|d| d.to_f64());
        // Out of Decimal's 96-bit range: fall back to float scaling.
        Value::new(exact.unwrap_or_else(|| self.raw as f64 / 1e18))
    }
}

impl<U: Unit> Clone for Wei<U> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<U: Unit> Copy for Wei<U> {}

impl<U: Unit> fmt::Debug for Wei<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Wei({})", U::SYMBOL, self.raw)
    }
}

impl<U: Unit> PartialEq for Wei<U> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<U: Unit> Eq for Wei<U> {}

impl<U: Unit> PartialOrd for Wei<U> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<U: Unit> Ord for Wei<U> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<U: Unit> Add for Wei<U> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.raw + rhs.raw)
    }
}

impl<U: Unit> Sub for Wei<U> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.raw - rhs.raw)
    }
}

impl<U: Unit> Sum for Wei<U> {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::new(0), Add::add)
    }
}
