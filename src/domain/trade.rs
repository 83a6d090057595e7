//! Trade, position and answer models.
//!
//! These are built fresh for every strategy call from upstream market and
//! belief snapshots; nothing here is shared mutable state.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::error::ValidationError;
use super::probability::Probability;
use super::value::Usd;

/// Market identifier used at the ports boundary.
pub type MarketId = String;

/// Outcome label of a yes/no market's positive side.
pub const YES_OUTCOME: &str = "Yes";
/// Outcome label of a yes/no market's negative side.
pub const NO_OUTCOME: &str = "No";

/// Outcome label. Comparison and hashing ignore ASCII case, since
/// market sources disagree on capitalisation ("Yes" vs "yes").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutcomeStr(String);

impl OutcomeStr {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn yes() -> Self {
        Self::new(YES_OUTCOME)
    }

    pub fn no() -> Self {
        Self::new(NO_OUTCOME)
    }
}

impl PartialEq for OutcomeStr {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for OutcomeStr {}

impl Hash for OutcomeStr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for byte in self.0.bytes() {
            state.write_u8(byte.to_ascii_lowercase());
        }
    }
}

impl fmt::Display for OutcomeStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OutcomeStr {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeType {
    Buy,
    Sell,
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// A single trade produced by a strategy. `amount` is never negative;
/// `trade_type` carries the direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_type: TradeType,
    pub outcome: OutcomeStr,
    pub amount: Usd,
}

impl Trade {
    pub fn buy(outcome: OutcomeStr, amount: Usd) -> Self {
        Self {
            trade_type: TradeType::Buy,
            outcome,
            amount,
        }
    }

    pub fn sell(outcome: OutcomeStr, amount: Usd) -> Self {
        Self {
            trade_type: TradeType::Sell,
            outcome,
            amount,
        }
    }
}

impl fmt::Display for Trade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} USD of {}", self.trade_type, self.amount, self.outcome)
    }
}

/// Holdings in one market, valued per outcome in USD.
///
/// Used both for what the agent holds now and for the target a strategy
/// wants to hold after trading.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub market_id: MarketId,
    pub amounts_current: HashMap<OutcomeStr, Usd>,
}

/// Position the agent already holds before the strategy runs.
pub type ExistingPosition = Position;

impl Position {
    pub fn new(market_id: impl Into<MarketId>) -> Self {
        Self {
            market_id: market_id.into(),
            amounts_current: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_amount(mut self, outcome: OutcomeStr, amount: Usd) -> Self {
        self.amounts_current.insert(outcome, amount);
        self
    }

    /// Held value of `outcome`, zero when absent.
    pub fn amount(&self, outcome: &OutcomeStr) -> Usd {
        self.amounts_current.get(outcome).copied().unwrap_or_default()
    }

    pub fn total(&self) -> Usd {
        self.amounts_current.values().sum()
    }
}

/// An agent's belief: a probability per outcome plus a confidence that
/// dampens the edge used for sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalProbabilisticAnswer {
    pub probabilities: HashMap<OutcomeStr, Probability>,
    pub confidence: Probability,
    #[serde(default)]
    pub reasoning: Option<String>,
}

impl CategoricalProbabilisticAnswer {
    pub fn new(probabilities: HashMap<OutcomeStr, Probability>, confidence: f64) -> Result<Self, ValidationError> {
        Ok(Self {
            probabilities,
            confidence: Probability::new(confidence)?,
            reasoning: None,
        })
    }

    /// Yes/no belief.
    pub fn binary(p_yes: f64, confidence: f64) -> Result<Self, ValidationError> {
        let p_yes = Probability::new(p_yes)?;
        let probabilities = HashMap::from([(OutcomeStr::yes(), p_yes), (OutcomeStr::no(), p_yes.complement())]);
        Self::new(probabilities, confidence)
    }

    pub fn probability_for(&self, outcome: &OutcomeStr) -> Option<Probability> {
        self.probabilities.get(outcome).copied()
    }

    /// Estimated probability of YES, if the answer covers it.
    pub fn p_yes(&self) -> Option<Probability> {
        self.probability_for(&OutcomeStr::yes())
    }

    /// Outcome with the highest probability. Ties resolve to the
    /// alphabetically first label so results are deterministic.
    pub fn most_likely_outcome(&self) -> Option<&OutcomeStr> {
        self.probabilities
            .iter()
            .max_by(|(a_label, a), (b_label, b)| {
                a.value()
                    .total_cmp(&b.value())
                    .then_with(|| b_label.as_str().to_lowercase().cmp(&a_label.as_str().to_lowercase()))
            })
            .map(|(label, _)| label)
    }
}
