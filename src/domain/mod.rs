//! Domain layer - Core betting math and models.
//!
//! Pure, synchronous and side-effect free: CPMM pricing, Kelly sizing and
//! the trade/position models the strategies produce. Nothing in here logs
//! or performs I/O (hexagonal architecture inner ring).

pub mod bet_utils;
pub mod cpmm;
pub mod error;
pub mod fees;
pub mod kelly;
pub mod probability;
pub mod trade;
pub mod value;

// Re-export core types for convenience
pub use cpmm::{MarketMovingBet, SearchParams};
pub use error::{CpmmError, StrategyError, ValidationError};
pub use fees::MarketFees;
pub use kelly::{BinaryKellyBet, CategoricalKellyBet, CategoricalPolicy};
pub use probability::Probability;
pub use trade::{
    CategoricalProbabilisticAnswer, ExistingPosition, MarketId, OutcomeStr, Position, Trade, TradeType,
};
pub use value::{CollateralToken, CollateralWei, OutcomeToken, OutcomeWei, Usd, Wei, XDai};
