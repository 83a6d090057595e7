//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` and the file
//! I/O the backtest needs.
//!
//! Adapter categories:
//! - `market_snapshot`: frozen in-memory CPMM market (`AgentMarket`)
//! - `dataset`: JSON dataset loading and atomic report writes

pub mod dataset;
pub mod market_snapshot;

pub use market_snapshot::MarketSnapshot;
