//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the usecases layer requires from
//! the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `AgentMarket`: market reserves, prices, fees and currency conversion

pub mod market;

pub use market::AgentMarket;
