//! Use Cases Layer - Application Business Logic
//!
//! Turns beliefs and market snapshots into trades through the domain
//! math, and replays strategies over history. Each use case is a
//! self-contained business operation.
//!
//! Use cases:
//! - `BettingStrategy`: shared contract, rebalancing and dispatch
//! - `MaxAccuracy` / `MaxExpectedValue`: fixed-amount strategies
//! - `Kelly` / `MaxAccuracyWithKellyScaledBets`: Kelly-sized strategies
//! - `Backtester`: historical replay and reporting

pub mod backtest;
pub mod betting_strategy;
pub mod kelly;
pub mod max_accuracy;
