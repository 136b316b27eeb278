//! Core domain types and logic.

pub mod series;
pub mod rolling;
pub mod drawdown;
pub mod feature;
pub mod rai;
pub mod allocation;
pub mod dca;
pub mod metrics;
pub mod error;
