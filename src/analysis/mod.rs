//! Analysis modules.
//!
//! Aggregation of the reward table into series, and the drop-rate
//! statistics computed on top of them.

pub mod aggregator;
pub mod stats;

pub use aggregator::*;
pub use stats::*;
