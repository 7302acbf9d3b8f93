//! Dashboard rendering.

pub mod generator;
pub mod links;

pub use generator::*;
pub use links::ExplorerLinks;
