//! Access to the rewards API.
//!
//! [`RewardsApi`] is the seam between polling and transport: the HTTP
//! client, the TTL cache decorator and the offline simulator all
//! implement it.

pub mod cache;
pub mod client;

pub use cache::CachedApi;
pub use client::HttpRewardsApi;

use crate::error::ApiError;
use crate::models::{CountsPage, RewardRecord};

/// Source of minting records and per-grade counts.
pub trait RewardsApi {
    /// Up to `limit` rewards whose sort key is greater than `since`,
    /// ascending by sort key.
    async fn fetch_rewards(&self, since: &str, limit: usize)
        -> Result<Vec<RewardRecord>, ApiError>;

    /// Per-grade counts of the rewards minted after `since`.
    async fn fetch_counts(&self, since: &str) -> Result<CountsPage, ApiError>;
}
