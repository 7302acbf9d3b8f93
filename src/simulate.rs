//! Synthetic mint stream for running without a rewards API.
//!
//! Rewards are drawn with the designed probabilities (or custom weights)
//! from a seeded generator, so a seed always reproduces the same stream.
//! Consecutive mints are 1 to 60 seconds apart, which keeps every sort key
//! distinct in its leading characters.

use crate::api::RewardsApi;
use crate::error::ApiError;
use crate::models::{
    CountsPage, Grade, GradeCounts, RewardRecord, GRADE_COUNT, PROBABILITIES, TOTAL_TRIALS_KEY,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

const ITEM_NAMES: [&[&str]; GRADE_COUNT] = [
    &["Wooden Sword", "Leather Cap", "Torn Map"],
    &["Iron Shield", "Scout Boots", "Healing Herb"],
    &["Silver Bow", "Mage Robe"],
    &["Shadow Cloak", "Storm Blade"],
    &["Dragon Heart"],
];

struct SimState {
    rng: StdRng,
    sampler: WeightedIndex<f64>,
    clock: DateTime<Utc>,
    records: Vec<RewardRecord>,
}

/// In-memory rewards API fed by [`SimulatedApi::mint`].
pub struct SimulatedApi {
    state: Mutex<SimState>,
}

impl SimulatedApi {
    /// Stream drawn with the designed probabilities, first mint after `start`.
    pub fn new(seed: u64, start: DateTime<Utc>) -> Result<Self> {
        Self::with_weights(seed, start, PROBABILITIES)
    }

    /// Stream drawn with custom per-grade weights.
    pub fn with_weights(
        seed: u64,
        start: DateTime<Utc>,
        weights: [f64; GRADE_COUNT],
    ) -> Result<Self> {
        let sampler = WeightedIndex::new(weights).context("Invalid simulated grade weights")?;

        Ok(Self {
            state: Mutex::new(SimState {
                rng: StdRng::seed_from_u64(seed),
                sampler,
                clock: start,
                records: Vec::new(),
            }),
        })
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mint `n` more rewards. Returns the total minted so far.
    pub fn mint(&self, n: usize) -> usize {
        let mut state = self.state();
        for _ in 0..n {
            let SimState {
                rng,
                sampler,
                clock,
                records,
            } = &mut *state;

            *clock += Duration::seconds(rng.gen_range(1..=60));
            let grade = Grade::ALL[sampler.sample(rng)];
            let names = ITEM_NAMES[grade.index()];
            let item_name = names[rng.gen_range(0..names.len())].to_string();

            records.push(RewardRecord {
                skey: clock.to_rfc3339_opts(SecondsFormat::Micros, true),
                created_at: *clock,
                grade,
                item_name,
                token_data_id: format!("0x{:032x}{:032x}", rng.gen::<u128>(), rng.gen::<u128>()),
                txn_hash: format!("0x{:032x}{:032x}", rng.gen::<u128>(), rng.gen::<u128>()),
                total_minted: records.len() as u64 + 1,
            });
        }
        debug!("Simulator minted {} rewards", n);
        state.records.len()
    }

    /// Counts of every reward minted so far.
    pub fn tally(&self) -> GradeCounts {
        self.state().records.iter().map(|r| r.grade).collect()
    }
}

impl RewardsApi for SimulatedApi {
    async fn fetch_rewards(
        &self,
        since: &str,
        limit: usize,
    ) -> Result<Vec<RewardRecord>, ApiError> {
        Ok(self
            .state()
            .records
            .iter()
            .filter(|r| r.skey.as_str() > since)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn fetch_counts(&self, since: &str) -> Result<CountsPage, ApiError> {
        let state = self.state();
        let newer: Vec<&RewardRecord> = state
            .records
            .iter()
            .filter(|r| r.skey.as_str() > since)
            .collect();

        let Some(latest) = newer.last() else {
            return Ok(CountsPage::default());
        };

        let counts: GradeCounts = newer.iter().map(|r| r.grade).collect();
        let mut map: HashMap<String, u64> = Grade::ALL
            .iter()
            .map(|g| (g.to_string(), counts.get(*g)))
            .collect();
        map.insert(TOTAL_TRIALS_KEY.to_string(), counts.total_trials);

        Ok(CountsPage {
            counts: Some(map),
            latest_update: Some(latest.skey.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 20, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_same_seed_same_stream() {
        let a = SimulatedApi::new(42, start()).unwrap();
        let b = SimulatedApi::new(42, start()).unwrap();
        a.mint(50);
        b.mint(50);

        let ra = tokio_test::block_on(a.fetch_rewards("", 100)).unwrap();
        let rb = tokio_test::block_on(b.fetch_rewards("", 100)).unwrap();
        assert_eq!(ra, rb);
    }

    #[test]
    fn test_stream_is_ordered_and_spaced() {
        let api = SimulatedApi::new(1, start()).unwrap();
        api.mint(100);
        let records = tokio_test::block_on(api.fetch_rewards("", 1000)).unwrap();

        assert_eq!(records.len(), 100);
        for pair in records.windows(2) {
            assert!(pair[0].skey < pair[1].skey);
            let gap = pair[1].created_at - pair[0].created_at;
            assert!(gap >= Duration::seconds(1) && gap <= Duration::seconds(60));
        }
        assert_eq!(records[99].total_minted, 100);
    }

    #[test]
    fn test_fetch_respects_cursor_and_limit() {
        let api = SimulatedApi::new(3, start()).unwrap();
        api.mint(10);
        let all = tokio_test::block_on(api.fetch_rewards("", 100)).unwrap();

        let after = tokio_test::block_on(api.fetch_rewards(&all[4].skey, 3)).unwrap();
        assert_eq!(after.len(), 3);
        assert_eq!(after[0], all[5]);
    }

    #[test]
    fn test_counts_page() {
        let api = SimulatedApi::new(5, start()).unwrap();
        assert_eq!(
            tokio_test::block_on(api.fetch_counts("")).unwrap(),
            CountsPage::default()
        );

        api.mint(40);
        let page = tokio_test::block_on(api.fetch_counts("")).unwrap();
        let counts = GradeCounts::from_wire(page.counts.as_ref().unwrap());
        assert_eq!(counts, api.tally());
        assert_eq!(counts.total_trials, 40);
    }

    #[test]
    fn test_custom_weights() {
        let api = SimulatedApi::with_weights(9, start(), [0.0, 0.0, 0.0, 0.0, 1.0]).unwrap();
        api.mint(20);
        assert_eq!(api.tally().get(Grade::Legendary), 20);

        assert!(SimulatedApi::with_weights(9, start(), [0.0; GRADE_COUNT]).is_err());
    }
}
