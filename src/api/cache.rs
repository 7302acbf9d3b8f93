//! Time-to-live cache for API responses.
//!
//! Repeating the same request within the TTL returns the stored response
//! instead of hitting the API again. Only successful responses are stored.
//! Cursors only move forward, so stale keys are never read again; expired
//! entries are swept on every insert.

use crate::api::RewardsApi;
use crate::error::ApiError;
use crate::models::{CountsPage, RewardRecord};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

/// Map whose entries expire `ttl` after insertion.
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: Mutex<HashMap<K, (V, Instant)>>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Fresh value for `key`. An expired entry is evicted.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(key) {
            Some((value, stored_at)) if stored_at.elapsed() < self.ttl => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store `value`, dropping every expired entry first.
    pub fn insert(&self, key: K, value: V) {
        if self.ttl.is_zero() {
            return;
        }
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, (_, stored_at)| stored_at.elapsed() < self.ttl);
        entries.insert(key, (value, Instant::now()));
    }

    /// Number of stored entries, fresh or not.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// [`RewardsApi`] decorator that reuses responses for a fixed TTL.
pub struct CachedApi<A> {
    inner: A,
    rewards: TtlCache<(String, usize), Vec<RewardRecord>>,
    counts: TtlCache<String, CountsPage>,
}

impl<A: RewardsApi> CachedApi<A> {
    pub fn new(inner: A, ttl: Duration) -> Self {
        Self {
            inner,
            rewards: TtlCache::new(ttl),
            counts: TtlCache::new(ttl),
        }
    }
}

impl<A: RewardsApi> RewardsApi for CachedApi<A> {
    async fn fetch_rewards(
        &self,
        since: &str,
        limit: usize,
    ) -> Result<Vec<RewardRecord>, ApiError> {
        let key = (since.to_string(), limit);
        if let Some(hit) = self.rewards.get(&key) {
            debug!("Reusing cached rewards page for {}", since);
            return Ok(hit);
        }

        let page = self.inner.fetch_rewards(since, limit).await?;
        self.rewards.insert(key, page.clone());
        debug!("{} rewards pages cached", self.rewards.len());
        Ok(page)
    }

    async fn fetch_counts(&self, since: &str) -> Result<CountsPage, ApiError> {
        let key = since.to_string();
        if let Some(hit) = self.counts.get(&key) {
            debug!("Reusing cached counts for {}", since);
            return Ok(hit);
        }

        let page = self.inner.fetch_counts(since).await?;
        self.counts.insert(key, page.clone());
        Ok(page)
    }
}
