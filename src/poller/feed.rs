//! Bounded table of the most recent rewards.

use crate::api::RewardsApi;
use crate::config::PollConfig;
use crate::models::RewardRecord;
use crate::poller::{RefreshSummary, Watermark};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// The latest rewards, deduplicated by transaction hash and ordered by
/// sort key.
pub struct RewardFeed {
    records: Vec<RewardRecord>,
    watermark: Watermark,
    fetch_limit: usize,
    page_size: usize,
    max_pages: usize,
}

impl RewardFeed {
    pub fn new(
        watermark: Watermark,
        fetch_limit: usize,
        page_size: usize,
        max_pages: usize,
    ) -> Self {
        Self {
            records: Vec::new(),
            watermark,
            fetch_limit,
            page_size,
            max_pages,
        }
    }

    /// Feed starting `lookback_days` before `now`.
    pub fn from_config(config: &PollConfig, now: DateTime<Utc>) -> Self {
        Self::new(
            Watermark::lookback(now, config.lookback_days),
            config.fetch_limit,
            config.page_size,
            config.max_pages_per_refresh,
        )
    }

    pub fn records(&self) -> &[RewardRecord] {
        &self.records
    }

    pub fn cursor(&self) -> &str {
        self.watermark.cursor()
    }

    /// Page forward from the cursor until the API returns an empty page.
    pub async fn refresh<A: RewardsApi>(&mut self, api: &A) -> RefreshSummary {
        let mut summary = RefreshSummary::default();

        loop {
            if summary.pages >= self.max_pages {
                warn!(
                    "Reward refresh hit the {} page cap at cursor {}",
                    self.max_pages,
                    self.cursor()
                );
                summary.stalled = true;
                break;
            }

            let page = match api.fetch_rewards(self.cursor(), self.page_size).await {
                Ok(page) => page,
                Err(e) => {
                    warn!("Reward refresh stopped at cursor {}: {}", self.cursor(), e);
                    summary.error = Some(e);
                    break;
                }
            };

            if page.is_empty() {
                break;
            }

            summary.pages += 1;
            summary.received += page.len() as u64;
            let added = self.merge_page(page);
            debug!("Merged rewards page: {} new, {} kept", added, self.records.len());

            let advanced = match self.records.last() {
                Some(newest) => self.watermark.advance(&newest.skey),
                None => false,
            };
            if !advanced {
                warn!("Reward cursor did not move past {}; stopping", self.cursor());
                summary.stalled = true;
                break;
            }
        }

        if summary.received > 0 {
            info!(
                "Fetched {} rewards in {} pages, next cursor {}",
                summary.received,
                summary.pages,
                self.cursor()
            );
        }
        summary
    }

    /// Append a page, drop earlier copies of repeated transactions, restore
    /// sort-key order and keep only the newest `fetch_limit` rows.
    ///
    /// Returns how many transactions were not in the table before.
    pub fn merge_page(&mut self, page: Vec<RewardRecord>) -> usize {
        let added = {
            let known: HashSet<&str> =
                self.records.iter().map(|r| r.txn_hash.as_str()).collect();
            page.iter()
                .map(|r| r.txn_hash.as_str())
                .filter(|hash| !known.contains(hash))
                .collect::<HashSet<_>>()
                .len()
        };

        self.records.extend(page);
        dedupe_keep_last(&mut self.records);
        self.records.sort_by(|a, b| a.skey.cmp(&b.skey));

        if self.records.len() > self.fetch_limit {
            let excess = self.records.len() - self.fetch_limit;
            self.records.drain(..excess);
        }

        added
    }
}

/// Keep the last occurrence of every transaction hash, in the order of
/// those last occurrences.
fn dedupe_keep_last(records: &mut Vec<RewardRecord>) {
    let mut seen = HashSet::new();
    let mut kept: Vec<RewardRecord> = records
        .drain(..)
        .rev()
        .filter(|r| seen.insert(r.txn_hash.clone()))
        .collect();
    kept.reverse();
    *records = kept;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::models::{CountsPage, Grade};
    use crate::simulate::SimulatedApi;
    use chrono::TimeZone;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn record(second: u32, hash: &str, grade: Grade) -> RewardRecord {
        let created_at = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, second).unwrap();
        RewardRecord {
            skey: format!("2024-03-15T10:00:{:02}.000000Z", second),
            created_at,
            grade,
            item_name: format!("item-{}", hash),
            token_data_id: format!("0xtoken{}", hash),
            txn_hash: hash.to_string(),
            total_minted: second as u64,
        }
    }

    /// Serves queued reward pages, then empty pages.
    struct ScriptedApi {
        pages: Mutex<VecDeque<Result<Vec<RewardRecord>, ApiError>>>,
        cursors: Mutex<Vec<String>>,
    }

    impl ScriptedApi {
        fn new(pages: Vec<Result<Vec<RewardRecord>, ApiError>>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                cursors: Mutex::new(Vec::new()),
            }
        }
    }

    impl RewardsApi for ScriptedApi {
        async fn fetch_rewards(
            &self,
            since: &str,
            _limit: usize,
        ) -> Result<Vec<RewardRecord>, ApiError> {
            self.cursors.lock().unwrap().push(since.to_string());
            self.pages.lock().unwrap().pop_front().unwrap_or(Ok(Vec::new()))
        }

        async fn fetch_counts(&self, _since: &str) -> Result<CountsPage, ApiError> {
            Ok(CountsPage::default())
        }
    }

    fn make_feed(fetch_limit: usize) -> RewardFeed {
        RewardFeed::new(
            Watermark::starting_at("2024-03-15T00:00:00Z"),
            fetch_limit,
            100,
            10,
        )
    }

    #[test]
    fn test_merge_dedupes_keeping_last() {
        let mut feed = make_feed(100);
        feed.merge_page(vec![record(1, "a", Grade::Common), record(2, "b", Grade::Rare)]);

        let mut replacement = record(2, "b", Grade::Rare);
        replacement.item_name = "updated".to_string();
        let added = feed.merge_page(vec![replacement, record(3, "c", Grade::Epic)]);

        assert_eq!(added, 1);
        let hashes: Vec<&str> = feed.records().iter().map(|r| r.txn_hash.as_str()).collect();
        assert_eq!(hashes, vec!["a", "b", "c"]);
        assert_eq!(feed.records()[1].item_name, "updated");
    }

    #[test]
    fn test_merge_trims_to_fetch_limit() {
        let mut feed = make_feed(3);
        let page: Vec<RewardRecord> = (0..5)
            .map(|i| record(i, &format!("h{}", i), Grade::Common))
            .collect();
        feed.merge_page(page);

        assert_eq!(feed.records().len(), 3);
        assert_eq!(feed.records()[0].txn_hash, "h2");
        assert_eq!(feed.records()[2].txn_hash, "h4");
    }

    #[test]
    fn test_merge_restores_order() {
        let mut feed = make_feed(10);
        feed.merge_page(vec![record(5, "late", Grade::Common), record(1, "early", Grade::Rare)]);
        assert_eq!(feed.records()[0].txn_hash, "early");
        assert_eq!(feed.records()[1].txn_hash, "late");
    }

    #[test]
    fn test_refresh_pages_until_empty() {
        let api = ScriptedApi::new(vec![
            Ok(vec![record(1, "a", Grade::Common), record(2, "b", Grade::Common)]),
            Ok(vec![record(3, "c", Grade::Legendary)]),
        ]);
        let mut feed = make_feed(100);

        let summary = tokio_test::block_on(feed.refresh(&api));

        assert!(summary.is_ok());
        assert!(!summary.stalled);
        assert_eq!(summary.pages, 2);
        assert_eq!(summary.received, 3);
        assert_eq!(feed.records().len(), 3);
        assert_eq!(feed.cursor(), "2024-03-15T10:00:03.00000@");

        let cursors = api.cursors.lock().unwrap();
        assert_eq!(
            *cursors,
            vec![
                "2024-03-15T00:00:00Z".to_string(),
                "2024-03-15T10:00:02.00000@".to_string(),
                "2024-03-15T10:00:03.00000@".to_string(),
            ]
        );
    }

    #[test]
    fn test_refresh_error_keeps_progress() {
        let api = ScriptedApi::new(vec![
            Ok(vec![record(1, "a", Grade::Common)]),
            Err(ApiError::Connect("http://localhost".to_string())),
        ]);
        let mut feed = make_feed(100);

        let summary = tokio_test::block_on(feed.refresh(&api));

        assert!(!summary.is_ok());
        assert_eq!(feed.records().len(), 1);
        assert_eq!(feed.cursor(), "2024-03-15T10:00:01.00000@");

        // The next poll resumes from the same cursor.
        let summary = tokio_test::block_on(feed.refresh(&api));
        assert!(summary.is_ok());
        assert_eq!(summary.pages, 0);
    }

    #[test]
    fn test_refresh_stops_when_cursor_is_ignored() {
        let same = || Ok(vec![record(1, "a", Grade::Common)]);
        let api = ScriptedApi::new(vec![same(), same(), same()]);
        let mut feed = make_feed(100);

        let summary = tokio_test::block_on(feed.refresh(&api));

        assert!(summary.stalled);
        assert_eq!(summary.pages, 2);
        assert_eq!(feed.records().len(), 1);
    }

    /// Serves raw JSON pages decoded the way the HTTP client decodes them.
    struct JsonApi {
        pages: Mutex<VecDeque<Vec<serde_json::Value>>>,
    }

    impl RewardsApi for JsonApi {
        async fn fetch_rewards(
            &self,
            _since: &str,
            _limit: usize,
        ) -> Result<Vec<RewardRecord>, ApiError> {
            let page = self.pages.lock().unwrap().pop_front().unwrap_or_default();
            Ok(RewardRecord::decode_page(page))
        }

        async fn fetch_counts(&self, _since: &str) -> Result<CountsPage, ApiError> {
            Ok(CountsPage::default())
        }
    }

    #[test]
    fn test_refresh_survives_malformed_rows() {
        let row = |second: u32, grade: &str, item: serde_json::Value| {
            serde_json::json!({
                "skey": format!("2024-03-15T10:00:{:02}.000000Z", second),
                "created_at": format!("2024-03-15T10:00:{:02}Z", second),
                "grade": grade,
                "item_name": item,
                "token_data_id": "0xtoken",
                "txn_hash": format!("0x{}", second),
                "total_minted": second,
            })
        };
        let api = JsonApi {
            pages: Mutex::new(VecDeque::from(vec![vec![
                row(1, "Common", serde_json::json!("Wooden Sword")),
                row(2, "Rare", serde_json::Value::Null),
                row(3, "Mythic", serde_json::json!("Unknown")),
                row(4, "Epic", serde_json::json!("Storm Blade")),
            ]])),
        };
        let mut feed = make_feed(100);

        let summary = tokio_test::block_on(feed.refresh(&api));

        assert!(summary.is_ok());
        let hashes: Vec<&str> = feed.records().iter().map(|r| r.txn_hash.as_str()).collect();
        assert_eq!(hashes, vec!["0x1", "0x2", "0x4"]);
        assert_eq!(feed.records()[1].item_name, "");
        assert_eq!(feed.cursor(), "2024-03-15T10:00:04.00000@");
    }

    #[test]
    fn test_refresh_against_simulator() {
        let start = Utc.with_ymd_and_hms(2024, 3, 20, 0, 0, 0).unwrap();
        let api = SimulatedApi::new(7, start).unwrap();
        api.mint(250);

        let mut feed = RewardFeed::new(Watermark::starting_at("2024-03-15T00:00:00Z"), 200, 64, 50);
        let summary = tokio_test::block_on(feed.refresh(&api));

        assert!(summary.is_ok());
        assert_eq!(summary.received, 250);
        assert_eq!(feed.records().len(), 200);
        assert!(feed.records().windows(2).all(|w| w[0].skey < w[1].skey));

        api.mint(5);
        let summary = tokio_test::block_on(feed.refresh(&api));
        assert_eq!(summary.received, 5);
        assert_eq!(feed.records().last().map(|r| r.total_minted), Some(255));
    }
}
