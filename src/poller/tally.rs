//! Running per-grade counts from the count endpoint.

use crate::api::RewardsApi;
use crate::config::PollConfig;
use crate::models::GradeCounts;
use crate::poller::{RefreshSummary, Watermark};
use tracing::{debug, info, warn};

/// Total trials and rewards per grade since the count epoch.
pub struct CountTally {
    totals: GradeCounts,
    watermark: Watermark,
    max_pages: usize,
}

impl CountTally {
    pub fn new(watermark: Watermark, max_pages: usize) -> Self {
        Self {
            totals: GradeCounts::default(),
            watermark,
            max_pages,
        }
    }

    /// Tally starting at the configured count epoch.
    pub fn from_config(config: &PollConfig) -> Self {
        Self::new(
            Watermark::starting_at(config.counts_epoch.clone()),
            config.max_pages_per_refresh,
        )
    }

    pub fn totals(&self) -> &GradeCounts {
        &self.totals
    }

    pub fn cursor(&self) -> &str {
        self.watermark.cursor()
    }

    /// Add every count page newer than the cursor.
    ///
    /// A page whose `latest_update` does not move the cursor is dropped:
    /// adding it would count the same mints again on the next poll.
    pub async fn refresh<A: RewardsApi>(&mut self, api: &A) -> RefreshSummary {
        let mut summary = RefreshSummary::default();

        loop {
            if summary.pages >= self.max_pages {
                warn!(
                    "Count refresh hit the {} page cap at cursor {}",
                    self.max_pages,
                    self.cursor()
                );
                summary.stalled = true;
                break;
            }

            let page = match api.fetch_counts(self.cursor()).await {
                Ok(page) => page,
                Err(e) => {
                    warn!("Count refresh stopped at cursor {}: {}", self.cursor(), e);
                    summary.error = Some(e);
                    break;
                }
            };

            let advanced = match page.latest_update.as_deref() {
                Some(latest) => self.watermark.advance(latest),
                None => false,
            };

            let Some(map) = page.counts else {
                break;
            };

            if !advanced {
                warn!(
                    "Dropping counts page: latest_update {:?} does not move cursor {}",
                    page.latest_update,
                    self.cursor()
                );
                summary.stalled = true;
                break;
            }

            let counts = GradeCounts::from_wire(&map);
            if !counts.is_consistent() {
                warn!(
                    "Grade counts sum to {} but {} trials were reported",
                    counts.grade_sum(),
                    counts.total_trials
                );
            }
            debug!("Counts page: {:?}", counts);

            self.totals.add(&counts);
            summary.pages += 1;
            summary.received += counts.total_trials;
        }

        if summary.received > 0 {
            info!(
                "Tallied {} new trials ({} total), next cursor {}",
                summary.received,
                self.totals.total_trials,
                self.cursor()
            );
        }
        summary
    }
}
