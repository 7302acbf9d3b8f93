//! Incremental polling of the rewards API.
//!
//! [`RewardFeed`] keeps a bounded table of the latest rewards and
//! [`CountTally`] keeps running per-grade counts. Each follows its own
//! [`Watermark`] and pages forward until the API has nothing newer.
//! A failed request ends the refresh; the next one retries from the
//! same cursor.

pub mod feed;
pub mod tally;
pub mod watermark;

pub use feed::RewardFeed;
pub use tally::CountTally;
pub use watermark::Watermark;

use crate::error::ApiError;

/// Outcome of one refresh.
#[derive(Debug, Default)]
pub struct RefreshSummary {
    /// Non-empty pages consumed.
    pub pages: usize,
    /// Records or trials received.
    pub received: u64,
    /// Stopped at the page cap or because the cursor stopped moving.
    pub stalled: bool,
    /// Request failure that ended the refresh.
    pub error: Option<ApiError>,
}

impl RefreshSummary {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}
