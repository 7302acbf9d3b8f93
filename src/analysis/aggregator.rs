//! Reward aggregation.
//!
//! This module turns the table of recent rewards into the series the
//! dashboard shows: one-hot grade rows, cumulative counts over time, the
//! per-trial heatmap, the grade distribution and the trials table.

use crate::models::{Grade, GradeCounts, RewardRecord, GRADE_COUNT};
use crate::report::ExplorerLinks;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Indicator row: 1 in the column of the reward's grade, 0 elsewhere.
pub type OneHotRow = [u8; GRADE_COUNT];

/// One-hot encode a single grade.
pub fn one_hot(grade: Grade) -> OneHotRow {
    let mut row = [0; GRADE_COUNT];
    row[grade.index()] = 1;
    row
}

/// One-hot encode every record, in order.
pub fn one_hot_rows(records: &[RewardRecord]) -> Vec<OneHotRow> {
    records.iter().map(|r| one_hot(r.grade)).collect()
}

/// Per-grade counts of a set of records.
pub fn count_records(records: &[RewardRecord]) -> GradeCounts {
    records.iter().map(|r| r.grade).collect()
}

/// Cumulative per-grade counts after a trial.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CumulativePoint {
    /// 1-based position of the trial in the window.
    pub trial: usize,
    pub created_at: DateTime<Utc>,
    /// Running count per grade, indexed like [`Grade::ALL`].
    pub counts: [u64; GRADE_COUNT],
}

impl CumulativePoint {
    pub fn get(&self, grade: Grade) -> u64 {
        self.counts[grade.index()]
    }
}

/// Running sum of the one-hot rows, one point per record.
pub fn cumulative_counts(records: &[RewardRecord]) -> Vec<CumulativePoint> {
    let mut running = [0u64; GRADE_COUNT];

    records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            for (total, bit) in running.iter_mut().zip(one_hot(record.grade)) {
                *total += u64::from(bit);
            }
            CumulativePoint {
                trial: i + 1,
                created_at: record.created_at,
                counts: running,
            }
        })
        .collect()
}

/// Cumulative count of one grade over time.
pub fn grade_series(points: &[CumulativePoint], grade: Grade) -> Vec<(DateTime<Utc>, u64)> {
    points.iter().map(|p| (p.created_at, p.get(grade))).collect()
}

/// Which grade each trial produced, rarest grade in the first row.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Heatmap {
    /// Row labels.
    pub grades: Vec<Grade>,
    /// Column labels: 1-based positions in the window, matching
    /// [`CumulativePoint::trial`].
    pub trials: Vec<usize>,
    /// `cells[row][column]` is 1 when that trial produced that grade.
    pub cells: Vec<Vec<u8>>,
}

/// Transpose the one-hot rows into a grade-by-trial matrix. `first_trial`
/// labels the first column, so a tail of the window keeps its positions.
pub fn trial_heatmap(records: &[RewardRecord], first_trial: usize) -> Heatmap {
    let rows = one_hot_rows(records);
    let grades: Vec<Grade> = Grade::rarest_first().collect();
    let cells = grades
        .iter()
        .map(|g| rows.iter().map(|row| row[g.index()]).collect())
        .collect();

    Heatmap {
        grades,
        trials: (first_trial..first_trial + records.len()).collect(),
        cells,
    }
}

/// A grade's slice of all rewards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeShare {
    pub grade: Grade,
    pub count: u64,
    /// Fraction of all trials, 0 when there are none.
    pub share: f64,
}

/// Share of each grade among all trials.
pub fn distribution(counts: &GradeCounts) -> Vec<GradeShare> {
    Grade::ALL
        .iter()
        .map(|&grade| {
            let count = counts.get(grade);
            let share = if counts.total_trials == 0 {
                0.0
            } else {
                count as f64 / counts.total_trials as f64
            };
            GradeShare {
                grade,
                count,
                share,
            }
        })
        .collect()
}

/// One row of the trials table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialRow {
    /// Trial ordinal reported by the backend.
    pub trial: u64,
    pub created_at: DateTime<Utc>,
    pub grade: Grade,
    pub item_name: String,
    pub reward_link: String,
    pub txn_link: String,
}

/// The newest `rows` rewards, newest first, with explorer links.
pub fn trials_table(
    records: &[RewardRecord],
    rows: usize,
    links: &ExplorerLinks,
) -> Vec<TrialRow> {
    records
        .iter()
        .rev()
        .take(rows)
        .map(|r| TrialRow {
            trial: r.total_minted,
            created_at: r.created_at,
            grade: r.grade,
            item_name: r.item_name.clone(),
            reward_link: links.reward(&r.token_data_id),
            txn_link: links.transaction(&r.txn_hash),
        })
        .collect()
}
