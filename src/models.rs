//! Data models for the rewards monitor.
//!
//! This module contains the reward grades with their designed drop
//! probabilities, the minting records served by the rewards API, and
//! the running per-grade counts.

use crate::error::ParseGradeError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Number of reward grades.
pub const GRADE_COUNT: usize = 5;

/// Designed drop probability of each grade, indexed like [`Grade::ALL`].
pub const PROBABILITIES: [f64; GRADE_COUNT] = [
    1.0 - (0.3 + 0.05 + 0.008 + 0.001),
    0.3,
    0.05,
    0.008,
    0.001,
];

/// Key the count endpoint uses for the number of trials.
pub const TOTAL_TRIALS_KEY: &str = "Total Trials";

/// Rarity tier of a minted reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum Grade {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

impl Grade {
    /// All grades, most common first.
    pub const ALL: [Grade; GRADE_COUNT] = [
        Grade::Common,
        Grade::Uncommon,
        Grade::Rare,
        Grade::Epic,
        Grade::Legendary,
    ];

    /// Column position of this grade in one-hot rows and count arrays.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Designed probability of drawing this grade.
    pub fn probability(self) -> f64 {
        PROBABILITIES[self.index()]
    }

    /// The rarest grade.
    pub fn rarest() -> Grade {
        Grade::Legendary
    }

    /// Grades ordered rarest first, as the dashboard lists them.
    pub fn rarest_first() -> impl Iterator<Item = Grade> {
        Grade::ALL.into_iter().rev()
    }

    /// Returns an emoji marker for the grade.
    pub fn emoji(&self) -> &'static str {
        match self {
            Grade::Common => "⚪",
            Grade::Uncommon => "🟢",
            Grade::Rare => "🔵",
            Grade::Epic => "🟣",
            Grade::Legendary => "🌈",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grade::Common => write!(f, "Common"),
            Grade::Uncommon => write!(f, "Uncommon"),
            Grade::Rare => write!(f, "Rare"),
            Grade::Epic => write!(f, "Epic"),
            Grade::Legendary => write!(f, "Legendary"),
        }
    }
}

impl FromStr for Grade {
    type Err = ParseGradeError;

    /// Parses a grade name, ignoring case and any `group/` prefix
    /// (`sidekick/legendary` is `Legendary`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.rsplit('/').next().unwrap_or(s).trim();
        match name.to_lowercase().as_str() {
            "common" => Ok(Grade::Common),
            "uncommon" => Ok(Grade::Uncommon),
            "rare" => Ok(Grade::Rare),
            "epic" => Ok(Grade::Epic),
            "legendary" => Ok(Grade::Legendary),
            _ => Err(ParseGradeError(s.to_string())),
        }
    }
}

impl TryFrom<String> for Grade {
    type Error = ParseGradeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A single reward-minting event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardRecord {
    /// Sort key: ISO-8601 timestamp string, ordered lexicographically.
    pub skey: String,
    /// When the reward was minted.
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
    /// Rarity tier of the reward.
    pub grade: Grade,
    /// Display name of the reward item.
    #[serde(default, deserialize_with = "null_as_default")]
    pub item_name: String,
    /// On-chain token id of the reward.
    #[serde(default, deserialize_with = "null_as_default")]
    pub token_data_id: String,
    /// Hash of the minting transaction; identifies the trial.
    pub txn_hash: String,
    /// Trial ordinal reported by the backend.
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_minted: u64,
}

impl RewardRecord {
    /// Decode an `/items` page record by record.
    ///
    /// A record that does not decode is skipped with a warning, so one bad
    /// row cannot fail the whole page.
    pub fn decode_page(values: Vec<serde_json::Value>) -> Vec<Self> {
        values
            .into_iter()
            .filter_map(|value| {
                let skey = value
                    .get("skey")
                    .and_then(|v| v.as_str())
                    .unwrap_or("?")
                    .to_string();
                match serde_json::from_value::<RewardRecord>(value) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!("Skipping reward {}: {}", skey, e);
                        None
                    }
                }
            })
            .collect()
    }
}

/// Missing and `null` both decode to the default value.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Running number of trials and rewards per grade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeCounts {
    /// Total number of trials.
    pub total_trials: u64,
    /// Rewards per grade, indexed like [`Grade::ALL`].
    pub by_grade: [u64; GRADE_COUNT],
}

impl GradeCounts {
    /// Count of rewards of the given grade.
    pub fn get(&self, grade: Grade) -> u64 {
        self.by_grade[grade.index()]
    }

    /// Record one trial that produced `grade`.
    pub fn record(&mut self, grade: Grade) {
        self.total_trials += 1;
        self.by_grade[grade.index()] += 1;
    }

    /// Sum of the per-grade counts.
    pub fn grade_sum(&self) -> u64 {
        self.by_grade.iter().sum()
    }

    /// Whether the per-grade counts add up to the number of trials.
    pub fn is_consistent(&self) -> bool {
        self.grade_sum() == self.total_trials
    }

    /// Add another set of counts into this one.
    pub fn add(&mut self, other: &GradeCounts) {
        self.total_trials += other.total_trials;
        for (mine, theirs) in self.by_grade.iter_mut().zip(other.by_grade) {
            *mine += theirs;
        }
    }

    /// Build counts from the key/value map served by the count endpoint.
    ///
    /// Missing grades count as zero. When the total is missing it is the
    /// sum of the grades. Unknown keys are skipped.
    pub fn from_wire(map: &HashMap<String, u64>) -> Self {
        let mut counts = Self::default();
        let mut total = None;

        for (key, value) in map {
            if key == TOTAL_TRIALS_KEY {
                total = Some(*value);
                continue;
            }
            match key.parse::<Grade>() {
                Ok(grade) => counts.by_grade[grade.index()] += value,
                Err(_) => warn!("Ignoring unknown count key: {}", key),
            }
        }

        counts.total_trials = total.unwrap_or_else(|| counts.grade_sum());
        counts
    }
}

impl FromIterator<Grade> for GradeCounts {
    fn from_iter<I: IntoIterator<Item = Grade>>(iter: I) -> Self {
        let mut counts = Self::default();
        for grade in iter {
            counts.record(grade);
        }
        counts
    }
}

/// Response of the count endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CountsPage {
    /// New counts since the cursor, absent when nothing was minted.
    #[serde(default)]
    pub counts: Option<HashMap<String, u64>>,
    /// Sort key of the newest mint covered by `counts`.
    #[serde(default)]
    pub latest_update: Option<String>,
}

/// Lenient timestamp parsing: RFC 3339, or a naive ISO-8601 value taken as UTC.
mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub fn parse(raw: &str) -> Result<DateTime<Utc>, String> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Ok(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|e| format!("invalid timestamp '{}': {}", raw, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probabilities_sum_to_one() {
        let sum: f64 = PROBABILITIES.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!((Grade::Common.probability() - 0.641).abs() < 1e-12);
        assert_eq!(Grade::rarest().probability(), 0.001);
    }

    #[test]
    fn test_grade_ordering() {
        assert!(Grade::Common < Grade::Uncommon);
        assert!(Grade::Epic < Grade::Legendary);
        let rarest: Vec<Grade> = Grade::rarest_first().collect();
        assert_eq!(rarest.first(), Some(&Grade::Legendary));
        assert_eq!(rarest.last(), Some(&Grade::Common));
    }

    #[test]
    fn test_grade_from_str() {
        assert_eq!("rare".parse::<Grade>(), Ok(Grade::Rare));
        assert_eq!("LEGENDARY".parse::<Grade>(), Ok(Grade::Legendary));
        assert_eq!("sidekick/uncommon".parse::<Grade>(), Ok(Grade::Uncommon));
        assert!("mythic".parse::<Grade>().is_err());
    }

    #[test]
    fn test_record_deserialize() {
        let json = r#"{
            "skey": "2024-03-15T10:00:00.123456Z",
            "created_at": "2024-03-15T10:00:00.123456",
            "grade": "Epic",
            "item_name": "Shadow Cloak",
            "token_data_id": "0xabc",
            "txn_hash": "0xdef",
            "total_minted": 42
        }"#;

        let record: RewardRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.grade, Grade::Epic);
        assert_eq!(record.total_minted, 42);
        assert_eq!(
            record.created_at,
            timestamp::parse("2024-03-15T10:00:00.123456Z").unwrap()
        );
    }

    #[test]
    fn test_record_tolerates_null_fields() {
        let json = r#"{"skey": "a", "created_at": "2024-03-15T10:00:00Z",
                       "grade": "Rare", "item_name": null, "token_data_id": null,
                       "txn_hash": "0x1", "total_minted": null}"#;
        let record: RewardRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.item_name, "");
        assert_eq!(record.token_data_id, "");
        assert_eq!(record.total_minted, 0);
    }

    #[test]
    fn test_decode_page_skips_bad_records() {
        let page = vec![
            serde_json::json!({"skey": "a", "created_at": "2024-03-15T10:00:00Z",
                               "grade": "Common", "txn_hash": "0x1"}),
            serde_json::json!({"skey": "b", "created_at": "2024-03-15T10:00:01Z",
                               "grade": "Mythic", "txn_hash": "0x2"}),
            serde_json::json!({"skey": "c", "created_at": "not a time",
                               "grade": "Rare", "txn_hash": "0x3"}),
            serde_json::json!({"skey": "d", "created_at": "2024-03-15T10:00:03Z",
                               "grade": "Epic", "txn_hash": "0x4"}),
        ];

        let records = RewardRecord::decode_page(page);

        let keys: Vec<&str> = records.iter().map(|r| r.skey.as_str()).collect();
        assert_eq!(keys, vec!["a", "d"]);
    }

    #[test]
    fn test_record_rejects_unknown_grade() {
        let json = r#"{"skey": "a", "created_at": "2024-03-15T10:00:00Z",
                       "grade": "Mythic", "txn_hash": "0x1"}"#;
        assert!(serde_json::from_str::<RewardRecord>(json).is_err());
    }

    #[test]
    fn test_counts_from_wire() {
        let map: HashMap<String, u64> = [
            ("Total Trials".to_string(), 12),
            ("Common".to_string(), 8),
            ("Uncommon".to_string(), 3),
            ("Rare".to_string(), 1),
            ("Shiny".to_string(), 99),
        ]
        .into_iter()
        .collect();

        let counts = GradeCounts::from_wire(&map);
        assert_eq!(counts.total_trials, 12);
        assert_eq!(counts.get(Grade::Common), 8);
        assert_eq!(counts.get(Grade::Legendary), 0);
        assert!(counts.is_consistent());
    }

    #[test]
    fn test_counts_total_defaults_to_sum() {
        let map: HashMap<String, u64> = [("Epic".to_string(), 2), ("Rare".to_string(), 3)]
            .into_iter()
            .collect();
        assert_eq!(GradeCounts::from_wire(&map).total_trials, 5);
    }

    #[test]
    fn test_counts_add_and_collect() {
        let mut counts: GradeCounts = [Grade::Common, Grade::Common, Grade::Rare]
            .into_iter()
            .collect();
        let more: GradeCounts = [Grade::Legendary].into_iter().collect();
        counts.add(&more);

        assert_eq!(counts.total_trials, 4);
        assert_eq!(counts.get(Grade::Common), 2);
        assert_eq!(counts.get(Grade::Legendary), 1);
        assert!(counts.is_consistent());
    }

    #[test]
    fn test_counts_page_defaults() {
        let page: CountsPage = serde_json::from_str("{}").unwrap();
        assert!(page.counts.is_none());
        assert!(page.latest_update.is_none());
    }
}
