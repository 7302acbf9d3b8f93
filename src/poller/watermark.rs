//! Since-cursor derived from the newest sort key seen so far.
//!
//! Sort keys are ISO-8601 timestamp strings compared lexicographically by
//! the API. The cursor replaces the last character of the newest key with
//! `@`, which sorts after every digit, so the cursor sorts after every key
//! sharing that prefix and the next request returns only newer records.

use chrono::{DateTime, Duration, Utc};

/// Cursor that follows `latest`: trailing `Z` stripped, last character
/// replaced by `@`.
pub fn next_cursor(latest: &str) -> String {
    let trimmed = latest.strip_suffix('Z').unwrap_or(latest);
    let mut chars = trimmed.chars();
    chars.next_back();
    format!("{}@", chars.as_str())
}

/// Monotonic since-cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watermark {
    cursor: String,
}

impl Watermark {
    /// Start from a cursor used verbatim.
    pub fn starting_at(cursor: impl Into<String>) -> Self {
        Self {
            cursor: cursor.into(),
        }
    }

    /// Start `days` before `now`, or at the Unix epoch when that is out
    /// of range.
    pub fn lookback(now: DateTime<Utc>, days: i64) -> Self {
        let start = Duration::try_days(days)
            .and_then(|span| now.checked_sub_signed(span))
            .unwrap_or(DateTime::UNIX_EPOCH);
        let iso = start.naive_utc().format("%Y-%m-%dT%H:%M:%S%.6f").to_string();
        Self {
            cursor: next_cursor(&iso),
        }
    }

    pub fn cursor(&self) -> &str {
        &self.cursor
    }

    /// Move past `latest`. Returns false, leaving the cursor untouched,
    /// when that would not move it forward.
    pub fn advance(&mut self, latest: &str) -> bool {
        let next = next_cursor(latest);
        if next.as_str() > self.cursor.as_str() {
            self.cursor = next;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_next_cursor() {
        assert_eq!(
            next_cursor("2024-03-15T10:00:00.123456Z"),
            "2024-03-15T10:00:00.12345@"
        );
        assert_eq!(next_cursor("2024-03-15T10:00:00"), "2024-03-15T10:00:0@");
        assert_eq!(next_cursor(""), "@");
    }

    #[test]
    fn test_cursor_sorts_after_key() {
        let key = "2024-03-15T10:00:00.123456Z";
        let cursor = next_cursor(key);
        assert!(cursor.as_str() > key);
        assert!(cursor.as_str() < "2024-03-15T10:00:01.000000Z");
    }

    #[test]
    fn test_lookback() {
        let now = Utc.with_ymd_and_hms(2024, 3, 22, 12, 0, 0).unwrap();
        let mark = Watermark::lookback(now, 7);
        assert_eq!(mark.cursor(), "2024-03-15T12:00:00.00000@");
    }

    #[test]
    fn test_lookback_out_of_range() {
        let now = Utc.with_ymd_and_hms(2024, 3, 22, 12, 0, 0).unwrap();
        let mark = Watermark::lookback(now, i64::MAX);
        assert_eq!(mark.cursor(), "1970-01-01T00:00:00.00000@");
    }

    #[test]
    fn test_advance_is_monotonic() {
        let mut mark = Watermark::starting_at("2024-03-15T00:00:00Z");
        assert!(mark.advance("2024-03-15T10:00:00.500000Z"));
        assert_eq!(mark.cursor(), "2024-03-15T10:00:00.50000@");

        assert!(!mark.advance("2024-03-15T09:00:00.000000Z"));
        assert!(!mark.advance("2024-03-15T10:00:00.500000Z"));
        assert_eq!(mark.cursor(), "2024-03-15T10:00:00.50000@");
    }
}
