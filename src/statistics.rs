//! Aggregate statistics over the full entry set
//!
//! Recomputed wholesale after every mutation; at single-user journal
//! scale the O(N) fold is acceptable and keeps the totals trivially
//! consistent with the store.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::log_entry::{LogCategory, LogEntry};

/// Derived totals over the entry set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub total_logs: u64,
    pub success_logs: u64,
    pub total_prevented_calories: u64,
    /// Length of the unbroken run of log-days ending today; zero when
    /// today has no entry.
    pub consecutive_days: u32,
}

/// Half-open interval: `start <= timestamp < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.start <= timestamp && timestamp < self.end
    }
}

/// Fold the entry set into aggregate totals.
pub fn compute(entries: &[LogEntry], today: NaiveDate) -> AggregateStats {
    let total_logs = entries.len() as u64;
    let success_logs = entries
        .iter()
        .filter(|e| e.category == LogCategory::Success)
        .count() as u64;
    let total_prevented_calories = entries
        .iter()
        .filter_map(|e| e.feedback.prevented_calories())
        .map(u64::from)
        .sum();

    AggregateStats {
        total_logs,
        success_logs,
        total_prevented_calories,
        consecutive_days: consecutive_days(entries, today),
    }
}

/// Walk backward from `today` while each day has at least one entry.
fn consecutive_days(entries: &[LogEntry], today: NaiveDate) -> u32 {
    let log_dates: HashSet<NaiveDate> = entries.iter().map(|e| e.timestamp.date_naive()).collect();

    let mut streak = 0;
    let mut day = today;
    while log_dates.contains(&day) {
        streak += 1;
        match day.pred_opt() {
            Some(prev) => day = prev,
            None => break,
        }
    }
    streak
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_entry::FeedbackState;
    use chrono::{Duration, TimeZone};

    fn entry_at(timestamp: DateTime<Utc>, category: LogCategory, kcal: Option<u32>) -> LogEntry {
        let mut entry = LogEntry::new(vec![0u8; 16], category);
        entry.timestamp = timestamp;
        if let Some(prevented_calories) = kcal {
            entry.feedback = FeedbackState::Attached {
                message: vec![0u8; 16],
                prevented_calories,
            };
        }
        entry
    }

    fn noon(date: NaiveDate) -> DateTime<Utc> {
        Utc.from_utc_datetime(&date.and_hms_opt(12, 0, 0).unwrap())
    }

    #[test]
    fn totals_fold_correctly() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        let entries = vec![
            entry_at(noon(today), LogCategory::Success, Some(250)),
            entry_at(noon(today), LogCategory::Success, Some(400)),
            entry_at(noon(today), LogCategory::Failure, None),
            entry_at(noon(today), LogCategory::Other, Some(150)),
        ];

        let stats = compute(&entries, today);
        assert_eq!(stats.total_logs, 4);
        assert_eq!(stats.success_logs, 2);
        assert_eq!(stats.total_prevented_calories, 800);
        assert_eq!(stats.consecutive_days, 1);
    }

    #[test]
    fn three_day_run_counts_three() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        let entries = vec![
            entry_at(noon(today), LogCategory::Success, None),
            entry_at(noon(today) - Duration::days(1), LogCategory::Struggle, None),
            entry_at(noon(today) - Duration::days(2), LogCategory::Success, None),
            // gap at three days ago
            entry_at(noon(today) - Duration::days(4), LogCategory::Success, None),
        ];

        assert_eq!(compute(&entries, today).consecutive_days, 3);
    }

    #[test]
    fn streak_is_zero_without_a_today_entry() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        let entries = vec![
            entry_at(noon(today) - Duration::days(1), LogCategory::Success, None),
            entry_at(noon(today) - Duration::days(2), LogCategory::Success, None),
        ];

        assert_eq!(compute(&entries, today).consecutive_days, 0);
    }

    #[test]
    fn multiple_entries_per_day_count_once() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        let entries = vec![
            entry_at(noon(today), LogCategory::Success, None),
            entry_at(noon(today) + Duration::hours(2), LogCategory::Other, None),
        ];

        assert_eq!(compute(&entries, today).consecutive_days, 1);
    }

    #[test]
    fn empty_set_is_all_zeroes() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        assert_eq!(compute(&[], today), AggregateStats::default());
    }

    #[test]
    fn date_range_is_half_open() {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 6, 8, 0, 0, 0).unwrap();
        let range = DateRange { start, end };

        assert!(range.contains(start));
        assert!(!range.contains(end));
        assert!(range.contains(Utc.with_ymd_and_hms(2025, 6, 4, 12, 0, 0).unwrap()));
    }
}
