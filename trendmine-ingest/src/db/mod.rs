//! Persistence for projects and insights
//!
//! `projects` and `insights` hold plain SQL; [`ProjectRepository`] is the
//! only writer and adds per-key locking and conflict recovery on top.

pub mod insights;
pub mod projects;
pub mod repository;

pub use projects::{LanguageCount, ProjectFilter};
pub use repository::{InsightStatusCounts, ProjectRepository, RepositoryStats};

use chrono::{DateTime, SecondsFormat, Utc};
use trendmine_common::{Error, Result};

/// Fixed-width RFC 3339 so stored timestamps also sort lexically
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid stored timestamp '{}': {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamps_sort_lexically() {
        let earlier = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let later = earlier + chrono::Duration::milliseconds(1500);

        let a = format_timestamp(earlier);
        let b = format_timestamp(later);
        assert!(a < b);
        assert_eq!(parse_timestamp(&a).unwrap(), earlier);
    }
}
