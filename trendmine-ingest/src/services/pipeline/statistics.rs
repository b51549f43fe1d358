//! Run statistics

use crate::services::enrichment_orchestrator::{UnitOutcome, UnitReport};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Key used for an unfiltered pass
pub const ALL_LANGUAGES_KEY: &str = "all";

/// Per language-filter counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterStats {
    pub scraped: usize,
    pub analyzed: usize,
    pub failed: usize,
    /// Listing requests that failed; such a filter scraped nothing
    pub fetch_failures: usize,
}

/// Aggregate result of one pipeline invocation
#[derive(Debug, Clone, Serialize)]
pub struct RunStatistics {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub total_scraped: usize,
    pub new_projects: usize,
    pub updated_projects: usize,
    /// Insights stored with status success
    pub analyzed: usize,
    /// Insights stored with status failed
    pub failed_analysis: usize,
    /// Pairs found already successful under the lock
    pub skipped: usize,
    pub persist_failures: usize,
    pub reconcile_failures: usize,
    pub fetch_failures: usize,
    pub per_filter: BTreeMap<String, FilterStats>,
}

impl RunStatistics {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            total_scraped: 0,
            new_projects: 0,
            updated_projects: 0,
            analyzed: 0,
            failed_analysis: 0,
            skipped: 0,
            persist_failures: 0,
            reconcile_failures: 0,
            fetch_failures: 0,
            per_filter: BTreeMap::new(),
        }
    }

    pub fn filter_mut(&mut self, key: &str) -> &mut FilterStats {
        self.per_filter.entry(key.to_string()).or_default()
    }

    pub fn record_scraped(&mut self, key: &str, count: usize) {
        self.total_scraped += count;
        self.filter_mut(key).scraped += count;
    }

    pub fn record_fetch_failure(&mut self, key: &str) {
        self.fetch_failures += 1;
        self.filter_mut(key).fetch_failures += 1;
    }

    pub fn record_units(&mut self, key: &str, reports: &[UnitReport]) {
        for report in reports {
            match report.outcome {
                UnitOutcome::Analyzed => {
                    self.analyzed += 1;
                    self.filter_mut(key).analyzed += 1;
                }
                UnitOutcome::Failed => {
                    self.failed_analysis += 1;
                    self.filter_mut(key).failed += 1;
                }
                UnitOutcome::Skipped => self.skipped += 1,
                UnitOutcome::PersistFailed => self.persist_failures += 1,
            }
        }
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }

    /// Summary for health reporting when anything failed outright
    pub fn error_summary(&self) -> Option<String> {
        if self.persist_failures == 0 && self.reconcile_failures == 0 && self.fetch_failures == 0 {
            return None;
        }
        Some(format!(
            "Run {}: {} insight writes, {} project upserts and {} listing fetches failed",
            self.run_id, self.persist_failures, self.reconcile_failures, self.fetch_failures
        ))
    }
}

impl Default for RunStatistics {
    fn default() -> Self {
        Self::new()
    }
}
