//! Pipeline driver
//!
//! One run: fetch per language filter, reconcile, enrich, tally. A run never
//! fails as a whole; every problem ends up as a counter in
//! [`RunStatistics`].

pub mod statistics;

pub use statistics::{FilterStats, RunStatistics, ALL_LANGUAGES_KEY};

use super::enrichment_orchestrator::EnrichmentOrchestrator;
use super::reconciler::{EnrichmentTarget, Reconciler};
use super::trending_fetcher::SourceFetcher;
use crate::db::ProjectRepository;
use crate::models::{Language, TimeWindow};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Key used for back-fill runs
pub const BACKFILL_KEY: &str = "backfill";

/// Parameters of one ingestion run
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunRequest {
    /// Trending language filters; empty means one unfiltered pass
    #[serde(default)]
    pub language_filters: Vec<String>,
    #[serde(default)]
    pub time_range: TimeWindow,
    /// Insight languages to produce
    pub analysis_languages: Vec<Language>,
}

pub struct PipelineDriver {
    repo: ProjectRepository,
    fetcher: Arc<dyn SourceFetcher>,
    reconciler: Reconciler,
    orchestrator: Arc<EnrichmentOrchestrator>,
}

impl PipelineDriver {
    pub fn new(
        repo: ProjectRepository,
        fetcher: Arc<dyn SourceFetcher>,
        orchestrator: Arc<EnrichmentOrchestrator>,
    ) -> Self {
        Self {
            reconciler: Reconciler::new(repo.clone()),
            repo,
            fetcher,
            orchestrator,
        }
    }

    pub fn orchestrator(&self) -> &Arc<EnrichmentOrchestrator> {
        &self.orchestrator
    }

    /// Execute one ingestion run
    pub async fn run(&self, request: &RunRequest) -> RunStatistics {
        let mut stats = RunStatistics::new();

        let filters: Vec<&str> = if request.language_filters.is_empty() {
            vec![""]
        } else {
            request.language_filters.iter().map(String::as_str).collect()
        };

        info!(
            run_id = %stats.run_id,
            filters = ?filters,
            time_range = %request.time_range,
            "Pipeline run started"
        );

        for filter in filters {
            let key = if filter.trim().is_empty() {
                ALL_LANGUAGES_KEY
            } else {
                filter
            };

            let candidates = match self.fetcher.fetch(filter, request.time_range).await {
                Ok(candidates) => candidates,
                Err(e) => {
                    warn!(run_id = %stats.run_id, filter = key, error = %e, "Trending fetch failed, continuing");
                    stats.record_fetch_failure(key);
                    Vec::new()
                }
            };
            stats.record_scraped(key, candidates.len());

            let reconciled = self
                .reconciler
                .reconcile(&candidates, &request.analysis_languages)
                .await;
            stats.new_projects += reconciled.new_projects;
            stats.updated_projects += reconciled.updated_projects;
            stats.reconcile_failures += reconciled.failures;

            let reports = self.orchestrator.enrich_targets(&reconciled.targets).await;
            stats.record_units(key, &reports);

            info!(
                run_id = %stats.run_id,
                filter = key,
                scraped = candidates.len(),
                new = reconciled.new_projects,
                units = reports.len(),
                "Language filter processed"
            );
        }

        let stats = stats.finish();
        info!(
            run_id = %stats.run_id,
            total_scraped = stats.total_scraped,
            new_projects = stats.new_projects,
            analyzed = stats.analyzed,
            failed_analysis = stats.failed_analysis,
            persist_failures = stats.persist_failures,
            fetch_failures = stats.fetch_failures,
            "Pipeline run finished"
        );
        stats
    }

    /// Back-fill insights for stored projects lacking a successful one
    pub async fn analyze_pending(&self, limit: i64, languages: &[Language]) -> RunStatistics {
        let mut stats = RunStatistics::new();
        info!(run_id = %stats.run_id, limit, ?languages, "Back-fill started");

        let projects = match self.repo.projects_missing_insights(languages, limit.max(0)).await {
            Ok(projects) => projects,
            Err(e) => {
                error!(run_id = %stats.run_id, error = %e, "Pending project query failed");
                stats.reconcile_failures += 1;
                return stats.finish();
            }
        };

        let mut targets = Vec::with_capacity(projects.len());
        for project in projects {
            let needed = self.reconciler.needed_languages(&project, false, languages).await;
            if !needed.is_empty() {
                targets.push(EnrichmentTarget {
                    project,
                    languages: needed,
                });
            }
        }
        stats.filter_mut(BACKFILL_KEY);

        let reports = self.orchestrator.enrich_targets(&targets).await;
        stats.record_units(BACKFILL_KEY, &reports);

        let stats = stats.finish();
        info!(
            run_id = %stats.run_id,
            projects = targets.len(),
            analyzed = stats.analyzed,
            failed_analysis = stats.failed_analysis,
            "Back-fill finished"
        );
        stats
    }
}
