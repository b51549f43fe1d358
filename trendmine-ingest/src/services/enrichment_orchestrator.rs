//! Enrichment orchestrator
//!
//! Runs the generator as the producer of
//! [`ProjectRepository::get_or_create_insight`] for every owed pair, up to a
//! fixed number of pairs at once.

use super::insight_generator::EnrichmentGenerator;
use super::reconciler::EnrichmentTarget;
use crate::db::ProjectRepository;
use crate::models::{
    Insight, InsightLookup, InsightOutcome, Language, Project, ProjectFacts, TransientInsight,
};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use trendmine_common::Result;

/// What happened to one (project, language) unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOutcome {
    /// Stored with status success
    Analyzed,
    /// Stored with status failed
    Failed,
    /// A successful insight already existed
    Skipped,
    /// Nothing could be stored
    PersistFailed,
}

#[derive(Debug, Clone)]
pub struct UnitReport {
    pub project_id: i64,
    pub full_name: String,
    pub language: Language,
    pub outcome: UnitOutcome,
}

pub struct EnrichmentOrchestrator {
    repo: ProjectRepository,
    generator: Arc<dyn EnrichmentGenerator>,
    max_concurrent: usize,
}

impl EnrichmentOrchestrator {
    pub fn new(
        repo: ProjectRepository,
        generator: Arc<dyn EnrichmentGenerator>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            repo,
            generator,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// One unit of work: generate if owed, then persist
    pub async fn enrich_pair(
        &self,
        project: &Project,
        language: Language,
    ) -> Result<(Insight, InsightOutcome)> {
        let facts = ProjectFacts::from(project);
        let generator = &self.generator;

        self.repo
            .get_or_create_insight(project.id, language, || async move {
                generator.generate(&facts, language).await
            })
            .await
    }

    /// Enrich every owed pair; results arrive in completion order
    pub async fn enrich_targets(&self, targets: &[EnrichmentTarget]) -> Vec<UnitReport> {
        let units: Vec<(Project, Language)> = targets
            .iter()
            .flat_map(|target| {
                target
                    .languages
                    .iter()
                    .map(move |&l| (target.project.clone(), l))
            })
            .collect();

        if units.is_empty() {
            return Vec::new();
        }

        info!(
            units = units.len(),
            max_concurrent = self.max_concurrent,
            "Starting enrichment"
        );

        stream::iter(units)
            .map(|(project, language)| async move {
                let outcome = match self.enrich_pair(&project, language).await {
                    Ok((_, InsightOutcome::Existing)) => UnitOutcome::Skipped,
                    Ok((insight, outcome)) => {
                        debug!(
                            project = %project.full_name,
                            language = %language,
                            ?outcome,
                            status = %insight.analysis_status,
                            "Insight stored"
                        );
                        if insight.is_success() {
                            UnitOutcome::Analyzed
                        } else {
                            UnitOutcome::Failed
                        }
                    }
                    Err(e) => {
                        error!(
                            project = %project.full_name,
                            language = %language,
                            error = %e,
                            "Insight could not be persisted"
                        );
                        UnitOutcome::PersistFailed
                    }
                };

                UnitReport {
                    project_id: project.id,
                    full_name: project.full_name,
                    language,
                    outcome,
                }
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await
    }

    /// Read path used by the API: always yields something to return
    ///
    /// Falls back to a plain re-read when the locked path fails, and to a
    /// transient placeholder when that finds nothing either.
    pub async fn enrich_on_demand(&self, project: &Project, language: Language) -> InsightLookup {
        let failure = match self.enrich_pair(project, language).await {
            Ok((insight, _)) => return InsightLookup::Stored(insight),
            Err(e) => e,
        };

        warn!(
            project = %project.full_name,
            language = %language,
            error = %failure,
            "On-demand enrichment failed, re-reading"
        );

        match self.repo.find_insight(project.id, language).await {
            Ok(Some(insight)) => InsightLookup::Stored(insight),
            Ok(None) => InsightLookup::Transient(TransientInsight::new(
                project.id,
                language,
                failure.to_string(),
            )),
            Err(e) => {
                warn!(project = %project.full_name, error = %e, "Insight re-read failed");
                InsightLookup::Transient(TransientInsight::new(project.id, language, failure.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnalysisStatus, InsightFields, InsightPayload, RawProject};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use trendmine_common::db::init_memory_database;

    struct CountingGenerator {
        calls: AtomicUsize,
        succeed: bool,
    }

    #[async_trait]
    impl EnrichmentGenerator for CountingGenerator {
        fn version(&self) -> &str {
            "counting"
        }

        async fn generate(&self, facts: &ProjectFacts, language: Language) -> InsightPayload {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                InsightPayload::success(
                    InsightFields::from_fn(|s| format!("{} {}", facts.full_name, s.tag())),
                    language,
                    "counting",
                )
            } else {
                InsightPayload::failed(language, "counting")
            }
        }
    }

    async fn setup(succeed: bool) -> (EnrichmentOrchestrator, ProjectRepository, Arc<CountingGenerator>) {
        let repo = ProjectRepository::new(init_memory_database().await.unwrap(), 1000);
        let generator = Arc::new(CountingGenerator {
            calls: AtomicUsize::new(0),
            succeed,
        });
        let orchestrator = EnrichmentOrchestrator::new(repo.clone(), generator.clone(), 4);
        (orchestrator, repo, generator)
    }

    #[tokio::test]
    async fn test_targets_are_enriched_once() {
        let (orchestrator, repo, generator) = setup(true).await;
        let (widget, _) = repo.upsert_project(&RawProject::new("acme", "widget")).await.unwrap();
        let (gadget, _) = repo.upsert_project(&RawProject::new("acme", "gadget")).await.unwrap();

        let targets = vec![
            EnrichmentTarget { project: widget.clone(), languages: Language::ALL.to_vec() },
            EnrichmentTarget { project: gadget, languages: vec![Language::En] },
        ];

        let reports = orchestrator.enrich_targets(&targets).await;
        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|r| r.outcome == UnitOutcome::Analyzed));

        let again = orchestrator.enrich_targets(&targets).await;
        assert!(again.iter().all(|r| r.outcome == UnitOutcome::Skipped));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 3);

        let stored = repo.find_insight(widget.id, Language::Zh).await.unwrap().unwrap();
        assert_eq!(stored.fields.business_value, "acme/widget business_value");
    }

    #[tokio::test]
    async fn test_failed_generation_is_stored_as_failed() {
        let (orchestrator, repo, _) = setup(false).await;
        let (project, _) = repo.upsert_project(&RawProject::new("acme", "widget")).await.unwrap();

        let reports = orchestrator
            .enrich_targets(&[EnrichmentTarget { project: project.clone(), languages: vec![Language::En] }])
            .await;

        assert_eq!(reports[0].outcome, UnitOutcome::Failed);
        let stored = repo.find_insight(project.id, Language::En).await.unwrap().unwrap();
        assert_eq!(stored.analysis_status, AnalysisStatus::Failed);
    }

    #[tokio::test]
    async fn test_persist_failure_does_not_stop_other_units() {
        let (orchestrator, repo, generator) = setup(true).await;
        let (widget, _) = repo.upsert_project(&RawProject::new("acme", "widget")).await.unwrap();
        let mut orphan = widget.clone();
        orphan.id = 4242;
        orphan.full_name = "ghost/orphan".to_string();

        let targets = vec![
            EnrichmentTarget { project: orphan, languages: vec![Language::En] },
            EnrichmentTarget { project: widget.clone(), languages: vec![Language::En] },
        ];

        let reports = orchestrator.enrich_targets(&targets).await;
        assert_eq!(reports.len(), 2);

        let orphan_report = reports.iter().find(|r| r.project_id == 4242).unwrap();
        assert_eq!(orphan_report.outcome, UnitOutcome::PersistFailed);
        assert_eq!(orphan_report.full_name, "ghost/orphan");

        let widget_report = reports.iter().find(|r| r.project_id == widget.id).unwrap();
        assert_eq!(widget_report.outcome, UnitOutcome::Analyzed);
        assert!(repo.has_successful_insight(widget.id, Language::En).await.unwrap());
        assert!(repo.find_insight(4242, Language::En).await.unwrap().is_none());
        assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_on_demand_returns_stored_insight() {
        let (orchestrator, repo, _) = setup(true).await;
        let (project, _) = repo.upsert_project(&RawProject::new("acme", "widget")).await.unwrap();

        let lookup = orchestrator.enrich_on_demand(&project, Language::En).await;
        assert!(lookup.is_stored());
        assert_eq!(lookup.status(), AnalysisStatus::Success);
    }

    #[tokio::test]
    async fn test_on_demand_for_missing_project_is_transient() {
        let (orchestrator, repo, _) = setup(true).await;
        let (mut project, _) = repo.upsert_project(&RawProject::new("acme", "widget")).await.unwrap();
        project.id = 4242;

        match orchestrator.enrich_on_demand(&project, Language::Zh).await {
            InsightLookup::Transient(transient) => {
                assert_eq!(transient.project_id, 4242);
                assert_eq!(transient.analysis_status, AnalysisStatus::Failed);
                assert_eq!(transient.analysis_version, "unknown");
                assert!(!transient.fields.business_value.is_empty());
            }
            InsightLookup::Stored(_) => panic!("expected transient placeholder"),
        }
    }
}
