//! Reconciler
//!
//! Upserts fetched candidates and works out which (project, language) pairs
//! still owe an insight. A pair is owed unless a `success` insight exists.

use crate::db::ProjectRepository;
use crate::models::{Language, Project, RawProject};
use std::collections::HashMap;
use tracing::{debug, warn};

/// A project and the insight languages it still needs
#[derive(Debug, Clone)]
pub struct EnrichmentTarget {
    pub project: Project,
    pub languages: Vec<Language>,
}

#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    /// One entry per distinct project with at least one needed language
    pub targets: Vec<EnrichmentTarget>,
    pub new_projects: usize,
    pub updated_projects: usize,
    pub failures: usize,
}

#[derive(Clone)]
pub struct Reconciler {
    repo: ProjectRepository,
}

impl Reconciler {
    pub fn new(repo: ProjectRepository) -> Self {
        Self { repo }
    }

    /// Upsert every candidate and collect the enrichment still owed
    ///
    /// A candidate whose upsert fails is counted and skipped.
    pub async fn reconcile(&self, candidates: &[RawProject], languages: &[Language]) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::default();
        let mut index_by_project: HashMap<i64, usize> = HashMap::new();

        for candidate in candidates {
            let (project, is_new) = match self.repo.upsert_project(candidate).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(project = %candidate.full_name(), error = %e, "Project upsert failed");
                    outcome.failures += 1;
                    continue;
                }
            };

            if is_new {
                outcome.new_projects += 1;
            } else {
                outcome.updated_projects += 1;
            }

            let needed = self.needed_languages(&project, is_new, languages).await;
            if needed.is_empty() {
                debug!(project = %project.full_name, "All insights present");
                continue;
            }

            match index_by_project.get(&project.id) {
                Some(&index) => {
                    let target = &mut outcome.targets[index];
                    for language in needed {
                        if !target.languages.contains(&language) {
                            target.languages.push(language);
                        }
                    }
                }
                None => {
                    index_by_project.insert(project.id, outcome.targets.len());
                    outcome.targets.push(EnrichmentTarget {
                        project,
                        languages: needed,
                    });
                }
            }
        }

        outcome
    }

    /// Languages without a successful insight for `project`
    ///
    /// New projects need every language without a lookup. If the lookup
    /// fails the language counts as needed; the locked check in the
    /// repository keeps that from producing duplicate work.
    pub async fn needed_languages(
        &self,
        project: &Project,
        is_new: bool,
        languages: &[Language],
    ) -> Vec<Language> {
        if is_new {
            return languages.to_vec();
        }

        let mut needed = Vec::with_capacity(languages.len());
        for &language in languages {
            match self.repo.has_successful_insight(project.id, language).await {
                Ok(true) => {}
                Ok(false) => needed.push(language),
                Err(e) => {
                    warn!(
                        project = %project.full_name,
                        language = %language,
                        error = %e,
                        "Necessity check failed, treating as needed"
                    );
                    needed.push(language);
                }
            }
        }
        needed
    }
}
