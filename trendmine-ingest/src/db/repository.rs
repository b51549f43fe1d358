//! Project repository
//!
//! The only component that mutates persisted state. Both writes are
//! serialized per logical key inside the process by [`KeyedLocks`]; across
//! processes the UNIQUE constraints on `projects.full_name` and
//! `project_insights(project_id, language)` are the arbiter, and a lost
//! insert race is recovered by re-reading and updating.

use super::{insights, projects, LanguageCount, ProjectFilter};
use crate::models::{Insight, InsightOutcome, InsightPayload, Language, Project, RawProject};
use crate::utils::{retry_on_lock, KeyedLocks};
use chrono::{Duration, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};
use trendmine_common::{Error, Result};

/// Insert/update attempts before a conflicted insight write gives up
const MAX_PERSIST_ATTEMPTS: u32 = 2;

/// Insight row counts by analysis status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InsightStatusCounts {
    pub success: i64,
    pub failed: i64,
}

/// Summary used by the admin API
#[derive(Debug, Clone, Serialize)]
pub struct RepositoryStats {
    pub total_projects: i64,
    pub new_projects_last_7_days: i64,
    pub top_languages: Vec<LanguageCount>,
    pub insights: InsightStatusCounts,
}

/// Shared handle over the pool; clones share the same key locks
#[derive(Clone)]
pub struct ProjectRepository {
    pool: SqlitePool,
    project_locks: Arc<KeyedLocks<String>>,
    insight_locks: Arc<KeyedLocks<(i64, Language)>>,
    max_lock_wait_ms: u64,
}

impl ProjectRepository {
    pub fn new(pool: SqlitePool, max_lock_wait_ms: u64) -> Self {
        Self {
            pool,
            project_locks: Arc::new(KeyedLocks::new()),
            insight_locks: Arc::new(KeyedLocks::new()),
            max_lock_wait_ms,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert or refresh a project by its `owner/name` identity
    ///
    /// Returns the stored row and whether this call created it. Exactly one
    /// call ever observes `true` for a given identity.
    pub async fn upsert_project(&self, candidate: &RawProject) -> Result<(Project, bool)> {
        if candidate.owner.trim().is_empty() || candidate.name.trim().is_empty() {
            return Err(Error::InvalidInput(format!(
                "Project identity '{}' is incomplete",
                candidate.full_name()
            )));
        }

        let full_name = candidate.full_name();
        let _guard = self.project_locks.lock(full_name.clone()).await;
        let now = Utc::now();

        let is_new = retry_on_lock("project insert", self.max_lock_wait_ms, || {
            projects::insert_project_if_absent(&self.pool, candidate, now)
        })
        .await?;

        if !is_new {
            retry_on_lock("project update", self.max_lock_wait_ms, || {
                projects::merge_project_sighting(&self.pool, candidate, now)
            })
            .await?;
        }

        let project = projects::find_project_by_full_name(&self.pool, &full_name)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Project {} missing after upsert", full_name)))?;

        debug!(
            project = %full_name,
            is_new,
            stars = project.stars_count,
            "Upserted project"
        );

        Ok((project, is_new))
    }

    /// Return the stored insight for (project, language), creating it if needed
    ///
    /// A `success` row is returned as is without calling `producer`. Anything
    /// else (absent or `failed`) runs `producer` and persists its payload.
    /// The producer runs while the key lock is held, so concurrent callers in
    /// this process wait and then take the fast path.
    pub async fn get_or_create_insight<F, Fut>(
        &self,
        project_id: i64,
        language: Language,
        producer: F,
    ) -> Result<(Insight, InsightOutcome)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = InsightPayload>,
    {
        let _guard = self.insight_locks.lock((project_id, language)).await;

        if let Some(existing) = insights::find_insight(&self.pool, project_id, language).await? {
            if existing.is_success() {
                debug!(project_id, language = %language, "Successful insight exists, skipping generation");
                return Ok((existing, InsightOutcome::Existing));
            }
        }

        let payload = producer().await;
        if payload.language != language {
            return Err(Error::Internal(format!(
                "Producer returned a {} payload for a {} insight",
                payload.language, language
            )));
        }

        self.persist_insight(project_id, language, &payload).await
    }

    async fn persist_insight(
        &self,
        project_id: i64,
        language: Language,
        payload: &InsightPayload,
    ) -> Result<(Insight, InsightOutcome)> {
        let mut conflicted = false;

        for attempt in 1..=MAX_PERSIST_ATTEMPTS {
            let now = Utc::now();

            if let Some(current) = insights::find_insight(&self.pool, project_id, language).await? {
                let written = retry_on_lock("insight update", self.max_lock_wait_ms, || {
                    insights::update_insight(&self.pool, current.id, payload, now)
                })
                .await?;

                let outcome = match (written, conflicted) {
                    (false, _) => InsightOutcome::Existing,
                    (true, true) => InsightOutcome::RecoveredConflict,
                    (true, false) => InsightOutcome::Updated,
                };
                if !written {
                    info!(
                        project_id,
                        language = %language,
                        "Kept concurrently stored successful insight over failed result"
                    );
                }

                let stored = self.reread_insight(project_id, language).await?;
                return Ok((stored, outcome));
            }

            match retry_on_lock("insight insert", self.max_lock_wait_ms, || {
                insights::insert_insight(&self.pool, project_id, payload, now)
            })
            .await
            {
                Ok(_) => {
                    let stored = self.reread_insight(project_id, language).await?;
                    return Ok((stored, InsightOutcome::Created));
                }
                Err(err) if err.is_unique_violation() => {
                    warn!(
                        project_id,
                        language = %language,
                        attempt,
                        "Concurrent insight insert won the race, re-reading"
                    );
                    conflicted = true;
                }
                Err(err) => return Err(err),
            }
        }

        Err(Error::Internal(format!(
            "Insight for project {} ({}) not persisted after {} attempts",
            project_id, language, MAX_PERSIST_ATTEMPTS
        )))
    }

    async fn reread_insight(&self, project_id: i64, language: Language) -> Result<Insight> {
        insights::find_insight(&self.pool, project_id, language)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "Insight for project {} ({}) missing after write",
                    project_id, language
                ))
            })
    }

    pub async fn find_project_by_full_name(&self, full_name: &str) -> Result<Option<Project>> {
        projects::find_project_by_full_name(&self.pool, full_name).await
    }

    pub async fn find_project(&self, owner: &str, name: &str) -> Result<Option<Project>> {
        self.find_project_by_full_name(&format!("{}/{}", owner, name))
            .await
    }

    pub async fn find_project_by_id(&self, id: i64) -> Result<Option<Project>> {
        projects::find_project_by_id(&self.pool, id).await
    }

    /// Plain read without locking or generation
    pub async fn find_insight(&self, project_id: i64, language: Language) -> Result<Option<Insight>> {
        insights::find_insight(&self.pool, project_id, language).await
    }

    pub async fn has_successful_insight(&self, project_id: i64, language: Language) -> Result<bool> {
        insights::has_successful_insight(&self.pool, project_id, language).await
    }

    pub async fn list_projects(
        &self,
        filter: &ProjectFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Project>> {
        projects::list_projects(&self.pool, filter, limit, offset).await
    }

    pub async fn count_projects(&self, filter: &ProjectFilter) -> Result<i64> {
        projects::count_projects(&self.pool, filter).await
    }

    pub async fn language_counts(&self, limit: Option<i64>) -> Result<Vec<LanguageCount>> {
        projects::language_counts(&self.pool, limit).await
    }

    pub async fn projects_missing_insights(
        &self,
        languages: &[Language],
        limit: i64,
    ) -> Result<Vec<Project>> {
        let codes: Vec<&str> = languages.iter().map(Language::code).collect();
        projects::projects_missing_insights(&self.pool, &codes, limit).await
    }

    pub async fn repository_stats(&self) -> Result<RepositoryStats> {
        let total_projects = projects::count_projects(&self.pool, &ProjectFilter::default()).await?;
        let new_projects_last_7_days =
            projects::count_projects_created_since(&self.pool, Utc::now() - Duration::days(7))
                .await?;
        let top_languages = projects::language_counts(&self.pool, Some(5)).await?;

        let mut counts = InsightStatusCounts::default();
        for (status, count) in insights::count_by_status(&self.pool).await? {
            match status.as_str() {
                "success" => counts.success = count,
                "failed" => counts.failed = count,
                _ => {}
            }
        }

        Ok(RepositoryStats {
            total_projects,
            new_projects_last_7_days,
            top_languages,
            insights: counts,
        })
    }
}
