//! Admin API: manual pipeline triggers and repository statistics
//!
//! Triggered jobs run in the background; only one admin job runs at a time
//! (409 otherwise). Scheduler runs are independent of this flag.

use crate::db::RepositoryStats;
use crate::models::{Language, TimeWindow};
use crate::services::{RunRequest, RunStatistics};
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

const DEFAULT_ANALYZE_LIMIT: i64 = 10;

#[derive(Debug, Default, Deserialize)]
pub struct ScrapeTrendingRequest {
    /// Trending language filters; configured filters when absent
    pub languages: Option<Vec<String>>,
    pub time_range: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeProjectsRequest {
    pub limit: Option<i64>,
    /// Insight languages; configured languages when absent
    pub languages: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct JobAcceptedResponse {
    pub status: &'static str,
    pub job: &'static str,
    pub message: String,
}

/// Clears the admin job flag when the job ends, however it ends
struct AdminJobGuard(Arc<AtomicBool>);

impl Drop for AdminJobGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn spawn_admin_job<F>(state: &AppState, job: &'static str, work: F) -> ApiResult<()>
where
    F: Future<Output = RunStatistics> + Send + 'static,
{
    if state.admin_job_active.swap(true, Ordering::SeqCst) {
        return Err(ApiError::Conflict(
            "Another admin job is still running".to_string(),
        ));
    }

    let guard = AdminJobGuard(Arc::clone(&state.admin_job_active));
    let last_error = Arc::clone(&state.last_error);

    tokio::spawn(async move {
        let _guard = guard;
        let stats = work.await;
        info!(job, run_id = %stats.run_id, analyzed = stats.analyzed, "Admin job finished");

        if let Some(summary) = stats.error_summary() {
            warn!(job, summary = %summary, "Admin job had failures");
            *last_error.write().await = Some(summary);
        }
    });

    Ok(())
}

/// POST /api/v1/admin/scrape-trending
pub async fn scrape_trending(
    State(state): State<AppState>,
    body: Option<Json<ScrapeTrendingRequest>>,
) -> ApiResult<(StatusCode, Json<JobAcceptedResponse>)> {
    let body = body.map(|Json(body)| body).unwrap_or_default();

    let mut request = state.config.default_run_request();
    if let Some(time_range) = body.time_range.as_deref() {
        request.time_range = time_range.parse::<TimeWindow>()?;
    }
    if let Some(languages) = body.languages {
        request.language_filters = languages;
    }

    let message = format!(
        "Trending scrape started for {} ({})",
        describe_filters(&request),
        request.time_range
    );

    let driver = Arc::clone(&state.driver);
    spawn_admin_job(&state, "scrape-trending", async move { driver.run(&request).await })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(JobAcceptedResponse {
            status: "started",
            job: "scrape-trending",
            message,
        }),
    ))
}

/// POST /api/v1/admin/analyze-projects
pub async fn analyze_projects(
    State(state): State<AppState>,
    body: Option<Json<AnalyzeProjectsRequest>>,
) -> ApiResult<(StatusCode, Json<JobAcceptedResponse>)> {
    let body = body.map(|Json(body)| body).unwrap_or_default();

    let limit = body.limit.unwrap_or(DEFAULT_ANALYZE_LIMIT);
    if limit < 1 {
        return Err(ApiError::BadRequest("limit must be at least 1".to_string()));
    }

    let languages = match body.languages {
        Some(codes) => Language::parse_list(&codes)?,
        None => state.config.pipeline.analysis_languages.clone(),
    };
    if languages.is_empty() {
        return Err(ApiError::BadRequest("languages must not be empty".to_string()));
    }

    let codes: Vec<&str> = languages.iter().map(Language::code).collect();
    let message = format!(
        "Analysis started for up to {} projects in {}",
        limit,
        codes.join(",")
    );

    let driver = Arc::clone(&state.driver);
    spawn_admin_job(&state, "analyze-projects", async move {
        driver.analyze_pending(limit, &languages).await
    })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(JobAcceptedResponse {
            status: "started",
            job: "analyze-projects",
            message,
        }),
    ))
}

/// GET /api/v1/admin/stats
pub async fn get_stats(State(state): State<AppState>) -> ApiResult<Json<RepositoryStats>> {
    Ok(Json(state.repo.repository_stats().await?))
}

fn describe_filters(request: &RunRequest) -> String {
    if request.language_filters.is_empty() {
        "all languages".to_string()
    } else {
        request.language_filters.join(", ")
    }
}

/// Build admin routes
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/admin/scrape-trending", post(scrape_trending))
        .route("/api/v1/admin/analyze-projects", post(analyze_projects))
        .route("/api/v1/admin/stats", get(get_stats))
}
