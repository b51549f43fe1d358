//! Project read API
//!
//! Thin query layer over the repository. Listing depth is capped at
//! `max_total_results`; the insight endpoint enriches on demand and never
//! fails because of generation or storage problems.

use crate::db::{LanguageCount, ProjectFilter};
use crate::models::{InsightLookup, Language, Project};
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Default, Deserialize)]
pub struct ProjectListQuery {
    pub search: Option<String>,
    pub language: Option<String>,
    /// Only projects trending within the last N days
    pub days: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ProjectListResponse {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub data: Vec<Project>,
    /// `limit_reached` or `approaching_limit` near the result cap
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
pub struct InsightQuery {
    pub language: Option<String>,
}

/// GET /api/v1/projects
pub async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<ProjectListQuery>,
) -> ApiResult<Json<ProjectListResponse>> {
    let limits = &state.config.api;

    let limit = query.limit.unwrap_or(limits.default_page_size);
    if limit < 1 {
        return Err(ApiError::BadRequest("limit must be at least 1".to_string()));
    }
    let limit = limit.min(limits.max_single_request);

    let offset = query.offset.unwrap_or(0);
    if offset < 0 {
        return Err(ApiError::BadRequest("offset must not be negative".to_string()));
    }

    let trending_since = match query.days {
        Some(days) if days < 1 => {
            return Err(ApiError::BadRequest("days must be at least 1".to_string()))
        }
        Some(days) => Some(trending_cutoff(days)?),
        None => None,
    };

    if offset >= limits.max_total_results {
        return Ok(Json(ProjectListResponse {
            total: 0,
            limit,
            offset,
            data: Vec::new(),
            message: Some("limit_reached"),
        }));
    }

    let filter = ProjectFilter {
        search: query.search,
        language: query.language,
        trending_since,
    };

    let total = state
        .repo
        .count_projects(&filter)
        .await?
        .min(limits.max_total_results);
    let page_size = limit.min(limits.max_total_results - offset);
    let data = state.repo.list_projects(&filter, page_size, offset).await?;

    let message = (offset + limit >= limits.max_total_results).then_some("approaching_limit");

    Ok(Json(ProjectListResponse {
        total,
        limit,
        offset,
        data,
        message,
    }))
}

/// GET /api/v1/projects/languages
pub async fn list_languages(State(state): State<AppState>) -> ApiResult<Json<Vec<LanguageCount>>> {
    Ok(Json(state.repo.language_counts(None).await?))
}

/// GET /api/v1/projects/:owner/:repo
pub async fn get_project(
    State(state): State<AppState>,
    Path((owner, repo)): Path<(String, String)>,
) -> ApiResult<Json<Project>> {
    find_project(&state, &owner, &repo).await.map(Json)
}

/// GET /api/v1/projects/:owner/:repo/insights?language=en
///
/// Always 200 for a known project: a stored insight (possibly `failed`) or
/// a transient placeholder, told apart by `kind`.
pub async fn get_project_insights(
    State(state): State<AppState>,
    Path((owner, repo)): Path<(String, String)>,
    Query(query): Query<InsightQuery>,
) -> ApiResult<Json<InsightLookup>> {
    let language = match query.language.as_deref() {
        Some(code) => code.parse::<Language>()?,
        None => Language::En,
    };

    let project = find_project(&state, &owner, &repo).await?;

    match state.repo.find_insight(project.id, language).await {
        Ok(Some(insight)) if insight.is_success() => {
            return Ok(Json(InsightLookup::Stored(insight)));
        }
        Ok(Some(_)) => {
            info!(project = %project.full_name, language = %language, "Re-analyzing failed insight on demand");
        }
        Ok(None) => {}
        Err(e) => {
            warn!(project = %project.full_name, error = %e, "Insight lookup failed, enriching on demand");
        }
    }

    let lookup = state
        .driver
        .orchestrator()
        .enrich_on_demand(&project, language)
        .await;

    Ok(Json(lookup))
}

/// Start of the `days` window; out-of-range values are a bad request
fn trending_cutoff(days: i64) -> ApiResult<DateTime<Utc>> {
    Duration::try_days(days)
        .and_then(|window| Utc::now().checked_sub_signed(window))
        .ok_or_else(|| ApiError::BadRequest(format!("days {} is out of range", days)))
}

async fn find_project(state: &AppState, owner: &str, repo: &str) -> ApiResult<Project> {
    state
        .repo
        .find_project(owner, repo)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Project {}/{} not found", owner, repo)))
}

/// Build project read routes
pub fn project_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/projects", get(list_projects))
        .route("/api/v1/projects/languages", get(list_languages))
        .route("/api/v1/projects/:owner/:repo", get(get_project))
        .route("/api/v1/projects/:owner/:repo/insights", get(get_project_insights))
}
