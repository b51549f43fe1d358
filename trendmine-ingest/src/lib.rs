//! trendmine-ingest library interface
//!
//! GitHub Trending ingestion with LLM enrichment: the pipeline components,
//! the HTTP API over them and the wiring used by the binary and the
//! integration tests.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use crate::config::IngestConfig;
use crate::db::ProjectRepository;
use crate::services::{
    EnrichmentOrchestrator, GithubTrendingFetcher, LlmInsightGenerator, OpenAiProvider,
    PipelineDriver,
};
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use trendmine_common::{Error, Result};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub repo: ProjectRepository,
    pub driver: Arc<PipelineDriver>,
    pub config: Arc<IngestConfig>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last run failure, reported by /health
    pub last_error: Arc<RwLock<Option<String>>>,
    /// Set while an admin-triggered job runs
    pub admin_job_active: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(repo: ProjectRepository, driver: Arc<PipelineDriver>, config: Arc<IngestConfig>) -> Self {
        Self {
            repo,
            driver,
            config,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
            admin_job_active: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Wire the production fetcher and generator into a pipeline driver
pub fn build_driver(config: &IngestConfig, repo: ProjectRepository) -> Result<PipelineDriver> {
    let fetcher = GithubTrendingFetcher::new(&config.github)
        .map_err(|e| Error::Internal(format!("GitHub client setup failed: {}", e)))?;

    let provider = OpenAiProvider::new(
        config.openai.api_key.clone(),
        config.openai.model.clone(),
        config.openai.base_url.clone(),
    );
    let generator = LlmInsightGenerator::new(
        Arc::new(provider),
        Duration::from_secs(config.openai.timeout_secs),
        config.openai.max_tokens,
    );

    let orchestrator = EnrichmentOrchestrator::new(
        repo.clone(),
        Arc::new(generator),
        config.pipeline.max_concurrent_enrichments,
    );

    Ok(PipelineDriver::new(repo, Arc::new(fetcher), Arc::new(orchestrator)))
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::project_routes())
        .merge(api::admin_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
