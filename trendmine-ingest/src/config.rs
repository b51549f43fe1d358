//! Configuration resolution for trendmine-ingest
//!
//! Turns the bootstrap [`TomlConfig`] into the explicit settings each
//! component receives at construction. Secrets and endpoints resolve with
//! ENV → TOML priority.

use crate::models::{Language, TimeWindow};
use crate::services::RunRequest;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use trendmine_common::config::{ApiConfig, GithubConfig, OpenAiConfig, TomlConfig};
use trendmine_common::{Error, Result};

pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const OPENAI_MODEL_ENV: &str = "OPENAI_MODEL";
pub const OPENAI_BASE_URL_ENV: &str = "OPENAI_BASE_URL";
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Pipeline settings with languages and durations already parsed
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub language_filters: Vec<String>,
    pub analysis_languages: Vec<Language>,
    pub time_range: TimeWindow,
    pub scrape_interval: Duration,
    pub max_concurrent_enrichments: usize,
    pub max_lock_wait_ms: u64,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub port: u16,
    pub database_path: PathBuf,
    pub log_level: String,
    pub openai: OpenAiConfig,
    pub github: GithubConfig,
    pub pipeline: PipelineSettings,
    pub api: ApiConfig,
}

impl IngestConfig {
    /// Resolve from TOML plus the process environment
    pub fn resolve(toml: TomlConfig, database_path: PathBuf) -> Result<Self> {
        let mut openai = toml.openai;
        openai.api_key = resolve_value("OpenAI API key", OPENAI_API_KEY_ENV, openai.api_key);
        if let Some(model) = resolve_value("OpenAI model", OPENAI_MODEL_ENV, None) {
            openai.model = model;
        }
        if let Some(base_url) = resolve_value("OpenAI base URL", OPENAI_BASE_URL_ENV, None) {
            openai.base_url = base_url;
        }

        let mut github = toml.github;
        github.token = resolve_value("GitHub token", GITHUB_TOKEN_ENV, github.token);

        let pipeline = &toml.pipeline;
        let analysis_languages = Language::parse_list(&pipeline.analysis_languages)?;
        if analysis_languages.is_empty() {
            return Err(Error::Config(
                "pipeline.analysis_languages must name at least one language".to_string(),
            ));
        }
        if pipeline.scrape_interval_hours == 0 {
            return Err(Error::Config(
                "pipeline.scrape_interval_hours must be at least 1".to_string(),
            ));
        }

        let api = toml.api;
        if api.max_single_request < 1 || api.default_page_size < 1 || api.max_total_results < 1 {
            return Err(Error::Config("api limits must be positive".to_string()));
        }

        Ok(Self {
            port: toml.port,
            database_path,
            log_level: toml.logging.level,
            pipeline: PipelineSettings {
                language_filters: pipeline.languages.clone(),
                analysis_languages,
                time_range: pipeline.time_range.parse()?,
                scrape_interval: Duration::from_secs(pipeline.scrape_interval_hours * 3600),
                max_concurrent_enrichments: pipeline.max_concurrent_enrichments.max(1),
                max_lock_wait_ms: pipeline.max_lock_wait_ms,
            },
            openai,
            github,
            api,
        })
    }

    pub fn openai_configured(&self) -> bool {
        self.openai
            .api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty())
    }

    /// The run the scheduler performs
    pub fn default_run_request(&self) -> RunRequest {
        RunRequest {
            language_filters: self.pipeline.language_filters.clone(),
            time_range: self.pipeline.time_range,
            analysis_languages: self.pipeline.analysis_languages.clone(),
        }
    }
}

/// ENV → TOML; blank values count as unset
fn resolve_value(label: &str, env_var: &str, toml_value: Option<String>) -> Option<String> {
    let env_value = std::env::var(env_var).ok().filter(|v| !v.trim().is_empty());
    let toml_value = toml_value.filter(|v| !v.trim().is_empty());

    match (env_value, toml_value) {
        (Some(env), Some(_)) => {
            warn!(
                "{} found in both {} and TOML config. Using environment (higher priority).",
                label, env_var
            );
            Some(env)
        }
        (Some(env), None) => {
            info!("{} loaded from environment variable", label);
            Some(env)
        }
        (None, Some(toml)) => {
            info!("{} loaded from TOML config", label);
            Some(toml)
        }
        (None, None) => None,
    }
}
