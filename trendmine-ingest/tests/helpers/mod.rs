//! Shared fixtures for trendmine-ingest integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use trendmine_common::config::TomlConfig;
use trendmine_common::db::{init_database, init_memory_database};
use trendmine_ingest::config::IngestConfig;
use trendmine_ingest::db::ProjectRepository;
use trendmine_ingest::models::{
    InsightFields, InsightPayload, Language, ProjectFacts, RawProject, TimeWindow,
};
use trendmine_ingest::services::{
    EnrichmentGenerator, EnrichmentOrchestrator, FetchError, LlmError, LlmProvider, Message,
    PipelineDriver, RunRequest, SourceFetcher,
};

/// File-backed database so several pools can race on it
pub async fn file_repository(dir: &TempDir) -> ProjectRepository {
    let pool = init_database(&dir.path().join("trendmine.db")).await.unwrap();
    ProjectRepository::new(pool, 5000)
}

pub async fn memory_repository() -> ProjectRepository {
    ProjectRepository::new(init_memory_database().await.unwrap(), 1000)
}

pub fn raw(owner: &str, name: &str, stars: i64) -> RawProject {
    RawProject {
        description: Some(format!("{} by {}", name, owner)),
        language: Some("Rust".to_string()),
        stars_count: stars,
        forks_count: stars / 10,
        ..RawProject::new(owner, name)
    }
}

/// Fetcher returning fixed pages per language filter
#[derive(Default)]
pub struct ScriptedFetcher {
    pages: Mutex<HashMap<String, Vec<RawProject>>>,
    failing: Mutex<HashSet<String>>,
    pub calls: AtomicUsize,
}

impl ScriptedFetcher {
    /// Requests for `filter` fail with a 503
    pub fn with_failure(self, filter: &str) -> Self {
        self.set_failure(filter);
        self
    }

    pub fn set_failure(&self, filter: &str) {
        self.failing.lock().unwrap().insert(filter.to_string());
    }

    pub fn with_page(self, filter: &str, projects: Vec<RawProject>) -> Self {
        self.set_page(filter, projects);
        self
    }

    pub fn set_page(&self, filter: &str, projects: Vec<RawProject>) {
        self.pages.lock().unwrap().insert(filter.to_string(), projects);
    }
}

#[async_trait]
impl SourceFetcher for ScriptedFetcher {
    async fn fetch(
        &self,
        language_filter: &str,
        _window: TimeWindow,
    ) -> Result<Vec<RawProject>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(language_filter) {
            return Err(FetchError::Status(503));
        }
        Ok(self
            .pages
            .lock()
            .unwrap()
            .get(language_filter)
            .cloned()
            .unwrap_or_default())
    }
}

/// Generator whose success can be switched between runs
pub struct SwitchGenerator {
    pub succeed: AtomicBool,
    pub calls: AtomicUsize,
    pub label: String,
    pub delay: Duration,
}

impl SwitchGenerator {
    pub fn new(label: &str, succeed: bool) -> Self {
        Self {
            succeed: AtomicBool::new(succeed),
            calls: AtomicUsize::new(0),
            label: label.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn fields(&self) -> InsightFields {
        InsightFields::from_fn(|section| format!("{}:{}", self.label, section.tag()))
    }
}

#[async_trait]
impl EnrichmentGenerator for SwitchGenerator {
    fn version(&self) -> &str {
        "switch"
    }

    async fn generate(&self, _facts: &ProjectFacts, language: Language) -> InsightPayload {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.succeed.load(Ordering::SeqCst) {
            InsightPayload::success(self.fields(), language, "switch")
        } else {
            InsightPayload::failed(language, "switch")
        }
    }
}

/// Provider replying with one fixed completion
pub struct FixedProvider {
    pub reply: Result<String, String>,
}

#[async_trait]
impl LlmProvider for FixedProvider {
    fn model(&self) -> &str {
        "fixed-model"
    }

    async fn complete(&self, _messages: Vec<Message>, _max_tokens: u32) -> Result<String, LlmError> {
        self.reply.clone().map_err(LlmError::Parse)
    }
}

pub fn driver(
    repo: &ProjectRepository,
    fetcher: Arc<dyn SourceFetcher>,
    generator: Arc<dyn EnrichmentGenerator>,
) -> PipelineDriver {
    let orchestrator = EnrichmentOrchestrator::new(repo.clone(), generator, 4);
    PipelineDriver::new(repo.clone(), fetcher, Arc::new(orchestrator))
}

pub fn run_request(filters: &[&str]) -> RunRequest {
    RunRequest {
        language_filters: filters.iter().map(|f| f.to_string()).collect(),
        time_range: TimeWindow::Daily,
        analysis_languages: vec![Language::En, Language::Zh],
    }
}

/// Resolved config with test-sized API limits
pub fn test_config(max_total_results: i64) -> IngestConfig {
    let mut toml = TomlConfig::default();
    toml.api.max_total_results = max_total_results;
    toml.api.max_single_request = 50;
    toml.api.default_page_size = 20;
    IngestConfig::resolve(toml, PathBuf::from("unused.db")).unwrap()
}
