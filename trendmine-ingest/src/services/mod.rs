//! Ingestion and enrichment services

pub mod enrichment_orchestrator;
pub mod insight_generator;
pub mod llm_client;
pub mod pipeline;
pub mod reconciler;
pub mod scheduler;
pub mod trending_fetcher;

pub use enrichment_orchestrator::{EnrichmentOrchestrator, UnitOutcome, UnitReport};
pub use insight_generator::{parse_analysis_response, EnrichmentGenerator, LlmInsightGenerator};
pub use llm_client::{LlmError, LlmProvider, Message, OpenAiProvider, Role};
pub use pipeline::{PipelineDriver, RunRequest, RunStatistics};
pub use reconciler::{EnrichmentTarget, ReconcileOutcome, Reconciler};
pub use scheduler::Scheduler;
pub use trending_fetcher::{
    parse_count, parse_trending_html, FetchError, GithubTrendingFetcher, SourceFetcher,
};
