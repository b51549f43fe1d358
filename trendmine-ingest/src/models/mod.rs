//! Domain models for trending projects and their insights

pub mod insight;
pub mod project;

pub use insight::{
    AnalysisStatus, Insight, InsightFields, InsightLookup, InsightOutcome, InsightPayload,
    InsightSection, Language, TransientInsight,
};
pub use project::{Project, ProjectFacts, RawProject, TimeWindow};
