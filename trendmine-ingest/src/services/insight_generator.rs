//! Enrichment generator
//!
//! Turns project facts into a five-section [`InsightPayload`]. Generation
//! never fails outward: transport errors, API errors, an unconfigured
//! provider and timeouts all become the localized failure payload.

use super::llm_client::{LlmProvider, Message};
use crate::models::{InsightFields, InsightPayload, InsightSection, Language, ProjectFacts};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[async_trait]
pub trait EnrichmentGenerator: Send + Sync {
    /// Identifier stored as `analysis_version`
    fn version(&self) -> &str;

    /// Always returns a fully populated payload for `language`
    async fn generate(&self, facts: &ProjectFacts, language: Language) -> InsightPayload;
}

/// Generator backed by a chat-completion model
pub struct LlmInsightGenerator {
    provider: Arc<dyn LlmProvider>,
    timeout: Duration,
    max_tokens: u32,
}

impl LlmInsightGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>, timeout: Duration, max_tokens: u32) -> Self {
        Self {
            provider,
            timeout,
            max_tokens,
        }
    }
}

#[async_trait]
impl EnrichmentGenerator for LlmInsightGenerator {
    fn version(&self) -> &str {
        self.provider.model()
    }

    async fn generate(&self, facts: &ProjectFacts, language: Language) -> InsightPayload {
        let messages = vec![
            Message::system(SYSTEM_PROMPT),
            Message::user(build_prompt(facts, language)),
        ];

        let call = self.provider.complete(messages, self.max_tokens);
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(text)) => {
                debug!(project = %facts.full_name, language = %language, "Model response received");
                parse_analysis_response(&text, language, self.version())
            }
            Ok(Err(e)) => {
                warn!(
                    project = %facts.full_name,
                    language = %language,
                    error = %e,
                    "Insight generation failed, using fallback"
                );
                InsightPayload::failed(language, self.version())
            }
            Err(_) => {
                warn!(
                    project = %facts.full_name,
                    language = %language,
                    timeout_secs = self.timeout.as_secs(),
                    "Insight generation timed out, using fallback"
                );
                InsightPayload::failed(language, self.version())
            }
        }
    }
}

const SYSTEM_PROMPT: &str = "You are a startup advisor and technical analyst who evaluates \
     open-source projects for business value and startup opportunities.";

/// User prompt asking for the five tagged sections
pub fn build_prompt(facts: &ProjectFacts, language: Language) -> String {
    let answer_language = match language {
        Language::En => "Write the analysis in English.",
        Language::Zh => "Write the analysis in Chinese.",
    };

    let mut sections = String::new();
    for section in InsightSection::ALL {
        sections.push_str(&format!("  <{tag}>...</{tag}>\n", tag = section.tag()));
    }

    format!(
        "Analyze this GitHub project for business value and startup opportunities.\n\n\
         Project: {name}\n\
         Description: {description}\n\
         Language: {lang}\n\
         Stars: {stars}\n\
         Forks: {forks}\n\n\
         Cover: the problem it solves and its business value; the target market and its \
         growth potential; startup directions or business models built on it; the main users \
         or customers; competitors and this project's advantage.\n\n\
         {answer_language}\n\n\
         Reply with exactly this XML structure:\n\
         <analysis>\n{sections}</analysis>\n",
        name = facts.full_name,
        description = facts.description.as_deref().unwrap_or("(none)"),
        lang = facts.language.as_deref().unwrap_or("unknown"),
        stars = facts.stars_count,
        forks = facts.forks_count,
    )
}

static FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:xml)?\s*(.*?)\s*```").expect("hardcoded regex"));

static SECTION_RES: Lazy<Vec<(InsightSection, Regex)>> = Lazy::new(|| {
    InsightSection::ALL
        .iter()
        .map(|section| {
            let pattern = format!(r"(?s)<{tag}>(.*?)</{tag}>", tag = section.tag());
            (*section, Regex::new(&pattern).expect("hardcoded regex"))
        })
        .collect()
});

/// Parse model output into a success payload
///
/// The first fenced block is used when present. Missing or blank sections
/// get the language's default text; that is not a failure.
pub fn parse_analysis_response(text: &str, language: Language, version: &str) -> InsightPayload {
    let trimmed = text.trim();
    let body = FENCE_RE
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map_or(trimmed, |m| m.as_str());

    let fields = InsightFields::from_fn(|section| {
        extract_section(body, section)
            .unwrap_or_else(|| section.missing_text(language).to_string())
    });

    InsightPayload::success(fields, language, version)
}

fn extract_section(body: &str, section: InsightSection) -> Option<String> {
    SECTION_RES
        .iter()
        .find(|(s, _)| *s == section)
        .and_then(|(_, re)| re.captures(body))
        .map(|c| c[1].trim().to_string())
        .filter(|content| !content.is_empty())
}
