//! Insight models
//!
//! An insight is the five-section business analysis of one project in one
//! language. Stored insights are unique per (project, language).
//! [`InsightLookup`] keeps stored rows and non-persisted placeholders apart
//! so a caller can never mistake one for the other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use trendmine_common::Error;

/// Output language of an insight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Zh,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::En, Language::Zh];

    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Zh => "zh",
        }
    }

    /// Parse a list of codes, rejecting the first unsupported one
    pub fn parse_list<S: AsRef<str>>(codes: &[S]) -> Result<Vec<Language>, Error> {
        let mut languages = Vec::with_capacity(codes.len());
        for code in codes {
            let language = code.as_ref().parse::<Language>()?;
            if !languages.contains(&language) {
                languages.push(language);
            }
        }
        Ok(languages)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Language::En),
            "zh" => Ok(Language::Zh),
            other => Err(Error::InvalidInput(format!(
                "Unsupported insight language '{}' (expected en or zh)",
                other
            ))),
        }
    }
}

/// Outcome of an analysis attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Success,
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Success => "success",
            AnalysisStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(AnalysisStatus::Success),
            "failed" => Ok(AnalysisStatus::Failed),
            other => Err(Error::Internal(format!("Unknown analysis status '{}'", other))),
        }
    }
}

/// The five named sections of an analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsightSection {
    BusinessValue,
    MarketOpportunity,
    StartupIdeas,
    TargetAudience,
    CompetitionAnalysis,
}

impl InsightSection {
    pub const ALL: [InsightSection; 5] = [
        InsightSection::BusinessValue,
        InsightSection::MarketOpportunity,
        InsightSection::StartupIdeas,
        InsightSection::TargetAudience,
        InsightSection::CompetitionAnalysis,
    ];

    /// Delimiter tag used in model output
    pub fn tag(&self) -> &'static str {
        match self {
            InsightSection::BusinessValue => "business_value",
            InsightSection::MarketOpportunity => "market_opportunity",
            InsightSection::StartupIdeas => "startup_ideas",
            InsightSection::TargetAudience => "target_audience",
            InsightSection::CompetitionAnalysis => "competition_analysis",
        }
    }

    /// Placeholder for a section the model left out or left empty
    pub fn missing_text(&self, language: Language) -> &'static str {
        match (language, self) {
            (Language::En, InsightSection::BusinessValue) => {
                "Unable to determine the business value of this project."
            }
            (Language::En, InsightSection::MarketOpportunity) => {
                "Market opportunities need further evaluation."
            }
            (Language::En, InsightSection::StartupIdeas) => {
                "No startup ideas based on this project for now."
            }
            (Language::En, InsightSection::TargetAudience) => "Target users need further research.",
            (Language::En, InsightSection::CompetitionAnalysis) => {
                "Competitive situation needs in-depth analysis."
            }
            (Language::Zh, InsightSection::BusinessValue) => "无法确定该项目的商业价值。",
            (Language::Zh, InsightSection::MarketOpportunity) => "市场机会需要进一步评估。",
            (Language::Zh, InsightSection::StartupIdeas) => "暂时没有基于该项目的创业想法。",
            (Language::Zh, InsightSection::TargetAudience) => "目标用户需要进一步调研。",
            (Language::Zh, InsightSection::CompetitionAnalysis) => "竞争情况需要深入分析。",
        }
    }

    /// Text stored when the generation call itself failed
    pub fn failure_text(&self, language: Language) -> &'static str {
        match (language, self) {
            (Language::En, InsightSection::BusinessValue) => {
                "Unable to analyze the business value of this project."
            }
            (Language::En, InsightSection::MarketOpportunity) => {
                "Unable to evaluate market opportunities."
            }
            (Language::En, InsightSection::StartupIdeas) => "Unable to generate startup ideas.",
            (Language::En, InsightSection::TargetAudience) => "Unable to identify target users.",
            (Language::En, InsightSection::CompetitionAnalysis) => {
                "Unable to analyze competitive situation."
            }
            (Language::Zh, InsightSection::BusinessValue) => "无法分析该项目的商业价值。",
            (Language::Zh, InsightSection::MarketOpportunity) => "无法评估市场机会。",
            (Language::Zh, InsightSection::StartupIdeas) => "无法生成创业想法。",
            (Language::Zh, InsightSection::TargetAudience) => "无法确定目标用户。",
            (Language::Zh, InsightSection::CompetitionAnalysis) => "无法分析竞争情况。",
        }
    }

    /// Text of a transient (never stored) placeholder
    pub fn transient_text(&self, language: Language) -> &'static str {
        match (language, self) {
            (Language::En, InsightSection::BusinessValue) => {
                "Cannot analyze project, please try again later"
            }
            (Language::En, _) => "No data, please try again later",
            (Language::Zh, InsightSection::BusinessValue) => "暂时无法分析该项目，请稍后再试",
            (Language::Zh, _) => "暂无数据，请稍后再试",
        }
    }
}

/// The five text sections
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightFields {
    pub business_value: String,
    pub market_opportunity: String,
    pub startup_ideas: String,
    pub target_audience: String,
    pub competition_analysis: String,
}

impl InsightFields {
    /// Build every section from a per-section function
    pub fn from_fn(mut section_text: impl FnMut(InsightSection) -> String) -> Self {
        Self {
            business_value: section_text(InsightSection::BusinessValue),
            market_opportunity: section_text(InsightSection::MarketOpportunity),
            startup_ideas: section_text(InsightSection::StartupIdeas),
            target_audience: section_text(InsightSection::TargetAudience),
            competition_analysis: section_text(InsightSection::CompetitionAnalysis),
        }
    }

    pub fn failure_fallback(language: Language) -> Self {
        Self::from_fn(|section| section.failure_text(language).to_string())
    }

    pub fn transient(language: Language) -> Self {
        Self::from_fn(|section| section.transient_text(language).to_string())
    }

    pub fn get(&self, section: InsightSection) -> &str {
        match section {
            InsightSection::BusinessValue => &self.business_value,
            InsightSection::MarketOpportunity => &self.market_opportunity,
            InsightSection::StartupIdeas => &self.startup_ideas,
            InsightSection::TargetAudience => &self.target_audience,
            InsightSection::CompetitionAnalysis => &self.competition_analysis,
        }
    }
}

/// Generator output, always fully populated
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsightPayload {
    #[serde(flatten)]
    pub fields: InsightFields,
    pub status: AnalysisStatus,
    pub language: Language,
    /// Generator identifier (model name)
    pub analysis_version: String,
}

impl InsightPayload {
    pub fn success(fields: InsightFields, language: Language, analysis_version: &str) -> Self {
        Self {
            fields,
            status: AnalysisStatus::Success,
            language,
            analysis_version: analysis_version.to_string(),
        }
    }

    /// Deterministic payload for a failed generation
    pub fn failed(language: Language, analysis_version: &str) -> Self {
        Self {
            fields: InsightFields::failure_fallback(language),
            status: AnalysisStatus::Failed,
            language,
            analysis_version: analysis_version.to_string(),
        }
    }
}

/// Stored insight row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Insight {
    pub id: i64,
    pub project_id: i64,
    pub language: Language,
    #[serde(flatten)]
    pub fields: InsightFields,
    pub analysis_version: String,
    pub analysis_status: AnalysisStatus,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Insight {
    pub fn is_success(&self) -> bool {
        self.analysis_status == AnalysisStatus::Success
    }
}

/// Placeholder returned when nothing could be persisted; has no id
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransientInsight {
    pub project_id: i64,
    pub language: Language,
    #[serde(flatten)]
    pub fields: InsightFields,
    pub analysis_version: String,
    pub analysis_status: AnalysisStatus,
    pub created_at: DateTime<Utc>,
    /// Why nothing was stored
    pub reason: String,
}

impl TransientInsight {
    pub fn new(project_id: i64, language: Language, reason: impl Into<String>) -> Self {
        Self {
            project_id,
            language,
            fields: InsightFields::transient(language),
            analysis_version: "unknown".to_string(),
            analysis_status: AnalysisStatus::Failed,
            created_at: Utc::now(),
            reason: reason.into(),
        }
    }
}

/// Result of the on-demand read path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InsightLookup {
    Stored(Insight),
    Transient(TransientInsight),
}

impl InsightLookup {
    pub fn status(&self) -> AnalysisStatus {
        match self {
            InsightLookup::Stored(insight) => insight.analysis_status,
            InsightLookup::Transient(transient) => transient.analysis_status,
        }
    }

    pub fn is_stored(&self) -> bool {
        matches!(self, InsightLookup::Stored(_))
    }
}

/// How `get_or_create_insight` reached its result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightOutcome {
    /// A success row already existed; the producer was not invoked
    Existing,
    Created,
    Updated,
    /// A concurrent writer inserted first; its row was overwritten
    RecoveredConflict,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_parsing() {
        assert_eq!("en".parse::<Language>().unwrap(), Language::En);
        assert_eq!(" ZH ".parse::<Language>().unwrap(), Language::Zh);
        assert!("fr".parse::<Language>().is_err());
    }

    #[test]
    fn test_parse_list_dedupes() {
        let languages = Language::parse_list(&["en", "zh", "en"]).unwrap();
        assert_eq!(languages, vec![Language::En, Language::Zh]);
        assert!(Language::parse_list(&["en", "de"]).is_err());
    }

    #[test]
    fn test_failure_fallback_is_complete() {
        for language in Language::ALL {
            let payload = InsightPayload::failed(language, "gpt-4");
            assert_eq!(payload.status, AnalysisStatus::Failed);
            for section in InsightSection::ALL {
                assert!(!payload.fields.get(section).trim().is_empty());
            }
        }
    }

    #[test]
    fn test_transient_lookup_serializes_with_kind() {
        let lookup = InsightLookup::Transient(TransientInsight::new(7, Language::En, "storage offline"));
        let json = serde_json::to_value(&lookup).unwrap();

        assert_eq!(json["kind"], "transient");
        assert_eq!(json["analysis_status"], "failed");
        assert_eq!(json["language"], "en");
        assert_eq!(json["project_id"], 7);
        assert!(json.get("id").is_none());
        assert_eq!(json["business_value"], "Cannot analyze project, please try again later");
    }
}
