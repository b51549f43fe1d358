//! Project models
//!
//! A project is identified by `owner/name`. The Source Fetcher produces
//! [`RawProject`] candidates; the repository turns them into stored
//! [`Project`] rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use trendmine_common::Error;

/// Trending time window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl TimeWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeWindow::Daily => "daily",
            TimeWindow::Weekly => "weekly",
            TimeWindow::Monthly => "monthly",
        }
    }

    /// `since` query value; daily is the page default and has none
    pub fn since_param(&self) -> Option<&'static str> {
        match self {
            TimeWindow::Daily => None,
            TimeWindow::Weekly => Some("weekly"),
            TimeWindow::Monthly => Some("monthly"),
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeWindow {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(TimeWindow::Daily),
            "weekly" => Ok(TimeWindow::Weekly),
            "monthly" => Ok(TimeWindow::Monthly),
            other => Err(Error::InvalidInput(format!(
                "Unsupported time range '{}' (expected daily, weekly or monthly)",
                other
            ))),
        }
    }
}

/// Candidate project as scraped from the trending page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawProject {
    pub name: String,
    pub owner: String,
    pub description: Option<String>,
    /// Programming language as shown on the listing
    pub language: Option<String>,
    pub stars_count: i64,
    pub forks_count: i64,
}

impl RawProject {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
            description: None,
            language: None,
            stars_count: 0,
            forks_count: 0,
        }
    }

    /// Natural identity (`owner/name`)
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    pub fn repository_url(&self) -> String {
        format!("https://github.com/{}/{}", self.owner, self.name)
    }
}

/// Persisted project row
#[derive(Debug, Clone, Serialize)]
pub struct Project {
    pub id: i64,
    pub owner: String,
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub repository_url: String,
    pub homepage_url: Option<String>,
    pub language: Option<String>,
    pub stars_count: i64,
    pub forks_count: i64,
    pub trending_date: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Facts handed to the enrichment generator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectFacts {
    pub full_name: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub stars_count: i64,
    pub forks_count: i64,
}

impl From<&Project> for ProjectFacts {
    fn from(project: &Project) -> Self {
        Self {
            full_name: project.full_name.clone(),
            description: project.description.clone(),
            language: project.language.clone(),
            stars_count: project.stars_count,
            forks_count: project.forks_count,
        }
    }
}
