//! Bootstrap configuration loading and root folder resolution
//!
//! TOML is the bootstrap layer: database location, port, logging, upstream
//! endpoints and pipeline tuning. Secrets may be overridden from the
//! environment by the service crate.
//!
//! # Config file priority
//! 1. Explicit path (command-line `--config`)
//! 2. `TRENDMINE_CONFIG` environment variable
//! 3. `~/.config/trendmine/trendmine.toml`
//! 4. Built-in defaults

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "TRENDMINE_CONFIG";

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV_VAR: &str = "TRENDMINE_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "trendmine.db";

/// Bootstrap configuration loaded from TOML
///
/// Every section is optional; missing keys take the built-in defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Root folder holding the database (optional)
    pub root_folder: Option<PathBuf>,

    /// Explicit database file path; overrides `<root_folder>/trendmine.db`
    pub database_path: Option<PathBuf>,

    /// HTTP server port
    pub port: u16,

    pub logging: LoggingConfig,
    pub openai: OpenAiConfig,
    pub github: GithubConfig,
    pub pipeline: PipelineConfig,
    pub api: ApiConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            database_path: None,
            port: 5730,
            logging: LoggingConfig::default(),
            openai: OpenAiConfig::default(),
            github: GithubConfig::default(),
            pipeline: PipelineConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// OpenAI-compatible chat completion endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    /// Upper bound on a single generation call
    pub timeout_secs: u64,
    pub max_tokens: u32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout_secs: 60,
            max_tokens: 1500,
        }
    }
}

/// GitHub Trending source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub token: Option<String>,
    pub base_url: String,
    pub requests_per_minute: u32,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: "https://github.com/trending".to_string(),
            requests_per_minute: 30,
        }
    }
}

/// Ingestion pipeline tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Trending language filters; empty means one unfiltered pass
    pub languages: Vec<String>,
    /// Languages insights are generated in
    pub analysis_languages: Vec<String>,
    /// daily, weekly or monthly
    pub time_range: String,
    pub scrape_interval_hours: u64,
    pub max_concurrent_enrichments: usize,
    /// Maximum time spent retrying a locked database write
    pub max_lock_wait_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            languages: Vec::new(),
            analysis_languages: vec!["en".to_string(), "zh".to_string()],
            time_range: "daily".to_string(),
            scrape_interval_hours: 24,
            max_concurrent_enrichments: 4,
            max_lock_wait_ms: 5000,
        }
    }
}

/// Read API limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub max_total_results: i64,
    pub max_single_request: i64,
    pub default_page_size: i64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            max_total_results: 100,
            max_single_request: 50,
            default_page_size: 20,
        }
    }
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;

    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Default per-user config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("trendmine").join("trendmine.toml"))
}

/// Load configuration following the documented priority order
///
/// An explicitly named file (argument or environment) must exist; the
/// per-user default is optional.
pub fn load_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    if let Some(path) = explicit {
        return load_toml_config(path);
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return load_toml_config(Path::new(&path));
    }

    if let Some(path) = default_config_path() {
        if path.exists() {
            tracing::info!("Loading config from {}", path.display());
            return load_toml_config(&path);
        }
    }

    tracing::debug!("No config file found, using built-in defaults");
    Ok(TomlConfig::default())
}

/// Root folder resolution:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// Database file for a resolved root folder
pub fn database_path(root_folder: &Path, config: &TomlConfig) -> PathBuf {
    config
        .database_path
        .clone()
        .unwrap_or_else(|| root_folder.join(DATABASE_FILE_NAME))
}

/// OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("trendmine"))
        .unwrap_or_else(|| PathBuf::from("./trendmine_data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = TomlConfig::default();
        assert_eq!(config.port, 5730);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.openai.model, "gpt-4");
        assert_eq!(config.pipeline.analysis_languages, vec!["en", "zh"]);
        assert_eq!(config.pipeline.scrape_interval_hours, 24);
        assert_eq!(config.api.max_total_results, 100);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            port = 9000

            [openai]
            model = "gpt-4o-mini"
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.openai.model, "gpt-4o-mini");
        assert_eq!(config.openai.base_url, "https://api.openai.com/v1");
        assert_eq!(config.pipeline.max_concurrent_enrichments, 4);
    }

    #[test]
    fn test_database_path_prefers_explicit_setting() {
        let mut config = TomlConfig::default();
        let root = Path::new("/srv/trendmine");
        assert_eq!(database_path(root, &config), root.join("trendmine.db"));

        config.database_path = Some(PathBuf::from("/tmp/other.db"));
        assert_eq!(database_path(root, &config), PathBuf::from("/tmp/other.db"));
    }

    #[test]
    fn test_cli_root_folder_wins() {
        let mut config = TomlConfig::default();
        config.root_folder = Some(PathBuf::from("/from/toml"));

        let resolved = resolve_root_folder(Some(Path::new("/from/cli")), &config);
        assert_eq!(resolved, PathBuf::from("/from/cli"));
    }
}
