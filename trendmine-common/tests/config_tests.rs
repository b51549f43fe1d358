//! Configuration loading and root folder resolution tests
//!
//! Tests that touch TRENDMINE_* environment variables are #[serial] so they
//! never observe each other's values.

use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use trendmine_common::config::{
    load_config, load_toml_config, resolve_root_folder, TomlConfig, CONFIG_ENV_VAR,
    ROOT_FOLDER_ENV_VAR,
};

#[test]
fn test_load_full_toml_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("trendmine.toml");
    std::fs::write(
        &path,
        r#"
        root_folder = "/srv/trendmine"
        port = 6000

        [logging]
        level = "debug"

        [github]
        token = "gh-token"

        [pipeline]
        languages = ["rust", "python"]
        analysis_languages = ["en"]
        time_range = "weekly"
        max_concurrent_enrichments = 8

        [api]
        default_page_size = 10
        "#,
    )
    .unwrap();

    let config = load_toml_config(&path).unwrap();

    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/trendmine")));
    assert_eq!(config.port, 6000);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.github.token.as_deref(), Some("gh-token"));
    assert_eq!(config.pipeline.languages, vec!["rust", "python"]);
    assert_eq!(config.pipeline.analysis_languages, vec!["en"]);
    assert_eq!(config.pipeline.time_range, "weekly");
    assert_eq!(config.pipeline.max_concurrent_enrichments, 8);
    assert_eq!(config.api.default_page_size, 10);
    assert_eq!(config.api.max_single_request, 50);
}

#[test]
fn test_malformed_toml_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.toml");
    std::fs::write(&path, "port = \"not a number\"").unwrap();

    let err = load_toml_config(&path).unwrap_err();
    assert!(matches!(err, trendmine_common::Error::Config(_)));
}

#[test]
fn test_explicit_missing_file_is_error() {
    let result = load_config(Some(Path::new("/definitely/not/here/trendmine.toml")));
    assert!(result.is_err());
}

#[test]
#[serial]
fn test_config_env_var_is_used() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("env.toml");
    std::fs::write(&path, "port = 7100").unwrap();

    env::set_var(CONFIG_ENV_VAR, &path);
    let config = load_config(None);
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.unwrap().port, 7100);
}

#[test]
#[serial]
fn test_root_folder_env_beats_toml() {
    let mut config = TomlConfig::default();
    config.root_folder = Some(PathBuf::from("/from/toml"));

    env::set_var(ROOT_FOLDER_ENV_VAR, "/from/env");
    let resolved = resolve_root_folder(None, &config);
    env::remove_var(ROOT_FOLDER_ENV_VAR);

    assert_eq!(resolved, PathBuf::from("/from/env"));
}

#[test]
#[serial]
fn test_root_folder_falls_back_to_toml_then_default() {
    env::remove_var(ROOT_FOLDER_ENV_VAR);

    let mut config = TomlConfig::default();
    config.root_folder = Some(PathBuf::from("/from/toml"));
    assert_eq!(resolve_root_folder(None, &config), PathBuf::from("/from/toml"));

    let default = resolve_root_folder(None, &TomlConfig::default());
    assert!(!default.as_os_str().is_empty());
}
