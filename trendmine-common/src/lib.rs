//! # TrendMine Common Library
//!
//! Shared code for the TrendMine services:
//! - Error type and result alias
//! - Bootstrap TOML configuration and root folder resolution
//! - SQLite database initialization (projects and project insights schema)

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
