//! Common error types for TrendMine

use thiserror::Error;

/// Common result type for TrendMine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across TrendMine services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when the database rejected a write because of a UNIQUE constraint,
    /// i.e. a concurrent writer created the same logical key first.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Error::Database(err) => err
                .as_database_error()
                .map(|db_err| db_err.is_unique_violation())
                .unwrap_or(false),
            _ => false,
        }
    }

    /// True for transient SQLite contention ("database is locked" / busy).
    pub fn is_lock_error(&self) -> bool {
        match self {
            Error::Database(err) => {
                let message = err.to_string();
                message.contains("database is locked") || message.contains("database is busy")
            }
            _ => false,
        }
    }
}
