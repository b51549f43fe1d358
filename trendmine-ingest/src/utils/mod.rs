//! Utility modules for trendmine-ingest

pub mod db_retry;
pub mod key_lock;

pub use db_retry::retry_on_lock;
pub use key_lock::KeyedLocks;
