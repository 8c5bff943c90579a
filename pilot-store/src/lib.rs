//! pilot-store: SQLite task table, small key/value marks, stats and backups.

pub mod backup;
pub mod connection;
pub mod error;
pub mod migrations;
pub mod stats;
pub mod store;
pub mod task_repo;

pub use backup::{BackupInfo, Backups};
pub use error::{ErrorCode, Result, StoreError};
pub use stats::TaskStats;
pub use store::{SqliteStore, TaskStore};

/// kv key holding the local date (YYYY-MM-DD) of the last hand-run weekly review.
pub const WEEKLY_REVIEW_MANUAL_KEY: &str = "weekly_review_manual";
