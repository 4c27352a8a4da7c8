//! Storage module for persisting crawl results and crawl state
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Upserting qualification and module documents keyed by URL
//! - Snapshotting the response cache and module registry between runs
//! - Run tracking

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{DocumentStore, SnapshotStore, StorageError, StorageResult};

use crate::CatalogError;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Storage handle shared between the coordinator and its caches
pub type SharedStorage = Arc<Mutex<SqliteStorage>>;

/// Opens (or creates) the database and wraps it for sharing
pub fn open_storage(path: &Path) -> Result<SharedStorage, CatalogError> {
    Ok(Arc::new(Mutex::new(SqliteStorage::new(path)?)))
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub qualification_count: u64,
    pub issue_count: u64,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
