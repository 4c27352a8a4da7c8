//! Storage traits and error types
//!
//! The crawl core only sees two narrow collaborators: a snapshot store that
//! restores and persists crawl state between runs, and a document store that
//! receives finished records keyed by URL.

use crate::crawler::FetchResult;
use crate::model::{Module, Qualification};
use crate::storage::{RunRecord, RunStatus};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable crawl state: fetched responses and parsed modules
pub trait SnapshotStore {
    /// Loads every snapshotted response keyed by URL
    fn load_responses(&self) -> StorageResult<HashMap<String, FetchResult>>;

    /// Persists responses, replacing any previous snapshot of the same URL
    ///
    /// Transport errors carry no response and are skipped.
    fn save_responses(&mut self, entries: &[(String, FetchResult)]) -> StorageResult<()>;

    /// Loads every snapshotted module keyed by URL
    fn load_modules(&self) -> StorageResult<HashMap<String, Module>>;

    /// Persists modules, replacing any previous snapshot of the same URL
    fn save_modules(&mut self, modules: &[Arc<Module>]) -> StorageResult<()>;

    /// Drops both snapshots
    fn clear_snapshots(&mut self) -> StorageResult<()>;

    /// Number of snapshotted responses
    fn count_cached_responses(&self) -> StorageResult<u64>;
}

/// Published documents and run bookkeeping
pub trait DocumentStore {
    // ===== Documents =====

    /// Replaces the qualification stored under its URL, or inserts it
    fn upsert_qualification(&mut self, qualification: &Qualification) -> StorageResult<()>;

    /// Replaces the module stored under its URL, or inserts it
    fn upsert_module(&mut self, module: &Module) -> StorageResult<()>;

    /// Upserts a batch of qualifications in one transaction
    fn upsert_qualifications(&mut self, qualifications: &[Qualification]) -> StorageResult<usize>;

    /// Upserts a batch of modules in one transaction
    fn upsert_modules(&mut self, modules: &[Arc<Module>]) -> StorageResult<usize>;

    /// Loads a stored qualification document as raw JSON
    fn get_qualification_document(&self, url: &str) -> StorageResult<Option<serde_json::Value>>;

    /// Loads a stored module
    fn get_module(&self, url: &str) -> StorageResult<Option<Module>>;

    fn count_qualifications(&self) -> StorageResult<u64>;

    fn count_modules(&self) -> StorageResult<u64>;

    // ===== Run Management =====

    /// Creates a new crawl run and returns its ID
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Marks a run as completed with its totals
    fn complete_run(
        &mut self,
        run_id: i64,
        qualification_count: usize,
        issue_count: usize,
    ) -> StorageResult<()>;

    /// Marks a run as failed
    fn fail_run(&mut self, run_id: i64) -> StorageResult<()>;

    /// Returns the current status of a run
    fn run_status(&self, run_id: i64) -> StorageResult<RunStatus> {
        Ok(self.get_run(run_id)?.status)
    }
}
