//! Statistics from the document store
//!
//! This module provides functionality for extracting and displaying
//! what previous runs left in the database.

use crate::storage::{DocumentStore, RunRecord, SnapshotStore, StorageResult};

/// Stored document statistics
#[derive(Debug, Clone)]
pub struct CatalogStatistics {
    /// Number of stored qualification documents
    pub qualification_count: u64,

    /// Number of stored module documents
    pub module_count: u64,

    /// Number of snapshotted HTTP responses
    pub cached_response_count: u64,

    /// Most recent run, if any
    pub latest_run: Option<RunRecord>,
}

/// Loads statistics from storage
pub fn load_statistics<S>(storage: &S) -> StorageResult<CatalogStatistics>
where
    S: DocumentStore + SnapshotStore,
{
    Ok(CatalogStatistics {
        qualification_count: storage.count_qualifications()?,
        module_count: storage.count_modules()?,
        cached_response_count: storage.count_cached_responses()?,
        latest_run: storage.get_latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CatalogStatistics) {
    println!("=== Catalog Statistics ===\n");

    println!("Documents:");
    println!("  Qualifications: {}", stats.qualification_count);
    println!("  Modules: {}", stats.module_count);
    println!("  Cached responses: {}", stats.cached_response_count);
    println!();

    match &stats.latest_run {
        Some(run) => {
            println!("Latest Run (#{}):", run.id);
            println!("  Status: {}", run.status.to_db_string());
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
            println!("  Qualifications: {}", run.qualification_count);
            println!("  Issues: {}", run.issue_count);
            println!("  Config hash: {}", run.config_hash);
        }
        None => println!("No runs recorded yet"),
    }
}
