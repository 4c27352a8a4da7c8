//! Output module for storing crawl results and reporting on them
//!
//! This module handles:
//! - Upserting a crawl outcome into the document store
//! - Printing the end-of-run summary and issue report
//! - Statistics over previously stored data

pub mod stats;

pub use stats::{load_statistics, print_statistics, CatalogStatistics};

use crate::crawler::CrawlOutcome;
use crate::storage::{DocumentStore, StorageResult};

/// Number of documents written by [`store_outcome`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSummary {
    pub qualifications: usize,
    pub modules: usize,
}

/// Upserts every qualification and the deduplicated module list
///
/// Documents are keyed by URL, so storing the same outcome twice leaves the
/// store unchanged.
pub fn store_outcome<S: DocumentStore>(
    storage: &mut S,
    outcome: &CrawlOutcome,
) -> StorageResult<StoreSummary> {
    let qualifications = storage.upsert_qualifications(&outcome.qualifications)?;
    let modules = storage.upsert_modules(&outcome.modules)?;
    tracing::info!(
        "Stored {} qualifications and {} modules",
        qualifications,
        modules
    );
    Ok(StoreSummary {
        qualifications,
        modules,
    })
}

/// Prints the end-of-run summary, including every logged issue
pub fn print_crawl_summary(outcome: &CrawlOutcome) {
    println!("=== Crawl Summary ===\n");
    println!("Qualifications assembled: {}", outcome.qualifications.len());
    println!("Distinct modules referenced: {}", outcome.modules.len());
    println!("Distinct group headings: {}", outcome.headings.len());
    println!();

    if !outcome.has_issues() {
        println!("No issues logged");
        return;
    }

    println!("Issues ({}):", outcome.issues.len());
    for (kind, count) in outcome.issue_summary() {
        println!("  {}: {}", kind, count);
    }
    println!();

    for issue in &outcome.issues {
        println!("  - {}", issue);
    }
}
