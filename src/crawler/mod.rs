//! Crawler module for catalog fetching and extraction
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching behind a single-flight response cache
//! - HTML extraction of qualifications, module links and modules
//! - Heading normalization for module groups
//! - The module registry shared across qualifications
//! - Overall crawl coordination and issue collection

mod coordinator;
mod fetcher;
mod headings;
mod issues;
mod parser;
mod registry;

pub use coordinator::{crawl, Coordinator, CrawlOutcome};
pub use fetcher::{build_http_client, fetch_url, FetchCache, FetchResult};
pub use headings::normalize_heading;
pub use issues::{ExtractError, Issue, IssueKind, IssueLog};
pub use parser::{
    clean_title, extract_qualification_links, parse_module_page, parse_qualification_page,
    GroupLinks, LevelLinks, ModuleLink, ModulePage, QualificationPage,
};
pub use registry::ModuleRegistry;
