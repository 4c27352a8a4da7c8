//! Crawler coordinator - main crawl orchestration logic
//!
//! This module drives a whole run:
//! - Restoring (or clearing) snapshots from a previous run
//! - Discovering qualification links on the catalog index
//! - Fanning qualification pages out over a bounded task pool
//! - Resolving each group's modules through the registry and fetch cache
//! - Collecting results, issues and final snapshots

use crate::config::{Config, CrawlerConfig};
use crate::crawler::fetcher::{build_http_client, FetchCache, FetchResult};
use crate::crawler::issues::{Issue, IssueKind, IssueLog};
use crate::crawler::parser::{
    extract_qualification_links, parse_module_page, parse_qualification_page, GroupLinks,
    ModuleLink, ModulePage, QualificationPage,
};
use crate::crawler::registry::ModuleRegistry;
use crate::model::{Module, ModuleGroup, ModuleLevel, Qualification};
use crate::state::QualificationState;
use crate::storage::{SharedStorage, SnapshotStore};
use crate::url::parse_host;
use crate::{CatalogError, Result};
use futures::stream::{self, StreamExt};
use rand::seq::SliceRandom;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use url::Url;

/// Everything a run produced
#[derive(Debug, Clone, Default)]
pub struct CrawlOutcome {
    /// Assembled qualifications, in completion order
    pub qualifications: Vec<Qualification>,

    /// Every module referenced by some qualification, once each, sorted by URL
    pub modules: Vec<Arc<Module>>,

    /// Issues in the order they were logged
    pub issues: Vec<Issue>,

    /// Distinct normalized group headings encountered
    pub headings: Vec<String>,
}

impl CrawlOutcome {
    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    /// Issue counts per kind
    pub fn issue_summary(&self) -> BTreeMap<IssueKind, usize> {
        let mut summary = BTreeMap::new();
        for issue in &self.issues {
            *summary.entry(issue.kind).or_insert(0) += 1;
        }
        summary
    }
}

/// Main crawler coordinator structure
///
/// Cloning is cheap; clones share the cache, registry and issue log, which is
/// how each spawned qualification task gets its handle.
#[derive(Clone)]
pub struct Coordinator {
    config: Arc<CrawlerConfig>,
    host: Arc<Url>,
    cache: Arc<FetchCache>,
    registry: Arc<ModuleRegistry>,
    issues: IssueLog,
    headings: Arc<Mutex<BTreeSet<String>>>,
}

impl Coordinator {
    /// Creates a coordinator backed by `storage`
    ///
    /// Unless `fresh` is set, cached responses and modules from earlier runs are
    /// restored so they are not fetched again. With `fresh`, those snapshots are
    /// cleared first.
    pub fn new(config: &Config, storage: Option<SharedStorage>, fresh: bool) -> Result<Self> {
        let client = build_http_client(&config.http)?;
        let flush_interval = config.crawler.cache_flush_interval;
        let cache = Arc::new(FetchCache::new(client, storage.clone(), flush_interval));
        let registry = Arc::new(ModuleRegistry::new(storage.clone(), flush_interval));

        if let Some(storage) = &storage {
            let mut storage = storage.lock().unwrap_or_else(PoisonError::into_inner);
            if fresh {
                storage.clear_snapshots()?;
                tracing::info!("Cleared snapshots from previous runs");
            } else {
                let responses = storage.load_responses()?;
                let modules = storage.load_modules()?;
                drop(storage);
                tracing::info!(
                    "Restored {} cached responses and {} modules",
                    cache.restore(responses),
                    registry.restore(modules)
                );
            }
        }

        Self::with_components(config.crawler.clone(), cache, registry)
    }

    /// Creates a coordinator around caller-supplied components
    pub fn with_components(
        config: CrawlerConfig,
        cache: Arc<FetchCache>,
        registry: Arc<ModuleRegistry>,
    ) -> Result<Self> {
        let host = parse_host(&config.host)?;
        Ok(Self {
            config: Arc::new(config),
            host: Arc::new(host),
            cache,
            registry,
            issues: IssueLog::new(),
            headings: Arc::new(Mutex::new(BTreeSet::new())),
        })
    }

    pub fn cache(&self) -> &FetchCache {
        &self.cache
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn issues(&self) -> &IssueLog {
        &self.issues
    }

    /// Runs the crawl to completion
    ///
    /// Only an unreachable index page fails the run. Every per-page problem
    /// ends up in [`CrawlOutcome::issues`] instead.
    pub async fn run(&self) -> Result<CrawlOutcome> {
        let start_time = Instant::now();
        let links = self.discover_links().await?;
        let total = links.len();
        let pool_size = self.config.qualification_pool_size();

        tracing::info!(
            "Processing {} qualification links with {} workers",
            total,
            pool_size
        );

        let mut tasks = stream::iter(links)
            .map(|url| {
                let coordinator = self.clone();
                tokio::spawn(async move { coordinator.process_qualification(url).await })
            })
            .buffer_unordered(pool_size);

        let mut qualifications = Vec::with_capacity(total);
        let mut processed = 0usize;

        while let Some(joined) = tasks.next().await {
            processed += 1;
            let progress = processed as f64 / total as f64 * 100.0;

            match joined {
                Ok(Some(qualification)) => {
                    tracing::info!(
                        "Parsed ({}/{} ~ {:.1}%): {} [Issues: {}]",
                        processed,
                        total,
                        progress,
                        qualification.code,
                        self.issues.len()
                    );
                    qualifications.push(qualification);
                }
                Ok(None) => {
                    tracing::info!(
                        "Skipped ({}/{} ~ {:.1}%) [Issues: {}]",
                        processed,
                        total,
                        progress,
                        self.issues.len()
                    );
                }
                Err(e) => tracing::error!("Qualification task failed to complete: {}", e),
            }
        }

        self.snapshot();

        let issues = self.issues.snapshot();
        tracing::info!(
            "Done! Assembled {} of {} qualifications in {:?}",
            qualifications.len(),
            total,
            start_time.elapsed()
        );
        if !issues.is_empty() {
            tracing::warn!("{} issues logged during the run", issues.len());
        }

        let modules = referenced_modules(&qualifications);
        let headings = self
            .headings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();

        Ok(CrawlOutcome {
            qualifications,
            modules,
            issues,
            headings,
        })
    }

    /// Fetches the index page and returns the qualification links, shuffled
    async fn discover_links(&self) -> Result<Vec<String>> {
        let index_url = self.host.join(&self.config.catalog_path)?;
        tracing::info!("Fetching catalog index {}", index_url);

        let response = self.cache.fetch(index_url.as_str()).await;
        let body = match &response {
            FetchResult::NetworkError { error } => {
                return Err(CatalogError::IndexUnreachable {
                    url: index_url.to_string(),
                    reason: error.clone(),
                })
            }
            FetchResult::Response { status_code, .. } => {
                response
                    .success_body()
                    .ok_or_else(|| CatalogError::IndexStatus {
                        url: index_url.to_string(),
                        status_code: *status_code,
                    })?
            }
        };

        let mut links = extract_qualification_links(body, &self.host, &self.config.catalog_path);
        links.shuffle(&mut rand::rng());
        tracing::info!("Extracted {} qualification links", links.len());
        Ok(links)
    }

    /// Fetches, parses and assembles one qualification
    ///
    /// Returns None when the page cannot be used; the reason has been logged as
    /// an issue by then.
    async fn process_qualification(self, url: String) -> Option<Qualification> {
        let mut state = QualificationState::Pending;

        advance(&url, &mut state, QualificationState::FetchingPage);
        let response = self.cache.fetch(&url).await;
        let Some(body) = response.success_body() else {
            self.issues.record(
                IssueKind::FetchFailure,
                &url,
                format!("Qualification page unavailable: {}", response.describe()),
            );
            advance(&url, &mut state, QualificationState::Failed);
            return None;
        };

        advance(&url, &mut state, QualificationState::ParsingHeader);
        let page = match parse_qualification_page(body, &url, &self.host) {
            Ok(page) => page,
            Err(e) => {
                self.issues.record_error(&url, &e);
                advance(&url, &mut state, QualificationState::Failed);
                return None;
            }
        };

        let QualificationPage {
            mut qualification,
            levels,
            issues,
        } = page;
        for issue in &issues {
            self.issues.record_error(&url, issue);
        }

        advance(&url, &mut state, QualificationState::ExpandingModuleLevels);
        for level in levels {
            let mut module_groups = Vec::with_capacity(level.groups.len());
            for group in level.groups {
                module_groups.push(self.resolve_group(&url, group).await);
            }
            qualification.module_levels.push(ModuleLevel { module_groups });
        }

        advance(&url, &mut state, QualificationState::Assembled);
        Some(qualification)
    }

    /// Resolves a group's links into modules, keeping page order
    ///
    /// Links already in the registry are filled in directly; only the rest go
    /// through the module worker pool.
    async fn resolve_group(&self, qualification_url: &str, group: GroupLinks) -> ModuleGroup {
        let GroupLinks { heading, links } = group;
        if !heading.is_empty() {
            self.headings
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(heading.clone());
        }

        let mut resolved: Vec<Option<Arc<Module>>> = links
            .iter()
            .map(|link| self.registry.get(&link.url))
            .collect();

        let pending: Vec<(usize, ModuleLink)> = links
            .into_iter()
            .enumerate()
            .filter(|(index, _)| resolved[*index].is_none())
            .collect();

        if !pending.is_empty() {
            let pool_size = self.config.module_pool_size(pending.len());
            let owner = self.clone();
            let fetched: Vec<(usize, Option<Arc<Module>>)> = stream::iter(pending)
                .map(move |(index, link)| {
                    let coordinator = owner.clone();
                    async move { (index, coordinator.resolve_module(link).await) }
                })
                .buffer_unordered(pool_size)
                .collect()
                .await;

            for (index, module) in fetched {
                resolved[index] = module;
            }
        }

        let modules: Vec<Arc<Module>> = resolved.into_iter().flatten().collect();
        if modules.is_empty() {
            self.issues.record(
                IssueKind::EmptyGroup,
                qualification_url,
                format!("Group '{}' has no modules", heading),
            );
        }

        ModuleGroup { heading, modules }
    }

    /// Resolves one module link through the registry
    ///
    /// Concurrent resolutions of the same URL share one load, so a module page
    /// is parsed and its issues recorded once per run.
    async fn resolve_module(&self, link: ModuleLink) -> Option<Arc<Module>> {
        let url = link.url.clone();
        self.registry.resolve(&url, || self.load_module(link)).await
    }

    /// Fetches and parses one module page
    ///
    /// A missing page or a page without the expected structure becomes a stub.
    /// A transport failure yields None and the module is left out of its group.
    async fn load_module(&self, link: ModuleLink) -> Option<Module> {
        let ModuleLink { name, url } = link;
        let response = self.cache.fetch(&url).await;

        if response.is_not_found() {
            self.issues.record(
                IssueKind::NotFound,
                &url,
                format!("Module {} does not exist", name),
            );
            return Some(Module::stub(url, name));
        }

        let Some(body) = response.success_body() else {
            self.issues.record(
                IssueKind::FetchFailure,
                &url,
                format!("Module {} unavailable: {}", name, response.describe()),
            );
            return None;
        };

        let module = match parse_module_page(body, &url) {
            Ok(ModulePage { module, issue }) => {
                if let Some(e) = issue {
                    self.issues.record(
                        e.kind(),
                        &url,
                        format!("Error for module {}: {}", module.name, e),
                    );
                }
                module
            }
            Err(e) => {
                self.issues
                    .record(e.kind(), &url, format!("Module {}: {}", name, e));
                Module::stub(url.clone(), name)
            }
        };

        Some(module)
    }

    /// Persists the fetch cache and module registry
    pub fn snapshot(&self) {
        match self.cache.snapshot() {
            Ok(count) => tracing::debug!("Final response snapshot: {} new entries", count),
            Err(e) => tracing::error!("Failed to snapshot response cache: {}", e),
        }
        match self.registry.snapshot() {
            Ok(count) => tracing::debug!("Final module snapshot: {} new entries", count),
            Err(e) => tracing::error!("Failed to snapshot module registry: {}", e),
        }
    }
}

fn advance(url: &str, state: &mut QualificationState, next: QualificationState) {
    debug_assert!(
        state.can_transition_to(next),
        "invalid transition {} -> {}",
        state,
        next
    );
    tracing::trace!("{}: {} -> {}", url, state, next);
    *state = next;
}

/// Every module referenced by `qualifications`, once each, sorted by URL
fn referenced_modules(qualifications: &[Qualification]) -> Vec<Arc<Module>> {
    let mut modules = BTreeMap::new();
    for module in qualifications.iter().flat_map(Qualification::unique_modules) {
        modules.entry(module.url.clone()).or_insert(module);
    }
    modules.into_values().collect()
}

/// Runs a complete crawl with a fresh coordinator
///
/// # Example
///
/// ```no_run
/// use catalog_harvest::config::load_config;
/// use catalog_harvest::crawler::crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("catalog.toml"))?;
/// let outcome = crawl(&config, None, false).await?;
/// println!("{} qualifications", outcome.qualifications.len());
/// # Ok(())
/// # }
/// ```
pub async fn crawl(
    config: &Config,
    storage: Option<SharedStorage>,
    fresh: bool,
) -> Result<CrawlOutcome> {
    Coordinator::new(config, storage, fresh)?.run().await
}
