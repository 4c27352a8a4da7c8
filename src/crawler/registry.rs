//! Module registry
//!
//! Canonical store of parsed modules keyed by URL. A module referenced by many
//! qualifications is parsed once and every group gets a clone of the same
//! `Arc`.

use crate::model::Module;
use crate::storage::{SharedStorage, SnapshotStore, StorageResult};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;

type Slot = Arc<OnceCell<Option<Arc<Module>>>>;

struct Inner {
    modules: HashMap<String, Arc<Module>>,
    resolving: HashMap<String, Slot>,
    unsaved: Vec<Arc<Module>>,
    insertions: usize,
}

/// URL-keyed registry of canonical [`Module`] instances
///
/// Check-then-insert runs under one mutex, so concurrent `put`s for the same
/// URL keep whichever arrived first and hand it back to both callers.
/// [`ModuleRegistry::resolve`] goes further and runs the loader for a URL at
/// most once, however many callers ask for it at the same time.
pub struct ModuleRegistry {
    inner: Mutex<Inner>,
    storage: Option<SharedStorage>,
    flush_interval: usize,
}

impl ModuleRegistry {
    pub fn new(storage: Option<SharedStorage>, flush_interval: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                modules: HashMap::new(),
                resolving: HashMap::new(),
                unsaved: Vec::new(),
                insertions: 0,
            }),
            storage,
            flush_interval: flush_interval.max(1),
        }
    }

    /// Seeds the registry with modules from a previous run
    ///
    /// Restored modules do not count towards the snapshot interval and are not
    /// written back.
    pub fn restore(&self, modules: HashMap<String, Module>) -> usize {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let count = modules.len();
        for (url, module) in modules {
            inner.modules.entry(url).or_insert_with(|| Arc::new(module));
        }
        count
    }

    pub fn get(&self, url: &str) -> Option<Arc<Module>> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .modules
            .get(url)
            .cloned()
    }

    /// Returns the module for `url`, running `load` only if no other caller has
    ///
    /// Concurrent callers for the same URL wait on the first one's load. A load
    /// that yields `None` is remembered as well, so the loader never runs twice
    /// for a URL within a run.
    pub async fn resolve<F, Fut>(&self, url: &str, load: F) -> Option<Arc<Module>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<Module>>,
    {
        let slot = {
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = inner.modules.get(url) {
                return Some(Arc::clone(existing));
            }
            Arc::clone(inner.resolving.entry(url.to_string()).or_default())
        };

        slot.get_or_init(|| async { load().await.map(|module| self.put(module)) })
            .await
            .clone()
    }

    /// Registers a module and returns the canonical instance for its URL
    ///
    /// If the URL is already registered the existing instance is returned and
    /// `module` is discarded.
    pub fn put(&self, module: Module) -> Arc<Module> {
        let (canonical, flush) = {
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = inner.modules.get(&module.url) {
                return Arc::clone(existing);
            }

            let canonical = Arc::new(module);
            inner
                .modules
                .insert(canonical.url.clone(), Arc::clone(&canonical));
            if self.storage.is_some() {
                inner.unsaved.push(Arc::clone(&canonical));
            }
            inner.insertions += 1;
            (canonical, inner.insertions % self.flush_interval == 0)
        };

        if flush {
            if let Err(e) = self.snapshot() {
                tracing::error!("Failed to snapshot module registry: {}", e);
            }
        }

        canonical
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .modules
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every registered module, sorted by URL
    pub fn all(&self) -> Vec<Arc<Module>> {
        let mut modules: Vec<Arc<Module>> = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .modules
            .values()
            .cloned()
            .collect();
        modules.sort_by(|a, b| a.url.cmp(&b.url));
        modules
    }

    /// Writes modules registered since the last snapshot to the snapshot store
    ///
    /// Returns how many were written. On failure they stay pending for the
    /// next snapshot.
    pub fn snapshot(&self) -> StorageResult<usize> {
        let Some(storage) = &self.storage else {
            return Ok(0);
        };

        let modules = std::mem::take(
            &mut self
                .inner
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .unsaved,
        );
        if modules.is_empty() {
            return Ok(0);
        }

        let saved = storage
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .save_modules(&modules);
        if let Err(e) = saved {
            self.inner
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .unsaved
                .extend(modules);
            return Err(e);
        }

        tracing::debug!("Snapshotted {} new modules", modules.len());
        Ok(modules.len())
    }
}
