//! Shared coordination primitives for the services: the breadcrumb cache
//! and the recount flag.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use grifo_core::CategoryIndex;

/// Versioned cache of category breadcrumbs.
///
/// Tree mutations call [`CategoryCache::invalidate`]; readers that find
/// the cache cold rebuild it from a fresh snapshot and publish it with
/// [`CategoryCache::warm_if_current`]. The version check makes a rebuild
/// that raced with a mutation lose: a stale snapshot is never published,
/// so a stale breadcrumb is never served.
#[derive(Debug, Default)]
pub struct CategoryCache {
    version: AtomicU64,
    entries: RwLock<Option<CacheEntries>>,
}

#[derive(Debug)]
struct CacheEntries {
    version: u64,
    breadcrumbs: HashMap<Uuid, String>,
}

impl CategoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Version observed now; pass it back to [`Self::warm_if_current`]
    /// after building the index from a snapshot loaded after this call.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Drops the cached entries and bumps the version.
    pub async fn invalidate(&self) {
        self.version.fetch_add(1, Ordering::AcqRel);
        let mut guard = self.entries.write().await;
        *guard = None;
    }

    /// Cached breadcrumb for a category, if the cache is warm.
    pub async fn breadcrumb(&self, id: Uuid) -> Option<String> {
        let guard = self.entries.read().await;
        guard
            .as_ref()
            .and_then(|entries| entries.breadcrumbs.get(&id).cloned())
    }

    /// `true` when the cache currently holds entries.
    pub async fn is_warm(&self) -> bool {
        self.entries.read().await.is_some()
    }

    /// Publishes breadcrumbs built from `index`, unless the cache was
    /// invalidated after `observed_version` was read. Returns whether
    /// entries at `observed_version` are now live.
    pub async fn warm_if_current(&self, observed_version: u64, index: &CategoryIndex) -> bool {
        let mut guard = self.entries.write().await;
        if self.version.load(Ordering::Acquire) != observed_version {
            return false;
        }
        // A cache already warm at this version holds identical data.
        if guard.is_none() {
            let breadcrumbs = index
                .in_tree_order()
                .iter()
                .filter_map(|c| index.breadcrumb(c.id).map(|b| (c.id, b)))
                .collect();
            *guard = Some(CacheEntries {
                version: observed_version,
                breadcrumbs,
            });
        }
        guard
            .as_ref()
            .is_some_and(|entries| entries.version == observed_version)
    }
}

/// Marker set by product mutations whose count effects have not been
/// rolled up yet. [`crate::CategoryTree::recount`] clears it.
#[derive(Debug, Clone, Default)]
pub struct RecountFlag(Arc<AtomicBool>);

impl RecountFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }

    #[must_use]
    pub fn is_marked(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
