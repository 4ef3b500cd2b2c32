//! Byte-bounded LRU cache of rendered artifacts.

use std::sync::{Arc, LazyLock};

use latex_view_common::RenderConfig;
use lru::LruCache;
use parking_lot::Mutex;

use crate::types::{Artifact, CacheKey};

static SHARED: LazyLock<Arc<RenderCache>> =
    LazyLock::new(|| Arc::new(RenderCache::new(RenderConfig::DEFAULT_CACHE_BYTES)));

/// Rendered artifacts keyed by [`CacheKey`], bounded by total artifact bytes
/// rather than entry count.
///
/// Everything sits behind one lock, so readers never see a half-inserted
/// entry and the byte total always matches the stored artifacts.
pub struct RenderCache {
    budget: usize,
    inner: Mutex<Entries>,
}

struct Entries {
    lru: LruCache<CacheKey, Arc<Artifact>>,
    bytes: usize,
}

impl RenderCache {
    pub fn new(budget_bytes: usize) -> Self {
        Self {
            budget: budget_bytes,
            inner: Mutex::new(Entries {
                lru: LruCache::unbounded(),
                bytes: 0,
            }),
        }
    }

    /// Process-wide cache, created on first use with the default budget.
    pub fn shared() -> Arc<RenderCache> {
        SHARED.clone()
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Look up and mark as most recently used.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<Artifact>> {
        let hit = self.inner.lock().lru.get(key).cloned();
        tracing::trace!(target: "latex_view::cache", ?key, hit = hit.is_some(), "cache lookup");
        hit
    }

    /// Look up without touching recency.
    pub fn peek(&self, key: &CacheKey) -> Option<Arc<Artifact>> {
        self.inner.lock().lru.peek(key).cloned()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.inner.lock().lru.contains(key)
    }

    /// Insert or replace, then evict least recently used entries until the
    /// total is back under budget. Returns how many entries were evicted.
    ///
    /// An artifact bigger than the whole budget is not stored.
    pub fn insert(&self, key: CacheKey, artifact: Arc<Artifact>) -> usize {
        let size = artifact.byte_size();
        if size > self.budget {
            tracing::debug!(
                target: "latex_view::cache",
                ?key,
                size,
                budget = self.budget,
                "artifact larger than cache budget, not cached"
            );
            return 0;
        }

        let mut entries = self.inner.lock();
        if let Some(previous) = entries.lru.put(key, artifact) {
            entries.bytes -= previous.byte_size();
        }
        entries.bytes += size;

        let mut evicted = 0;
        while entries.bytes > self.budget {
            let Some((old_key, old)) = entries.lru.pop_lru() else {
                break;
            };
            entries.bytes -= old.byte_size();
            evicted += 1;
            tracing::debug!(
                target: "latex_view::cache",
                key = ?old_key,
                freed = old.byte_size(),
                "evicted artifact"
            );
        }
        evicted
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut entries = self.inner.lock();
        entries.lru.clear();
        entries.bytes = 0;
        tracing::debug!(target: "latex_view::cache", "cache cleared");
    }

    /// Bytes currently held.
    pub fn current_size(&self) -> usize {
        self.inner.lock().bytes
    }

    pub fn len(&self) -> usize {
        self.inner.lock().lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for RenderCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.inner.lock();
        f.debug_struct("RenderCache")
            .field("budget", &self.budget)
            .field("bytes", &entries.bytes)
            .field("entries", &entries.lru.len())
            .finish()
    }
}
