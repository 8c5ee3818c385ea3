//! Lock-guarded state shared between [`super::ContentCache`] and every
//! outstanding [`super::CacheHandle`].

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::cache::entry::CacheEntry;
use crate::cache::lru::LruList;
use crate::pool::Pool;

pub(super) struct CacheInner {
    pub(super) pool: Pool<CacheEntry>,
    pub(super) lru: LruList,
    pub(super) index: HashMap<String, usize>,
    pub(super) cache_size: usize,
    pub(super) cache_evictions: u64,
}

impl CacheInner {
    pub(super) fn new() -> Self {
        Self {
            pool: Pool::new(),
            lru: LruList::new(),
            index: HashMap::new(),
            cache_size: 0,
            cache_evictions: 0,
        }
    }
}

/// The single lock serializing the cache pool, the LRU list, and the path
/// index — matching the original's one spinlock held across the whole
/// miss path (§5 of the spec).
pub(crate) struct CacheShared {
    pub(super) inner: Mutex<CacheInner>,
}

impl CacheShared {
    pub(super) fn new() -> Self {
        Self { inner: Mutex::new(CacheInner::new()) }
    }

    /// Bump `inuse` for a cloned [`super::CacheHandle`].
    pub(super) fn retain(&self, index: usize) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.pool.get_mut(index) {
            entry.inuse += 1;
        }
    }

    /// Drop-path decrement. Reaching zero does not evict — eviction is
    /// lazy and happens only on the next miss that needs the room.
    pub(super) fn release(&self, index: usize) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.pool.get_mut(index) {
            debug_assert!(entry.inuse > 0, "release of an entry with inuse == 0");
            entry.inuse = entry.inuse.saturating_sub(1);
        }
    }
}
