//! The unit of storage the content cache manages.

use std::sync::Arc;

use crate::pool::Poison;

/// One cached file: its path, its bytes, how many sessions are holding it,
/// and its position in the LRU list.
pub struct CacheEntry {
    /// Absolute path used as the lookup key.
    pub filename: String,
    /// Full file contents. `Arc` so a [`crate::cache::CacheHandle`] can hold
    /// a cheap clone of the bytes without needing `inuse` bookkeeping to
    /// also gate memory safety — `inuse` tracks *logical* outstanding
    /// references for eviction purposes, independent of the `Arc`'s own
    /// refcount (a handle always keeps its own clone alive regardless of
    /// what the cache does to the entry afterwards).
    pub data: Arc<[u8]>,
    /// Number of sessions currently holding a handle to this entry.
    pub inuse: usize,
    /// Monotonic timestamp (seconds) of the most recent acquisition.
    pub last_used: f64,
    /// LRU neighbor closer to the front (more recently used), if any.
    pub prev_index: Option<usize>,
    /// LRU neighbor closer to the back (less recently used), if any.
    pub next_index: Option<usize>,
}

impl CacheEntry {
    pub fn new(filename: String, data: Arc<[u8]>, now: f64) -> Self {
        Self { filename, data, inuse: 1, last_used: now, prev_index: None, next_index: None }
    }
}

impl Poison for CacheEntry {
    fn poison(&mut self) {
        self.filename.clear();
        self.data = Arc::from(&[][..]);
        self.inuse = 0;
        self.last_used = -1.0;
        self.prev_index = None;
        self.next_index = None;
    }
}
