//! RAII handle over an acquired cache entry.

use std::sync::Arc;

use super::shared::CacheShared;

/// An outstanding reference to a cached file's bytes.
///
/// Holding a `CacheHandle` keeps the backing [`crate::cache::entry::CacheEntry`]
/// pinned (`inuse > 0`), so it is never evicted. Dropping the handle is
/// the Rust-idiomatic replacement for the original's explicit
/// `hss_detach_cache_entry` / refcount decrement: the cache's `inuse`
/// counter is always kept in sync with the number of live handles because
/// there's no code path that can drop a `CacheHandle` without running its
/// `Drop` impl.
pub struct CacheHandle {
    pub(super) index: usize,
    pub(super) data: Arc<[u8]>,
    pub(super) shared: Arc<CacheShared>,
}

impl CacheHandle {
    /// The cached file's bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// The pool index backing this handle — used by [`crate::session`] to
    /// implement the `cache_pool_index` field of the session record.
    pub fn pool_index(&self) -> usize {
        self.index
    }
}

impl Clone for CacheHandle {
    fn clone(&self) -> Self {
        self.shared.retain(self.index);
        Self { index: self.index, data: Arc::clone(&self.data), shared: Arc::clone(&self.shared) }
    }
}

impl Drop for CacheHandle {
    fn drop(&mut self) {
        self.shared.release(self.index);
    }
}
