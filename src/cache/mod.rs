//! Concurrent content cache: pool-allocated entries, an intrusive LRU list,
//! and a path→index map, all serialized by a single lock (§4.4, §5).
//!
//! Grounded on the buffer-pool pattern in `lru_buffer.rs` of the teacher
//! repo (page table + recency list + eviction-on-pressure), re-keyed from
//! page numbers to filesystem paths and re-sized from fixed pages to
//! variable-length file bytes.

pub mod entry;
pub mod handle;
pub mod lru;
mod shared;

pub use entry::CacheEntry;
pub use handle::CacheHandle;
pub use lru::LruList;

use std::fs;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::CacheError;
use shared::CacheShared;

/// Files smaller than this are treated as though they don't exist, forcing
/// the `index.html` fallback in the URL resolver. Preserved from the
/// original as a documented legacy quirk (§9 design notes).
pub const MIN_FILE_SIZE: u64 = 20;

/// Source of the monotonic timestamps stamped on LRU entries. Abstracted
/// so tests can drive the clock deterministically instead of racing real
/// wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

/// Default [`Clock`], backed by [`std::time::Instant`].
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// A point-in-time view of one cached entry, used by `show http static
/// server cache` (§6).
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntrySnapshot {
    pub filename: String,
    pub size: usize,
    pub inuse: usize,
}

/// The content cache.
///
/// Cheaply cloneable: clones share the same underlying lock and pool via
/// an internal `Arc`, matching the original's single process-wide cache
/// instance while letting the Rust port hand copies to worker tasks
/// without an outer `Arc<ContentCache>` wrapper.
#[derive(Clone)]
pub struct ContentCache {
    shared: Arc<CacheShared>,
    clock: Arc<dyn Clock>,
    cache_limit: usize,
}

impl ContentCache {
    pub fn new(cache_limit: usize) -> Self {
        Self::with_clock(cache_limit, Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(cache_limit: usize, clock: Arc<dyn Clock>) -> Self {
        Self { shared: Arc::new(CacheShared::new()), clock, cache_limit }
    }

    /// Look up `path`, pinning it on a cache hit or loading it from disk on
    /// a miss, evicting least-recently-used entries as needed to stay
    /// within `cache_limit`. The returned handle keeps the entry pinned
    /// until dropped.
    pub fn acquire(&self, path: &str) -> Result<CacheHandle, CacheError> {
        let now = self.clock.now();
        let mut inner = self.shared.inner.lock();

        if let Some(&index) = inner.index.get(path) {
            {
                let entry = inner.pool.get_mut(index).expect("indexed entry is live");
                entry.inuse += 1;
            }
            inner.lru.update(&mut inner.pool, index, now);
            let data = Arc::clone(&inner.pool.get(index).expect("just updated").data);
            debug!(path, "cache hit");
            return Ok(CacheHandle { index, data, shared: Arc::clone(&self.shared) });
        }

        let metadata =
            fs::metadata(path).map_err(|_| CacheError::NotFound(path.to_string()))?;
        if !metadata.is_file() || metadata.len() < MIN_FILE_SIZE {
            return Err(CacheError::NotFound(path.to_string()));
        }
        let bytes = fs::read(path)
            .map_err(|source| CacheError::Io { path: path.to_string(), source })?;
        let data: Arc<[u8]> = Arc::from(bytes.into_boxed_slice());

        while inner.cache_size > self.cache_limit {
            let victim = inner
                .lru
                .iter_lru_order(&inner.pool)
                .find(|&i| inner.pool.get(i).map(|e| e.inuse == 0).unwrap_or(false));
            let Some(victim_index) = victim else {
                warn!(
                    wanted = data.len(),
                    cache_size = inner.cache_size,
                    cache_limit = self.cache_limit,
                    "cache over limit but every entry is pinned; admitting anyway"
                );
                break;
            };
            let (freed, victim_path) = {
                let e = inner.pool.get(victim_index).expect("lru-linked entry is live");
                (e.data.len(), e.filename.clone())
            };
            inner.lru.remove(&mut inner.pool, victim_index);
            inner.index.remove(&victim_path);
            inner.pool.free(victim_index);
            inner.cache_size -= freed;
            inner.cache_evictions += 1;
            debug!(path = victim_path, freed, "evicted");
        }

        let index = inner.pool.alloc(CacheEntry::new(path.to_string(), Arc::clone(&data), now));
        inner.lru.add(&mut inner.pool, index, now);
        inner.index.insert(path.to_string(), index);
        inner.cache_size += data.len();
        debug!(path, size = data.len(), "cache miss, loaded from disk");

        #[cfg(debug_assertions)]
        inner.lru.validate(&inner.pool);

        Ok(CacheHandle { index, data, shared: Arc::clone(&self.shared) })
    }

    /// Frees every entry with `inuse == 0`. Returns the number of entries
    /// that were busy (and therefore left in place) — the CLI reports this
    /// as "Note: N busy items still in cache".
    pub fn clear(&self) -> usize {
        let mut inner = self.shared.inner.lock();
        let order: Vec<usize> = inner.lru.iter_lru_order(&inner.pool).collect();
        let mut busy = 0;
        for idx in order {
            let (inuse, filename, size) = {
                let e = inner.pool.get(idx).expect("lru-linked entry is live");
                (e.inuse, e.filename.clone(), e.data.len())
            };
            if inuse > 0 {
                busy += 1;
                continue;
            }
            inner.lru.remove(&mut inner.pool, idx);
            inner.index.remove(&filename);
            inner.pool.free(idx);
            inner.cache_size -= size;
        }
        busy
    }

    /// Total bytes currently held by live entries.
    pub fn size(&self) -> usize {
        self.shared.inner.lock().cache_size
    }

    /// The configured ceiling `acquire` tries to stay under.
    pub fn limit(&self) -> usize {
        self.cache_limit
    }

    /// Number of live entries, busy or not.
    pub fn entry_count(&self) -> usize {
        self.shared.inner.lock().pool.len()
    }

    /// Cumulative count of entries freed by the miss-path eviction scan
    /// (`clear()` busy-count reporting is separate; see [`Self::clear`]).
    pub fn evictions(&self) -> u64 {
        self.shared.inner.lock().cache_evictions
    }

    /// Entries from least- to most-recently-used, for `show` commands.
    pub fn snapshot(&self) -> Vec<CacheEntrySnapshot> {
        let inner = self.shared.inner.lock();
        inner
            .lru
            .iter_lru_order(&inner.pool)
            .map(|i| {
                let e = inner.pool.get(i).expect("lru-linked entry is live");
                CacheEntrySnapshot {
                    filename: e.filename.clone(),
                    size: e.data.len(),
                    inuse: e.inuse,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &[u8]) -> String {
        let path = dir.path().join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(contents).unwrap();
        path.to_str().unwrap().to_string()
    }

    #[test]
    fn miss_then_hit() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "a.html", b"hello world, this is long enough");
        let cache = ContentCache::new(crate::config::DEFAULT_CACHE_LIMIT);
        let h1 = cache.acquire(&path).unwrap();
        assert_eq!(&*h1.bytes(), b"hello world, this is long enough");
        assert_eq!(cache.entry_count(), 1);
        let h2 = cache.acquire(&path).unwrap();
        assert_eq!(h1.pool_index(), h2.pool_index());
        assert_eq!(cache.entry_count(), 1, "hit must not allocate a second entry");
    }

    #[test]
    fn rejects_missing_file() {
        let cache = ContentCache::new(1 << 20);
        let err = cache.acquire("/no/such/path/at/all").unwrap_err();
        assert!(matches!(err, CacheError::NotFound(_)));
    }

    #[test]
    fn rejects_undersized_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "tiny.html", b"short");
        let cache = ContentCache::new(1 << 20);
        let err = cache.acquire(&path).unwrap_err();
        assert!(matches!(err, CacheError::NotFound(_)));
    }

    #[test]
    fn evicts_lru_when_over_limit() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(&dir, "a.html", &[b'a'; 100]);
        let b = write_file(&dir, "b.html", &[b'b'; 100]);
        let c = write_file(&dir, "c.html", &[b'c'; 100]);
        // Eviction is gated on the *pre-existing* cache_size alone (§4.4 step
        // 1), so a limit between one and two files' worth only starts
        // evicting once a third acquire's pre-check observes the prior
        // insert having pushed the cache over it.
        let cache = ContentCache::new(150);

        let ha = cache.acquire(&a).unwrap();
        drop(ha); // no longer pinned, eligible for eviction
        let _hb = cache.acquire(&b).unwrap(); // pre-check sees cache_size=100, not yet over limit
        let _hc = cache.acquire(&c).unwrap(); // pre-check sees cache_size=200 > 150, evicts a

        assert_eq!(cache.entry_count(), 2, "a.html should have been evicted");
        assert_eq!(cache.evictions(), 1);
        assert!(cache.acquire(&a).is_ok(), "a.html should be loadable again from disk");
    }

    #[test]
    fn pinned_entries_are_never_evicted() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(&dir, "a.html", &[b'a'; 100]);
        let b = write_file(&dir, "b.html", &[b'b'; 100]);
        let cache = ContentCache::new(150);

        let _ha = cache.acquire(&a).unwrap(); // stays pinned
        let _hb = cache.acquire(&b).unwrap(); // over limit, but a is pinned

        assert_eq!(cache.entry_count(), 2);
        assert!(cache.size() > cache.limit());
    }

    #[test]
    fn clear_frees_idle_entries_and_reports_busy_ones() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(&dir, "a.html", &[b'a'; 100]);
        let b = write_file(&dir, "b.html", &[b'b'; 100]);
        let cache = ContentCache::new(1 << 20);

        let ha = cache.acquire(&a).unwrap();
        let _hb = cache.acquire(&b).unwrap();
        drop(ha);

        let busy = cache.clear();
        assert_eq!(busy, 1);
        assert_eq!(cache.entry_count(), 1);
    }

    #[test]
    fn clone_shares_state() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(&dir, "a.html", &[b'a'; 100]);
        let cache = ContentCache::new(1 << 20);
        let cache2 = cache.clone();
        let _h = cache.acquire(&a).unwrap();
        assert_eq!(cache2.entry_count(), 1);
    }
}
