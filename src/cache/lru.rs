//! Intrusive doubly-linked LRU list over [`CacheEntry`] records held in a
//! [`Pool`].
//!
//! The list runs newest→oldest via `next_index` and oldest→newest via
//! `prev_index`; `first` is the most-recently-used entry's index, `last`
//! is the least-recently-used. This mirrors the original's `first_index`
//! / `last_index` pair walked by the eviction scan and the `show` command.

use crate::cache::entry::CacheEntry;
use crate::pool::Pool;

#[derive(Debug, Default, Clone, Copy)]
pub struct LruList {
    /// Most recently used entry.
    pub first: Option<usize>,
    /// Least recently used entry.
    pub last: Option<usize>,
}

impl LruList {
    pub fn new() -> Self {
        Self { first: None, last: None }
    }

    /// Link `index` at the front (MRU position), stamping its `last_used`.
    pub fn add(&mut self, pool: &mut Pool<CacheEntry>, index: usize, now: f64) {
        if let Some(old_first) = self.first {
            pool.get_mut(old_first).expect("lru head is live").prev_index = Some(index);
        }
        let entry = pool.get_mut(index).expect("entry being added is live");
        entry.prev_index = None;
        entry.next_index = self.first;
        entry.last_used = now;
        self.first = Some(index);
        if self.last.is_none() {
            self.last = Some(index);
        }
    }

    /// Unlink `index`, fixing up the head/tail and neighbor links.
    pub fn remove(&mut self, pool: &mut Pool<CacheEntry>, index: usize) {
        let (prev, next) = {
            let entry = pool.get(index).expect("entry being removed is live");
            (entry.prev_index, entry.next_index)
        };

        if self.first == Some(index) {
            self.first = next;
        }
        if self.last == Some(index) {
            self.last = prev;
        }
        if let Some(next_index) = next {
            pool.get_mut(next_index).expect("next neighbor is live").prev_index = prev;
        }
        if let Some(prev_index) = prev {
            pool.get_mut(prev_index).expect("prev neighbor is live").next_index = next;
        }
    }

    /// Remove then re-add at the front, refreshing `last_used`.
    pub fn update(&mut self, pool: &mut Pool<CacheEntry>, index: usize, now: f64) {
        self.remove(pool, index);
        self.add(pool, index, now);
    }

    /// Walk from the least-recently-used end towards the most-recently-used
    /// end, i.e. eviction order.
    pub fn iter_lru_order<'a>(&self, pool: &'a Pool<CacheEntry>) -> LruIter<'a> {
        LruIter { pool, next: self.last }
    }

    /// Debug-only sanity check: both directions must agree on a
    /// non-increasing (walking front→back) / non-decreasing (walking
    /// back→front) `last_used` ordering, and must visit the same set of
    /// indices.
    #[cfg(debug_assertions)]
    pub fn validate(&self, pool: &Pool<CacheEntry>) {
        let mut last_timestamp = f64::INFINITY;
        let mut forward = Vec::new();
        let mut index = self.first;
        while let Some(i) = index {
            let entry = pool.get(i).expect("forward-linked entry is live");
            debug_assert!(
                entry.last_used <= last_timestamp,
                "lru forward list is not monotone at index {i}"
            );
            last_timestamp = entry.last_used;
            forward.push(i);
            index = entry.next_index;
        }

        let mut last_timestamp = f64::NEG_INFINITY;
        let mut backward = Vec::new();
        let mut index = self.last;
        while let Some(i) = index {
            let entry = pool.get(i).expect("backward-linked entry is live");
            debug_assert!(
                entry.last_used >= last_timestamp,
                "lru reverse list is not monotone at index {i}"
            );
            last_timestamp = entry.last_used;
            backward.push(i);
            index = entry.prev_index;
        }

        backward.reverse();
        debug_assert_eq!(forward, backward, "lru forward/reverse walks disagree");
    }
}

pub struct LruIter<'a> {
    pool: &'a Pool<CacheEntry>,
    next: Option<usize>,
}

impl<'a> Iterator for LruIter<'a> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let current = self.next?;
        let entry = self.pool.get(current).expect("lru-linked entry is live");
        self.next = entry.prev_index;
        Some(current)
    }
}
