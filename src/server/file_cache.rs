//! LRU cache for static file contents.
//!
//! Maps normalized request paths to file bytes, bounded by total byte
//! capacity and a per-entry maximum. Thread-safe with an RwLock: lookups
//! reorder recency and therefore take the write lock, only [`FileCache::stats`]
//! uses the read lock.
//!
//! Recency is a doubly linked list threaded through an arena of records.
//! Links are slot indices, so the arena is the only owner of every record.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;

use bytes::Bytes;
use serde::Serialize;

/// Default total capacity (100 MB).
pub const DEFAULT_CAPACITY_BYTES: usize = 100 * 1024 * 1024;

/// Default largest cacheable entry (20 MB).
pub const DEFAULT_MAX_ENTRY_BYTES: usize = 20 * 1024 * 1024;

/// Cached file value. Replaced wholesale on update, never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub content: Bytes,
    pub mime_type: String,
    pub size_bytes: usize,
    pub cached_at: SystemTime,
}

impl CacheEntry {
    pub fn new(content: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            size_bytes: content.len(),
            content,
            mime_type: mime_type.into(),
            cached_at: SystemTime::now(),
        }
    }
}

/// Snapshot of cache occupancy and effectiveness.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub size_bytes: usize,
    pub capacity_bytes: usize,
    pub max_entry_bytes: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_ratio: f64,
}

/// Arena slot index.
type Handle = usize;

struct Record {
    key: Box<str>,
    entry: CacheEntry,
    /// Towards the most recently used end.
    prev: Option<Handle>,
    /// Towards the least recently used end.
    next: Option<Handle>,
}

#[derive(Default)]
struct Inner {
    index: HashMap<Box<str>, Handle>,
    slots: Vec<Option<Record>>,
    free: Vec<Handle>,
    /// Most recently used.
    head: Option<Handle>,
    /// Least recently used.
    tail: Option<Handle>,
    size_bytes: usize,
    hits: u64,
    misses: u64,
}

impl Inner {
    fn record(&self, handle: Handle) -> &Record {
        self.slots[handle]
            .as_ref()
            .expect("indexed handle points at a vacant slot")
    }

    fn record_mut(&mut self, handle: Handle) -> &mut Record {
        self.slots[handle]
            .as_mut()
            .expect("indexed handle points at a vacant slot")
    }

    fn allocate(&mut self, record: Record) -> Handle {
        match self.free.pop() {
            Some(handle) => {
                self.slots[handle] = Some(record);
                handle
            }
            None => {
                self.slots.push(Some(record));
                self.slots.len() - 1
            }
        }
    }

    fn unlink(&mut self, handle: Handle) {
        let (prev, next) = {
            let record = self.record(handle);
            (record.prev, record.next)
        };
        match prev {
            Some(p) => self.record_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.record_mut(n).prev = prev,
            None => self.tail = prev,
        }
        let record = self.record_mut(handle);
        record.prev = None;
        record.next = None;
    }

    fn push_front(&mut self, handle: Handle) {
        let old_head = self.head;
        {
            let record = self.record_mut(handle);
            record.prev = None;
            record.next = old_head;
        }
        match old_head {
            Some(h) => self.record_mut(h).prev = Some(handle),
            None => self.tail = Some(handle),
        }
        self.head = Some(handle);
    }

    fn promote(&mut self, handle: Handle) {
        if self.head != Some(handle) {
            self.unlink(handle);
            self.push_front(handle);
        }
    }

    /// Remove the least recently used record, skipping `keep`.
    fn evict_lru(&mut self, keep: Option<Handle>) -> bool {
        let mut candidate = self.tail;
        if let (Some(tail), Some(keep)) = (candidate, keep) {
            if tail == keep {
                candidate = self.record(tail).prev;
            }
        }
        let Some(handle) = candidate else {
            return false;
        };

        self.unlink(handle);
        let Some(record) = self.slots[handle].take() else {
            return false;
        };
        self.free.push(handle);
        self.index.remove(&record.key);
        self.size_bytes -= record.entry.size_bytes;

        tracing::debug!(
            key = %record.key,
            bytes = record.entry.size_bytes,
            "cache evicted least recently used entry"
        );
        true
    }

    fn clear(&mut self) {
        *self = Inner::default();
    }
}

/// Byte-bounded LRU cache of file contents.
///
/// Invariants:
/// - every key in the index has exactly one record in the recency list
/// - the summed size of resident entries never exceeds the capacity
pub struct FileCache {
    inner: RwLock<Inner>,
    capacity_bytes: usize,
    max_entry_bytes: usize,
}

impl FileCache {
    /// Create a cache with default limits (100 MB, 20 MB per entry).
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_CAPACITY_BYTES, DEFAULT_MAX_ENTRY_BYTES)
    }

    /// Create a cache with explicit byte limits.
    pub fn with_limits(capacity_bytes: usize, max_entry_bytes: usize) -> Self {
        tracing::info!(
            capacity_bytes,
            max_entry_bytes,
            "file cache initialized"
        );
        Self {
            inner: RwLock::new(Inner::default()),
            capacity_bytes,
            max_entry_bytes,
        }
    }

    /// Look up `key`, counting a hit or a miss.
    ///
    /// A hit promotes the entry to most recently used.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let mut inner = self.write();
        match inner.index.get(key).copied() {
            Some(handle) => {
                inner.promote(handle);
                inner.hits += 1;
                let entry = inner.record(handle).entry.clone();
                tracing::trace!(key, bytes = entry.size_bytes, "cache hit");
                Some(entry)
            }
            None => {
                inner.misses += 1;
                tracing::trace!(key, "cache miss");
                None
            }
        }
    }

    /// Insert or replace `key`.
    ///
    /// Returns false without touching the cache when the entry exceeds the
    /// per-entry maximum or could never fit the total capacity.
    pub fn put(&self, key: &str, entry: CacheEntry) -> bool {
        let size = entry.size_bytes;
        if size > self.max_entry_bytes || size > self.capacity_bytes {
            tracing::debug!(
                key,
                bytes = size,
                max_entry_bytes = self.max_entry_bytes,
                "entry too large to cache"
            );
            return false;
        }

        let mut inner = self.write();

        if let Some(handle) = inner.index.get(key).copied() {
            let old_size = inner.record(handle).entry.size_bytes;
            inner.record_mut(handle).entry = entry;
            inner.size_bytes = inner.size_bytes - old_size + size;
            inner.promote(handle);

            // A grown entry may push the total over capacity.
            while inner.size_bytes > self.capacity_bytes {
                if !inner.evict_lru(Some(handle)) {
                    break;
                }
            }
            tracing::trace!(key, bytes = size, "cache entry replaced");
            return true;
        }

        while inner.size_bytes + size > self.capacity_bytes && !inner.index.is_empty() {
            if !inner.evict_lru(None) {
                break;
            }
        }

        let boxed: Box<str> = key.into();
        let handle = inner.allocate(Record {
            key: boxed.clone(),
            entry,
            prev: None,
            next: None,
        });
        inner.index.insert(boxed, handle);
        inner.push_front(handle);
        inner.size_bytes += size;

        tracing::trace!(key, bytes = size, total = inner.size_bytes, "cache entry added");
        true
    }

    /// Read-only snapshot; does not reorder anything.
    pub fn stats(&self) -> CacheStats {
        let inner = self.read();
        let lookups = inner.hits + inner.misses;
        let hit_ratio = if lookups > 0 {
            inner.hits as f64 / lookups as f64
        } else {
            0.0
        };

        CacheStats {
            entries: inner.index.len(),
            size_bytes: inner.size_bytes,
            capacity_bytes: self.capacity_bytes,
            max_entry_bytes: self.max_entry_bytes,
            hits: inner.hits,
            misses: inner.misses,
            hit_ratio,
        }
    }

    /// Drop every entry and reset counters.
    pub fn clear(&self) {
        self.write().clear();
        tracing::info!("file cache cleared");
    }

    /// Resident keys, most recently used first.
    pub fn recency_order(&self) -> Vec<String> {
        let inner = self.read();
        let mut keys = Vec::with_capacity(inner.index.len());
        let mut cursor = inner.head;
        while let Some(handle) = cursor {
            let record = inner.record(handle);
            keys.push(record.key.to_string());
            cursor = record.next;
        }
        keys
    }

    /// Check residency without counting a lookup or touching recency.
    pub fn contains(&self, key: &str) -> bool {
        self.read().index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.read().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity_bytes(&self) -> usize {
        self.capacity_bytes
    }

    pub fn max_entry_bytes(&self) -> usize {
        self.max_entry_bytes
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for FileCache {
    fn default() -> Self {
        Self::new()
    }
}
