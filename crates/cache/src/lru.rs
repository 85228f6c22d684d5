//! Capacity-bounded LRU cache backed by the durable store

use crate::queue::{EvictionQueue, Handle};
use crate::store::{DurableStore, is_safe_key};
use crate::{Error, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// A cached artifact tracked by the eviction queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// The cache key
    pub key: String,
    /// Where the payload lives in the durable store
    pub location: PathBuf,
}

/// Counters describing cache activity since construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Maximum number of entries
    pub capacity: usize,
    /// Entries currently indexed
    pub entries: usize,
    /// Lookups served from disk
    pub hits: u64,
    /// Lookups that found nothing usable
    pub misses: u64,
    /// Indexed lookups whose payload could not be read
    pub degraded_reads: u64,
    /// New keys stored
    pub inserts: u64,
    /// Existing keys overwritten
    pub updates: u64,
    /// Entries dropped to stay within capacity
    pub evictions: u64,
}

#[derive(Debug, Default)]
struct Inner {
    queue: EvictionQueue<CacheEntry>,
    index: HashMap<String, Handle>,
    stats: CacheStats,
}

/// Thread-safe LRU cache holding at most `capacity` payloads on disk
///
/// Recency lives in memory ([`EvictionQueue`] plus a key index); payload
/// bytes live in the [`DurableStore`]. A single mutex guards both, including
/// the file I/O performed by [`get`](Self::get) and [`set`](Self::set), so
/// every operation observes and leaves a consistent index/queue/disk triple.
#[derive(Debug)]
pub struct BoundedCache {
    capacity: usize,
    store: DurableStore,
    inner: Mutex<Inner>,
}

impl BoundedCache {
    /// Create an empty cache.
    ///
    /// Files already present in the store are left alone and not indexed.
    ///
    /// # Errors
    ///
    /// Fails when `capacity` is zero.
    pub fn new(capacity: usize, store: DurableStore) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::configuration("cache capacity must be at least 1"));
        }
        Ok(Self {
            capacity,
            store,
            inner: Mutex::new(Inner {
                queue: EvictionQueue::with_capacity(capacity + 1),
                index: HashMap::with_capacity(capacity + 1),
                stats: CacheStats::default(),
            }),
        })
    }

    /// Create a cache and index the payloads left in the store by a previous run.
    ///
    /// Files are ordered by modification time, newest at the front. When more
    /// files exist than `capacity` allows, the oldest are evicted and deleted.
    ///
    /// # Errors
    ///
    /// Fails when `capacity` is zero or the store directory cannot be listed.
    pub fn open(capacity: usize, store: DurableStore) -> Result<Self> {
        let cache = Self::new(capacity, store)?;
        let mut files = cache.store.entries()?;
        files.sort_by_key(|f| f.modified);

        let mut restored = 0usize;
        {
            let mut inner = cache.lock();
            for file in files {
                if !is_safe_key(&file.name) {
                    debug!(file = %file.path.display(), "Skipping file that is not a cache key");
                    continue;
                }
                let handle = inner.queue.push_front(CacheEntry {
                    key: file.name.clone(),
                    location: file.path,
                });
                inner.index.insert(file.name, handle);
                restored += 1;
                if inner.queue.len() > cache.capacity {
                    cache.evict_back(&mut inner);
                }
            }
        }

        debug!(
            dir = %cache.store.dir().display(),
            restored,
            entries = cache.len(),
            "Restored cache index from disk"
        );
        Ok(cache)
    }

    /// Look up a payload and mark it most recently used.
    ///
    /// A payload that is indexed but cannot be read from disk is reported as a
    /// miss; its stale entry is dropped from the index.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut inner = self.lock();
        let Some(&handle) = inner.index.get(key) else {
            inner.stats.misses += 1;
            return None;
        };

        inner.queue.move_to_front(handle);
        let location = inner.queue.get(handle).map(|entry| entry.location.clone())?;

        match self.store.read(&location) {
            Ok(bytes) => {
                inner.stats.hits += 1;
                Some(bytes)
            }
            Err(e) => {
                warn!(key, error = %e, "Cached payload unreadable, treating as miss");
                inner.queue.remove(handle);
                inner.index.remove(key);
                inner.stats.degraded_reads += 1;
                inner.stats.misses += 1;
                if !e.is_not_found()
                    && let Err(e) = self.store.delete(&location)
                {
                    warn!(key, error = %e, "Failed to delete unreadable cache file");
                }
                None
            }
        }
    }

    /// Store a payload under `key` and mark it most recently used.
    ///
    /// Inserting a new key into a full cache evicts the least recently used
    /// entry and deletes its file. A failed deletion is logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns the I/O error when the payload cannot be written; the index is
    /// left untouched in that case.
    pub fn set(&self, key: &str, payload: &[u8]) -> Result<()> {
        let mut inner = self.lock();
        let location = self.store.location(key);
        self.store.write(&location, payload)?;

        if let Some(&handle) = inner.index.get(key) {
            if let Some(entry) = inner.queue.get_mut(handle) {
                entry.location = location;
            }
            inner.queue.move_to_front(handle);
            inner.stats.updates += 1;
            return Ok(());
        }

        let handle = inner.queue.push_front(CacheEntry {
            key: key.to_owned(),
            location,
        });
        inner.index.insert(key.to_owned(), handle);
        inner.stats.inserts += 1;

        if inner.queue.len() > self.capacity {
            self.evict_back(&mut inner);
        }
        Ok(())
    }

    /// Forget every entry. Payload files stay on disk.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.queue.clear();
        inner.index.clear();
        debug!("Cache index cleared");
    }

    /// Forget every entry and delete the payload files it referenced.
    ///
    /// Returns the number of entries dropped. Files that cannot be deleted are
    /// logged and skipped.
    pub fn purge(&self) -> usize {
        let mut inner = self.lock();
        let locations: Vec<PathBuf> = inner
            .queue
            .iter()
            .map(|(_, entry)| entry.location.clone())
            .collect();
        inner.queue.clear();
        inner.index.clear();

        for location in &locations {
            if let Err(e) = self.store.delete(location) {
                warn!(error = %e, "Failed to delete purged cache file");
            }
        }
        debug!(purged = locations.len(), "Cache purged");
        locations.len()
    }

    /// Whether `key` is indexed. Does not change recency.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.lock().index.contains_key(key)
    }

    /// Number of entries in the eviction queue
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    /// Number of keys in the index
    #[must_use]
    pub fn index_len(&self) -> usize {
        self.lock().index.len()
    }

    /// Whether the cache holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    /// Maximum number of entries
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// The backing store
    #[must_use]
    pub const fn store(&self) -> &DurableStore {
        &self.store
    }

    /// Keys ordered from most to least recently used
    #[must_use]
    pub fn keys_by_recency(&self) -> Vec<String> {
        self.lock()
            .queue
            .iter()
            .map(|(_, entry)| entry.key.clone())
            .collect()
    }

    /// Snapshot of the activity counters
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            capacity: self.capacity,
            entries: inner.queue.len(),
            ..inner.stats
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Every mutation completes before the guard drops, so a panic elsewhere
        // cannot leave the queue and index out of step.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn evict_back(&self, inner: &mut Inner) {
        let Some(entry) = inner.queue.pop_back() else {
            return;
        };
        if let Err(e) = self.store.delete(&entry.location) {
            warn!(key = %entry.key, error = %e, "Failed to delete evicted cache file");
        }
        inner.index.remove(&entry.key);
        inner.stats.evictions += 1;
        debug!(key = %entry.key, "Evicted least recently used entry");
    }
}
