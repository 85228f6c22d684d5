//! Persistent LRU cache for resized images
//!
//! This crate provides the caching layer behind the resizer service:
//! - [`EvictionQueue`]: arena-backed recency list with O(1) updates
//! - [`DurableStore`]: one file per key under a cache directory
//! - [`BoundedCache`]: capacity-bounded, thread-safe composition of both
//!
//! # Overview
//!
//! The cache holds at most `capacity` payloads. Every [`BoundedCache::get`]
//! and [`BoundedCache::set`] moves the key to the front of the queue; a `set`
//! that pushes the cache over capacity evicts exactly one entry from the back
//! and deletes its file.
//!
//! Storage faults on the read path never surface as errors: an indexed key
//! whose file is missing or unreadable is reported as a miss. Write faults are
//! returned to the caller and leave the index untouched.
//!
//! ```rust,no_run
//! use resizer_cache::{BoundedCache, DurableStore};
//!
//! let store = DurableStore::new("/var/cache/resizer")?;
//! let cache = BoundedCache::open(100, store)?;
//! cache.set("300_200_ab12", b"payload")?;
//! assert_eq!(cache.get("300_200_ab12").as_deref(), Some(&b"payload"[..]));
//! # Ok::<(), resizer_cache::Error>(())
//! ```

mod error;
pub mod lru;
pub mod queue;
pub mod store;

// Re-export error types at crate root
pub use error::{Error, Result};

// Re-export main types
pub use lru::{BoundedCache, CacheEntry, CacheStats};
pub use queue::{EvictionQueue, Handle};
pub use store::{DurableStore, HASHED_PREFIX, StoredFile, is_safe_key};
