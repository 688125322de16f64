//! Listing cache storage backends.
//!
//! Two in-memory variants stand behind one trait: `TaggedMemoryStore`
//! supports clearing every key under a tag in one call, `PlainMemoryStore`
//! only knows exact keys. Callers detect the capability through
//! [`ListingStore::tags`].

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use lru::LruCache;
use thiserror::Error;

use crate::application::articles::ArticleListingEntry;

use super::config::CacheConfig;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

/// Errors surfaced by a cache backend.
///
/// The in-memory stores never produce these, but the trait models fallible
/// backends so callers handle outages the same way everywhere: a read error
/// is a miss, a write or invalidation error is logged and swallowed.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
}

/// One cached listing page with its freshness window.
#[derive(Debug, Clone)]
pub struct CachedListing {
    entries: Vec<ArticleListingEntry>,
    stored_at: Instant,
    ttl: Duration,
}

impl CachedListing {
    pub fn new(entries: Vec<ArticleListingEntry>, ttl: Duration) -> Self {
        Self {
            entries,
            stored_at: Instant::now(),
            ttl,
        }
    }

    /// Expiry is passive: checked here on read, no background sweeper.
    pub fn is_fresh(&self) -> bool {
        self.stored_at.elapsed() < self.ttl
    }

    pub fn into_entries(self) -> Vec<ArticleListingEntry> {
        self.entries
    }

    pub fn entries(&self) -> &[ArticleListingEntry] {
        &self.entries
    }
}

/// Uniform access to a listing cache backend.
pub trait ListingStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<CachedListing>, CacheError>;

    fn put(&self, key: &str, listing: CachedListing) -> Result<(), CacheError>;

    fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Capability probe: `Some` when the backend supports tag-scoped
    /// operations, `None` otherwise.
    fn tags(&self) -> Option<&dyn TagScopedStore> {
        None
    }
}

/// Tag-scoped operations for backends that support them.
pub trait TagScopedStore: Send + Sync {
    /// Store an entry and associate its key with `tag`.
    fn put_tagged(&self, tag: &str, key: &str, listing: CachedListing) -> Result<(), CacheError>;

    /// Remove every entry whose key was ever associated with `tag`.
    fn flush_tag(&self, tag: &str) -> Result<(), CacheError>;
}

// ============================================================================
// Tagged backend
// ============================================================================

/// In-memory store with a tag index next to the LRU entry map.
///
/// LRU eviction may leave a dangling key in the tag index; flushing a tag
/// tolerates keys that are already gone.
pub struct TaggedMemoryStore {
    entries: RwLock<LruCache<String, CachedListing>>,
    tag_index: RwLock<HashMap<String, HashSet<String>>>,
}

impl TaggedMemoryStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.capacity_non_zero())),
            tag_index: RwLock::new(HashMap::new()),
        }
    }
}

impl ListingStore for TaggedMemoryStore {
    fn get(&self, key: &str) -> Result<Option<CachedListing>, CacheError> {
        Ok(rw_write(&self.entries, SOURCE, "tagged.get")
            .get(key)
            .cloned())
    }

    fn put(&self, key: &str, listing: CachedListing) -> Result<(), CacheError> {
        rw_write(&self.entries, SOURCE, "tagged.put").put(key.to_string(), listing);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        rw_write(&self.entries, SOURCE, "tagged.delete").pop(key);
        Ok(())
    }

    fn tags(&self) -> Option<&dyn TagScopedStore> {
        Some(self)
    }
}

impl TagScopedStore for TaggedMemoryStore {
    fn put_tagged(&self, tag: &str, key: &str, listing: CachedListing) -> Result<(), CacheError> {
        self.put(key, listing)?;
        rw_write(&self.tag_index, SOURCE, "tagged.put_tagged")
            .entry(tag.to_string())
            .or_default()
            .insert(key.to_string());
        Ok(())
    }

    fn flush_tag(&self, tag: &str) -> Result<(), CacheError> {
        let keys = rw_write(&self.tag_index, SOURCE, "tagged.flush_tag").remove(tag);
        if let Some(keys) = keys {
            let mut entries = rw_write(&self.entries, SOURCE, "tagged.flush_tag.entries");
            for key in keys {
                entries.pop(&key);
            }
        }
        Ok(())
    }
}

// ============================================================================
// Plain backend
// ============================================================================

/// In-memory store without tag support: exact keys only.
pub struct PlainMemoryStore {
    entries: RwLock<LruCache<String, CachedListing>>,
}

impl PlainMemoryStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.capacity_non_zero())),
        }
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "plain.len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ListingStore for PlainMemoryStore {
    fn get(&self, key: &str) -> Result<Option<CachedListing>, CacheError> {
        Ok(rw_write(&self.entries, SOURCE, "plain.get")
            .get(key)
            .cloned())
    }

    fn put(&self, key: &str, listing: CachedListing) -> Result<(), CacheError> {
        rw_write(&self.entries, SOURCE, "plain.put").put(key.to_string(), listing);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        rw_write(&self.entries, SOURCE, "plain.delete").pop(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(ttl: Duration) -> CachedListing {
        CachedListing::new(Vec::new(), ttl)
    }

    #[test]
    fn tagged_store_roundtrip() {
        let store = TaggedMemoryStore::new(&CacheConfig::default());

        assert!(store.get("k1").expect("get").is_none());
        store.put("k1", listing(Duration::from_secs(60))).expect("put");
        assert!(store.get("k1").expect("get").is_some());

        store.delete("k1").expect("delete");
        assert!(store.get("k1").expect("get").is_none());
    }

    #[test]
    fn tagged_store_reports_tag_capability() {
        let store = TaggedMemoryStore::new(&CacheConfig::default());
        assert!(store.tags().is_some());
    }

    #[test]
    fn plain_store_reports_no_tag_capability() {
        let store = PlainMemoryStore::new(&CacheConfig::default());
        assert!(store.tags().is_none());
    }

    #[test]
    fn flush_tag_clears_every_tagged_key() {
        let store = TaggedMemoryStore::new(&CacheConfig::default());
        let tags = store.tags().expect("tag capability");

        tags.put_tagged("articles_list", "k1", listing(Duration::from_secs(60)))
            .expect("put k1");
        tags.put_tagged("articles_list", "k2", listing(Duration::from_secs(60)))
            .expect("put k2");
        store.put("untagged", listing(Duration::from_secs(60))).expect("put");

        tags.flush_tag("articles_list").expect("flush");

        assert!(store.get("k1").expect("get").is_none());
        assert!(store.get("k2").expect("get").is_none());
        assert!(store.get("untagged").expect("get").is_some());
    }

    #[test]
    fn flush_tag_tolerates_evicted_keys() {
        let config = CacheConfig {
            capacity: 1,
            ..Default::default()
        };
        let store = TaggedMemoryStore::new(&config);
        let tags = store.tags().expect("tag capability");

        tags.put_tagged("articles_list", "k1", listing(Duration::from_secs(60)))
            .expect("put k1");
        // Evicts k1 from the entry map while the index still lists it.
        tags.put_tagged("articles_list", "k2", listing(Duration::from_secs(60)))
            .expect("put k2");

        tags.flush_tag("articles_list").expect("flush");
        assert!(store.get("k2").expect("get").is_none());
    }

    #[test]
    fn ttl_expiry_is_checked_on_read() {
        let entry = listing(Duration::ZERO);
        assert!(!entry.is_fresh());

        let entry = listing(Duration::from_secs(60));
        assert!(entry.is_fresh());
    }

    #[test]
    fn plain_store_lru_eviction() {
        let config = CacheConfig {
            capacity: 2,
            ..Default::default()
        };
        let store = PlainMemoryStore::new(&config);

        store.put("k1", listing(Duration::from_secs(60))).expect("put");
        store.put("k2", listing(Duration::from_secs(60))).expect("put");
        store.put("k3", listing(Duration::from_secs(60))).expect("put");

        assert!(store.get("k1").expect("get").is_none());
        assert!(store.get("k2").expect("get").is_some());
        assert!(store.get("k3").expect("get").is_some());
    }
}
