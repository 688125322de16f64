//! Read-through gateway over a listing store.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::warn;

use super::invalidation::ARTICLES_LIST_TAG;
use super::keys::ListingKey;
use super::store::{CachedListing, ListingStore};
use crate::application::articles::ArticleListingEntry;

/// Read-through cache for listing pages.
///
/// A hit returns the stored entries without touching `compute`. A miss (or
/// an expired entry, or a backend read error) runs `compute` exactly once in
/// this call and stores the result with the configured TTL. There is no
/// single-flight coordination: two concurrent misses for the same key both
/// compute and both write, and the last write wins with an equivalent value.
pub struct ListingCache {
    store: Arc<dyn ListingStore>,
    ttl: Duration,
}

impl ListingCache {
    pub fn new(store: Arc<dyn ListingStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Compute failures propagate to the caller and are never cached.
    /// Backend read failures degrade to a miss; backend write failures are
    /// logged and swallowed so a flaky cache cannot fail the request.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        key: &ListingKey,
        compute: F,
    ) -> Result<Vec<ArticleListingEntry>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<ArticleListingEntry>, E>>,
    {
        match self.store.get(key.as_str()) {
            Ok(Some(cached)) if cached.is_fresh() => {
                counter!("gazzetta_cache_hit_total").increment(1);
                return Ok(cached.into_entries());
            }
            Ok(_) => {}
            Err(err) => {
                warn!(
                    key = %key,
                    error = %err,
                    "cache read failed, treating as miss"
                );
            }
        }

        counter!("gazzetta_cache_miss_total").increment(1);
        let entries = compute().await?;

        let cached = CachedListing::new(entries.clone(), self.ttl);
        let stored = match self.store.tags() {
            Some(tags) => tags.put_tagged(ARTICLES_LIST_TAG, key.as_str(), cached),
            None => self.store.put(key.as_str(), cached),
        };
        if let Err(err) = stored {
            warn!(key = %key, error = %err, "cache write failed, serving uncached result");
        }

        Ok(entries)
    }

    pub fn store(&self) -> &Arc<dyn ListingStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::application::pagination::ListingPage;
    use crate::cache::config::CacheConfig;
    use crate::cache::store::{CacheError, PlainMemoryStore, TaggedMemoryStore};

    fn entry(title: &str) -> ArticleListingEntry {
        ArticleListingEntry {
            id: uuid::Uuid::new_v4(),
            title: title.to_string(),
            content: String::new(),
            author: None,
            comments_count: 0,
            published_at: None,
            created_at: time::OffsetDateTime::UNIX_EPOCH,
            image_url: None,
        }
    }

    struct FailingStore;

    impl ListingStore for FailingStore {
        fn get(&self, _key: &str) -> Result<Option<CachedListing>, CacheError> {
            Err(CacheError::Unavailable("read refused".to_string()))
        }

        fn put(&self, _key: &str, _listing: CachedListing) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("write refused".to_string()))
        }

        fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("delete refused".to_string()))
        }
    }

    #[tokio::test]
    async fn hit_skips_compute() {
        let store = Arc::new(TaggedMemoryStore::new(&CacheConfig::default()));
        let cache = ListingCache::new(store, Duration::from_secs(60));
        let key = ListingKey::build(&ListingPage::default());
        let calls = AtomicUsize::new(0);

        let first = cache
            .get_or_compute(&key, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, CacheError>(vec![entry("one")])
            })
            .await
            .expect("first listing");
        let second = cache
            .get_or_compute(&key, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, CacheError>(vec![entry("two")])
            })
            .await
            .expect("second listing");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn expired_entry_recomputes() {
        let store = Arc::new(PlainMemoryStore::new(&CacheConfig::default()));
        let cache = ListingCache::new(store, Duration::ZERO);
        let key = ListingKey::build(&ListingPage::default());
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            cache
                .get_or_compute(&key, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, CacheError>(vec![entry("fresh")])
                })
                .await
                .expect("listing");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn compute_failure_is_not_cached() {
        let store = Arc::new(TaggedMemoryStore::new(&CacheConfig::default()));
        let cache = ListingCache::new(store, Duration::from_secs(60));
        let key = ListingKey::build(&ListingPage::default());

        let failed: Result<Vec<ArticleListingEntry>, &str> =
            cache.get_or_compute(&key, || async { Err("query failed") }).await;
        assert!(failed.is_err());

        let calls = AtomicUsize::new(0);
        cache
            .get_or_compute(&key, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, &str>(vec![entry("recovered")])
            })
            .await
            .expect("listing after failure");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn backend_failure_degrades_to_live_computation() {
        let cache = ListingCache::new(Arc::new(FailingStore), Duration::from_secs(60));
        let key = ListingKey::build(&ListingPage::default());

        let entries = cache
            .get_or_compute(&key, || async {
                Ok::<_, CacheError>(vec![entry("live")])
            })
            .await
            .expect("listing despite backend failure");

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "live");
    }
}
