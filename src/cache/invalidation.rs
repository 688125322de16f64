//! Post-mutation listing invalidation.

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, warn};

use super::keys::ListingKey;
use super::store::ListingStore;

/// Tag every cached listing page is filed under on a tag-capable backend.
pub const ARTICLES_LIST_TAG: &str = "articles_list";

/// Clears cached listing pages after a successful article mutation.
///
/// Called synchronously after the database write and before the mutation's
/// HTTP response. On a tag-capable backend every listing page goes at once;
/// a plain backend can only clear the default page's key, so stale entries
/// for other page sizes survive until their TTL runs out. Invalidation
/// failures are logged and never surfaced to the mutation caller — the write
/// has already committed.
pub struct ListingInvalidator {
    store: Arc<dyn ListingStore>,
}

impl ListingInvalidator {
    pub fn new(store: Arc<dyn ListingStore>) -> Self {
        Self { store }
    }

    pub fn on_article_mutated(&self) {
        let (mode, outcome) = match self.store.tags() {
            Some(tags) => ("tag", tags.flush_tag(ARTICLES_LIST_TAG)),
            None => ("single_key", self.store.delete(ListingKey::default_key().as_str())),
        };

        match outcome {
            Ok(()) => {
                counter!("gazzetta_cache_invalidation_total").increment(1);
                debug!(mode, "listing cache invalidated");
            }
            Err(err) => {
                warn!(mode, error = %err, "listing cache invalidation failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::application::pagination::ListingPage;
    use crate::cache::config::CacheConfig;
    use crate::cache::store::{
        CacheError, CachedListing, PlainMemoryStore, TagScopedStore, TaggedMemoryStore,
    };

    fn listing() -> CachedListing {
        CachedListing::new(Vec::new(), Duration::from_secs(60))
    }

    #[test]
    fn tag_mode_clears_every_listing_page() {
        let store = Arc::new(TaggedMemoryStore::new(&CacheConfig::default()));
        let tags = store.tags().expect("tag capability");

        let default_key = ListingKey::default_key();
        let other_key = ListingKey::build(&ListingPage::new(3, 10));
        tags.put_tagged(ARTICLES_LIST_TAG, default_key.as_str(), listing())
            .expect("put default");
        tags.put_tagged(ARTICLES_LIST_TAG, other_key.as_str(), listing())
            .expect("put other");

        ListingInvalidator::new(store.clone()).on_article_mutated();

        assert!(store.get(default_key.as_str()).expect("get").is_none());
        assert!(store.get(other_key.as_str()).expect("get").is_none());
    }

    #[test]
    fn single_key_mode_only_clears_the_default_page() {
        let store = Arc::new(PlainMemoryStore::new(&CacheConfig::default()));

        let default_key = ListingKey::default_key();
        let other_key = ListingKey::build(&ListingPage::new(3, 10));
        store.put(default_key.as_str(), listing()).expect("put default");
        store.put(other_key.as_str(), listing()).expect("put other");

        ListingInvalidator::new(store.clone()).on_article_mutated();

        assert!(store.get(default_key.as_str()).expect("get").is_none());
        // Known incompleteness of the plain backend: the non-default page
        // stays until TTL expiry.
        assert!(store.get(other_key.as_str()).expect("get").is_some());
    }

    #[test]
    fn invalidation_failure_is_swallowed() {
        struct FailingStore;

        impl crate::cache::store::ListingStore for FailingStore {
            fn get(&self, _key: &str) -> Result<Option<CachedListing>, CacheError> {
                Ok(None)
            }

            fn put(&self, _key: &str, _listing: CachedListing) -> Result<(), CacheError> {
                Ok(())
            }

            fn delete(&self, _key: &str) -> Result<(), CacheError> {
                Err(CacheError::Unavailable("delete refused".to_string()))
            }
        }

        // Must not panic or propagate.
        ListingInvalidator::new(Arc::new(FailingStore)).on_article_mutated();
    }
}
