//! Article-listing cache.
//!
//! A read-through cache over the paginated listing projection:
//!
//! - **keys**: deterministic listing keys derived from pagination input
//! - **store**: in-memory backends, with and without tag-scoped invalidation
//! - **gateway**: `get_or_compute` with TTL and miss-on-error semantics
//! - **invalidation**: the post-mutation flush, tag-scoped when the backend
//!   supports it, single-key otherwise
//!
//! ## Configuration
//!
//! Cache behavior is controlled via `gazzetta.toml`:
//!
//! ```toml
//! [cache]
//! backend = "tagged"   # or "plain"
//! ttl_seconds = 60
//! capacity = 200
//! ```

mod config;
mod gateway;
mod invalidation;
mod keys;
mod lock;
mod store;

pub use config::{CacheBackendKind, CacheConfig};
pub use gateway::ListingCache;
pub use invalidation::{ARTICLES_LIST_TAG, ListingInvalidator};
pub use keys::ListingKey;
pub use store::{
    CacheError, CachedListing, ListingStore, PlainMemoryStore, TagScopedStore, TaggedMemoryStore,
};
