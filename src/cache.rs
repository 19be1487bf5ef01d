//! Time-bounded cache for category listings.
//!
//! Keys are a category or "all categories"; values are the filtered
//! listing plus the instant it was stored. Entries expire after the TTL and
//! are dropped explicitly by every write and delete that goes through the
//! repository.
//!
//! A listing fetched while an invalidation happened is discarded instead of
//! stored: [`ListingCache::generation`] is read before the remote call and
//! [`ListingCache::put`] refuses to store if it moved in the meantime.
//!
//! The cache is process-local. Other instances writing to the same
//! container are only observed once the TTL has elapsed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::models::{ArtifactMeta, Category};

/// `None` means the listing across all categories.
pub type CacheKey = Option<Category>;

struct Entry {
    items: Arc<Vec<ArtifactMeta>>,
    stored_at: Instant,
}

pub struct ListingCache {
    ttl: Duration,
    entries: RwLock<HashMap<CacheKey, Entry>>,
    generation: AtomicU64,
}

impl ListingCache {
    /// A zero TTL disables caching.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh listing for `key`, if any.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<Vec<ArtifactMeta>>> {
        if self.ttl.is_zero() {
            return None;
        }
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(key)
            .filter(|e| e.stored_at.elapsed() < self.ttl)
            .map(|e| e.items.clone())
    }

    /// Current invalidation generation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Store a listing fetched at `generation`.
    ///
    /// Returns `false` (and stores nothing) if an invalidation happened
    /// since that generation was read.
    pub fn put(&self, key: CacheKey, generation: u64, items: Arc<Vec<ArtifactMeta>>) -> bool {
        if self.ttl.is_zero() {
            return false;
        }
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if self.generation.load(Ordering::SeqCst) != generation {
            return false;
        }
        entries.insert(
            key,
            Entry {
                items,
                stored_at: Instant::now(),
            },
        );
        true
    }

    /// Drop the entry for `category` and the all-categories entry.
    pub fn invalidate(&self, category: &Category) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        self.generation.fetch_add(1, Ordering::SeqCst);
        entries.remove(&Some(category.clone()));
        entries.remove(&None);
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        self.generation.fetch_add(1, Ordering::SeqCst);
        entries.clear();
    }
}
