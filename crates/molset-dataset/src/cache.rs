use std::num::NonZeroUsize;

use lru::LruCache;

use crate::collection::{CompositeRecord, UnifiedCollection};

pub const DEFAULT_RECORD_CACHE_CAPACITY: usize = 16;

/// Bounded LRU cache in front of random-access record reads.
///
/// The backing collection is immutable, so entries never go stale and
/// eviction happens only by capacity. Instances are worker-local by design:
/// every method takes `&mut self` and the cache is never shared or
/// synchronized across workers.
pub struct RecordCache<F> {
    inner: LruCache<usize, CompositeRecord<F>>,
}

impl<F: Clone> RecordCache<F> {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: LruCache::new(capacity),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_RECORD_CACHE_CAPACITY)
    }

    /// Returns the record at `index`, reconstructing and caching it on a
    /// miss. A hit returns a value-equal clone of what a fresh
    /// reconstruction would produce.
    pub fn get_or_fetch(
        &mut self,
        index: usize,
        collection: &UnifiedCollection<F>,
    ) -> Option<CompositeRecord<F>> {
        if let Some(hit) = self.inner.get(&index) {
            return Some(hit.clone());
        }
        let record = collection.get(index)?;
        self.inner.put(index, record.clone());
        Some(record)
    }

    /// Number of cache-resident records; never exceeds the capacity.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.cap().get()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.inner.contains(&index)
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }
}

impl<F: Clone> Default for RecordCache<F> {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

impl<F> std::fmt::Debug for RecordCache<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordCache")
            .field("len", &self.inner.len())
            .field("capacity", &self.inner.cap().get())
            .finish()
    }
}
