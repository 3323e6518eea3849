use crate::DocId;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

/// Cache key. Deliberately the *raw* query string, not the cleaned term list:
/// two spellings that normalize identically are cached separately. Callers may
/// rely on literal-string caching, so this mirrors the legacy behavior.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub query: String,
    pub k: usize,
    pub strict: bool,
}

/// Bounded memo of recent search results, least-recently-used eviction.
/// The mutex makes insert/evict safe under concurrent searches; lookups return
/// the ranked list by value so callers cannot mutate the cached copy.
pub struct QueryCache {
    inner: Mutex<LruCache<CacheKey, Vec<(DocId, f32)>>>,
}

impl QueryCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity is at least 1");
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Vec<(DocId, f32)>> {
        self.inner.lock().get(key).cloned()
    }

    pub fn put(&self, key: CacheKey, results: Vec<(DocId, f32)>) {
        self.inner.lock().put(key, results);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
