//! Two-layer query cache (§4.5): exact canonical-form lookup, then
//! nearest-neighbor semantic lookup over cached query embeddings.
//!
//! Both layers sit behind a single mutex (§5, §9) — scoped to one retrieval
//! engine instance, never a process-wide singleton.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

use crate::chunk::RetrievalResult;
use crate::config::CacheConfig;
use crate::error::{RetrievalError, Result};
use crate::vector::cosine_similarity;

struct SemanticEntry {
    embedding: Vec<f32>,
    results: Vec<RetrievalResult>,
}

struct Inner {
    exact: LruCache<String, Vec<RetrievalResult>>,
    semantic: Vec<SemanticEntry>,
    semantic_threshold: f32,
}

/// In-memory query cache: exact (Layer 1) + semantic nearest-neighbor
/// (Layer 2). Both layers are bounded by the same capacity.
pub struct QueryCache {
    inner: Mutex<Inner>,
}

/// Canonicalize a query string for Layer 1 lookup: trim, lowercase.
pub fn canonicalize(query: &str) -> String {
    query.trim().to_lowercase()
}

impl QueryCache {
    pub fn new(config: CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity.max(1)).expect("capacity is at least 1");
        Self {
            inner: Mutex::new(Inner {
                exact: LruCache::new(capacity),
                semantic: Vec::new(),
                semantic_threshold: config.semantic_threshold,
            }),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| RetrievalError::LockPoisoned("query cache".into()))
    }

    /// Layer 1 lookup by canonicalized query text.
    pub fn get_exact(&self, query: &str) -> Result<Option<Vec<RetrievalResult>>> {
        let key = canonicalize(query);
        let mut inner = self.lock()?;
        Ok(inner.exact.get(&key).cloned())
    }

    /// Layer 2 lookup: linear scan for a cached query embedding whose cosine
    /// similarity to `embedding` exceeds the configured threshold.
    pub fn get_semantic(&self, embedding: &[f32]) -> Result<Option<Vec<RetrievalResult>>> {
        let inner = self.lock()?;
        Ok(inner
            .semantic
            .iter()
            .find(|entry| cosine_similarity(&entry.embedding, embedding) > inner.semantic_threshold)
            .map(|entry| entry.results.clone()))
    }

    /// Insert a fused result list into both layers on a cache miss.
    pub fn insert(&self, query: &str, embedding: Vec<f32>, results: Vec<RetrievalResult>) -> Result<()> {
        let key = canonicalize(query);
        let mut inner = self.lock()?;
        let capacity = inner.exact.cap().get();

        inner.exact.put(key, results.clone());

        inner.semantic.push(SemanticEntry { embedding, results });
        if inner.semantic.len() > capacity {
            inner.semantic.remove(0);
        }
        Ok(())
    }

    /// Number of entries currently held in Layer 1 (exact).
    pub fn exact_len(&self) -> Result<usize> {
        Ok(self.lock()?.exact.len())
    }

    /// Number of entries currently held in Layer 2 (semantic).
    pub fn semantic_len(&self) -> Result<usize> {
        Ok(self.lock()?.semantic.len())
    }
}
