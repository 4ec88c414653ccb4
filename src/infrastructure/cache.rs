//! Two-tier caching: the embedding cache (C3) and the query-result cache
//! (C5), both bounded LRUs backed by `moka`.
//!
//! Generalized from the teacher's `infrastructure::cache` module, which
//! gives each concern (embeddings, search results, metadata) its own
//! namespaced TTL/size config. Query cache invalidation on index rebuild
//! is implemented by tagging each entry with the index generation counter
//! at insert time and rejecting a stale-generation hit on read, rather
//! than a blocking flush across concurrent readers.

use crate::domain::types::{EnrichedResult, SearchSourceType};
use moka::future::Cache;
use seahash::SeaHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Cache for `normalize(text) -> Embedding` lookups, keyed by a hash of
/// the already-normalized, already-truncated text plus the model name
/// (so switching `EmbeddingMode` never serves a stale-dimension vector).
#[derive(Clone)]
pub struct EmbeddingCache {
    inner: Cache<u64, Vec<f32>>,
}

impl EmbeddingCache {
    pub fn new(max_entries: u64) -> Self {
        Self {
            inner: Cache::builder().max_capacity(max_entries).build(),
        }
    }

    pub fn key(model_name: &str, text: &str) -> u64 {
        let mut hasher = SeaHasher::new();
        model_name.hash(&mut hasher);
        text.hash(&mut hasher);
        hasher.finish()
    }

    pub async fn get(&self, key: u64) -> Option<Vec<f32>> {
        self.inner.get(&key).await
    }

    pub async fn insert(&self, key: u64, vector: Vec<f32>) {
        self.inner.insert(key, vector).await;
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

/// One entry's generation stamp, compared against the live generation at
/// read time.
struct Stamped<T> {
    generation: u64,
    value: T,
}

/// Cache for `find_similar` results, keyed by `(normalized_query, top_k,
/// threshold, sorted(filters), source_type)` (§4.5 step 1/8). A shared
/// [`AtomicU64`] generation counter, bumped on every successful index
/// rebuild, makes stale entries unobservable without a blocking flush.
#[derive(Clone)]
pub struct QueryCache {
    inner: Cache<u64, Arc<Stamped<Vec<EnrichedResult>>>>,
    generation: Arc<AtomicU64>,
}

/// The inputs hashed into a query cache key, matching §4.5 step 1
/// exactly: normalized query, `top_k`, `threshold`, the filter set
/// (already deterministically ordered by the caller), and `source_type`.
#[derive(Debug)]
pub struct QueryCacheKey<'a> {
    pub normalized_query: &'a str,
    pub top_k: usize,
    pub threshold_millis: i64,
    pub sorted_filter_repr: &'a str,
    pub source_type: SearchSourceType,
}

impl QueryCache {
    pub fn new(max_entries: u64, generation: Arc<AtomicU64>) -> Self {
        Self {
            inner: Cache::builder().max_capacity(max_entries).build(),
            generation,
        }
    }

    pub fn key(parts: &QueryCacheKey<'_>) -> u64 {
        let mut hasher = SeaHasher::new();
        parts.normalized_query.hash(&mut hasher);
        parts.top_k.hash(&mut hasher);
        parts.threshold_millis.hash(&mut hasher);
        parts.sorted_filter_repr.hash(&mut hasher);
        (parts.source_type as u8).hash(&mut hasher);
        hasher.finish()
    }

    /// Returns `None` on a cold miss or a hit whose generation predates
    /// the current index generation.
    pub async fn get(&self, key: u64) -> Option<Vec<EnrichedResult>> {
        let stamped = self.inner.get(&key).await?;
        if stamped.generation == self.generation.load(Ordering::Acquire) {
            Some(stamped.value.clone())
        } else {
            None
        }
    }

    pub async fn insert(&self, key: u64, results: Vec<EnrichedResult>) {
        let generation = self.generation.load(Ordering::Acquire);
        self.inner
            .insert(key, Arc::new(Stamped { generation, value: results }))
            .await;
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

/// Quantize a `0.0..=1.0` threshold to a stable hashable integer,
/// avoiding `f32`'s lack of `Hash`/`Eq`.
pub fn threshold_millis(threshold: f32) -> i64 {
    (threshold * 1000.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embedding_cache_round_trips() {
        let cache = EmbeddingCache::new(16);
        let key = EmbeddingCache::key("hash-fallback", "نص");
        assert!(cache.get(key).await.is_none());
        cache.insert(key, vec![1.0, 2.0]).await;
        assert_eq!(cache.get(key).await, Some(vec![1.0, 2.0]));
    }

    #[tokio::test]
    async fn query_cache_hit_becomes_miss_after_generation_bump() {
        let generation = Arc::new(AtomicU64::new(0));
        let cache = QueryCache::new(16, generation.clone());
        let key = QueryCache::key(&QueryCacheKey {
            normalized_query: "بحث",
            top_k: 10,
            threshold_millis: threshold_millis(0.6),
            sorted_filter_repr: "",
            source_type: SearchSourceType::Law,
        });

        cache.insert(key, Vec::new()).await;
        assert!(cache.get(key).await.is_some());

        generation.fetch_add(1, Ordering::AcqRel);
        assert!(cache.get(key).await.is_none());
    }
}
