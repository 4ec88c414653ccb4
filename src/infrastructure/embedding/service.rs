//! Embedding Service (C3): the single source of truth for embedding
//! dimension and model identity.
//!
//! Owns the two-tier cache, mini-batch partitioning, the low-memory guard,
//! and the fallback to [`HashFallbackModel`] — the real
//! [`EmbeddingModel`](crate::domain::ports::EmbeddingModel) never sees any
//! of that; it only turns already-normalized, already-truncated text into
//! vectors.

use crate::domain::error::Result;
use crate::domain::ports::embedding::EmbeddingModel;
use crate::domain::ports::vector_index::VectorIndex;
use crate::domain::types::{BatchOutcome, Embedding, EmbeddingMode, EmbeddingStats};
use crate::infrastructure::cache::EmbeddingCache;
use crate::infrastructure::config::EmbeddingConfig;
use crate::infrastructure::embedding::hash_fallback::HashFallbackModel;
use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Orchestrates encoding, caching, batching and the low-memory guard for
/// one configured model identity. Cheap to clone (everything interior is
/// `Arc`-backed), matching the "process-wide singleton behind explicit
/// dependency injection" shape SPEC_FULL §9 calls for.
#[derive(Clone)]
pub struct EmbeddingService {
    config: EmbeddingConfig,
    use_vector_index: bool,
    cache: EmbeddingCache,
    hash_model: Arc<HashFallbackModel>,
    real_model: Arc<dyn EmbeddingModel>,
    mode: Arc<ArcSwap<EmbeddingMode>>,
    ready: Arc<AtomicBool>,
    locked_no_ml: Arc<AtomicBool>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl EmbeddingService {
    /// Construct the service around a real model implementation. No I/O
    /// happens here — the model is loaded lazily on first
    /// [`Self::initialize`]/[`Self::encode`] call (§4.3.1).
    pub fn new(
        config: EmbeddingConfig,
        use_vector_index: bool,
        real_model: Arc<dyn EmbeddingModel>,
    ) -> Self {
        let cache = EmbeddingCache::new(config.cache_max_entries);
        let initial_mode = if config.no_ml_mode {
            EmbeddingMode::HashFallback
        } else if use_vector_index {
            EmbeddingMode::ModelWithIndex
        } else {
            EmbeddingMode::ModelBruteForce
        };
        Self {
            config,
            use_vector_index,
            cache,
            hash_model: Arc::new(HashFallbackModel::new()),
            real_model,
            mode: Arc::new(ArcSwap::from_pointee(initial_mode)),
            ready: Arc::new(AtomicBool::new(false)),
            locked_no_ml: Arc::new(AtomicBool::new(config.no_ml_mode)),
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Idempotent, synchronous-at-first-use initialization (§4.3.1): probe
    /// available memory, force NO-ML mode under pressure, and warm the
    /// cache with a throwaway encode of the real model. Tolerates repeated
    /// invocation; safe to call from every request path.
    pub async fn initialize(&self) -> Result<()> {
        if self.ready.load(Ordering::Acquire) {
            return Ok(());
        }

        if self.locked_no_ml.load(Ordering::Acquire) {
            self.mode.store(Arc::new(EmbeddingMode::HashFallback));
            self.ready.store(true, Ordering::Release);
            return Ok(());
        }

        if self.memory_below_guard() {
            tracing::warn!(
                guard_bytes = self.config.memory_guard_bytes,
                "available memory below guard threshold, forcing NO-ML mode"
            );
            self.force_hash_fallback();
            self.ready.store(true, Ordering::Release);
            return Ok(());
        }

        match self.real_model.embed_one("تهيئة").await {
            Ok(_) => {
                let mode = if self.use_vector_index {
                    EmbeddingMode::ModelWithIndex
                } else {
                    EmbeddingMode::ModelBruteForce
                };
                self.mode.store(Arc::new(mode));
            }
            Err(error) => {
                tracing::warn!(%error, "embedding model failed to initialize, falling back to NO-ML mode");
                self.force_hash_fallback();
            }
        }

        self.ready.store(true, Ordering::Release);
        Ok(())
    }

    /// Forces NO-ML mode for the remainder of the process (§5 memory
    /// policy: "at critical pressure, no_ml_mode engages and remains
    /// engaged").
    fn force_hash_fallback(&self) {
        self.locked_no_ml.store(true, Ordering::Release);
        self.mode.store(Arc::new(EmbeddingMode::HashFallback));
    }

    fn memory_below_guard(&self) -> bool {
        let mut system = sysinfo::System::new();
        system.refresh_memory();
        system.available_memory() < self.config.memory_guard_bytes
    }

    fn active_model(&self) -> Arc<dyn EmbeddingModel> {
        if matches!(**self.mode.load(), EmbeddingMode::HashFallback) {
            self.hash_model.clone() as Arc<dyn EmbeddingModel>
        } else {
            self.real_model.clone()
        }
    }

    /// Current [`EmbeddingMode`].
    pub fn mode(&self) -> EmbeddingMode {
        **self.mode.load()
    }

    /// Dimensionality of the currently active model.
    pub fn dimensions(&self) -> usize {
        self.active_model().dimensions()
    }

    /// Truncate already-normalized text to `max_seq_tokens` whitespace-
    /// delimited tokens, logged at debug level (§4.3 failure semantics).
    fn truncate(&self, normalized: &str) -> String {
        let limit = self.config.max_seq_tokens;
        let truncated: Vec<&str> = normalized.split_whitespace().take(limit).collect();
        let result = truncated.join(" ");
        if result.len() < normalized.len() {
            tracing::debug!(limit, "text truncated to max_seq_tokens");
        }
        result
    }

    /// Encode a single text: normalize, truncate, consult the cache, and
    /// on miss run the active model and cache the result (§4.3.1).
    pub async fn encode(&self, text: &str) -> Result<Embedding> {
        self.initialize().await?;
        let normalized = crate::domain::normalize::normalize(text);
        let truncated = self.truncate(&normalized);
        let model = self.active_model();

        if truncated.is_empty() {
            return Ok(Embedding::zero(model.dimensions(), model.model_name()));
        }

        let key = EmbeddingCache::key(model.model_name(), &truncated);
        if let Some(vector) = self.cache.get(key).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Embedding {
                dimensions: vector.len(),
                vector,
                model: model.model_name().to_string(),
            });
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let vector = model.embed_one(&truncated).await?;
        self.cache.insert(key, vector.clone()).await;
        Ok(Embedding {
            dimensions: vector.len(),
            vector,
            model: model.model_name().to_string(),
        })
    }

    /// Encode a batch, order-preserving, partitioned into mini-batches of
    /// `batch_size` (§4.3.3). Per-text cache hits are resolved before any
    /// model call; a mini-batch whose model call fails falls back to
    /// [`HashFallbackModel`] for just that mini-batch, so one bad batch
    /// never contaminates the rest.
    pub async fn encode_batch(&self, texts: &[String]) -> Result<Vec<BatchOutcome>> {
        self.initialize().await?;
        let model = self.active_model();
        let normalized: Vec<String> = texts
            .iter()
            .map(|t| self.truncate(&crate::domain::normalize::normalize(t)))
            .collect();

        let mut results: Vec<Option<BatchOutcome>> = vec![None; normalized.len()];
        let mut pending = Vec::new();

        for (i, text) in normalized.iter().enumerate() {
            if text.is_empty() {
                results[i] = Some(BatchOutcome::Ok(vec![0.0; model.dimensions()]));
                continue;
            }
            let key = EmbeddingCache::key(model.model_name(), text);
            if let Some(vector) = self.cache.get(key).await {
                self.hits.fetch_add(1, Ordering::Relaxed);
                results[i] = Some(BatchOutcome::Ok(vector));
            } else {
                self.misses.fetch_add(1, Ordering::Relaxed);
                pending.push(i);
            }
        }

        for mini_batch in pending.chunks(self.config.batch_size.max(1)) {
            let batch_texts: Vec<String> =
                mini_batch.iter().map(|&i| normalized[i].clone()).collect();

            match model.embed_many(&batch_texts).await {
                Ok(vectors) => {
                    for (&i, vector) in mini_batch.iter().zip(vectors) {
                        let key = EmbeddingCache::key(model.model_name(), &normalized[i]);
                        self.cache.insert(key, vector.clone()).await;
                        results[i] = Some(BatchOutcome::Ok(vector));
                    }
                }
                Err(error) => {
                    tracing::warn!(
                        %error,
                        batch_len = mini_batch.len(),
                        "mini-batch encode failed, falling back to hash embedding for this batch"
                    );
                    for &i in mini_batch {
                        match self.hash_model.embed_one(&normalized[i]).await {
                            Ok(vector) => results[i] = Some(BatchOutcome::Ok(vector)),
                            Err(fallback_error) => {
                                results[i] = Some(BatchOutcome::Err(fallback_error.to_string()))
                            }
                        }
                    }
                }
            }
        }

        Ok(results
            .into_iter()
            .map(|r| r.unwrap_or_else(|| BatchOutcome::Err("not processed".to_string())))
            .collect())
    }

    /// Cosine similarity between two vectors (§4.3.1); delegates to the
    /// pure domain implementation so the math is identical whether called
    /// here or from the brute-force search path.
    pub fn cosine_similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        crate::domain::scoring::cosine_similarity(a, b)
    }

    /// Materialize a vector index (C4) from `(chunk_id, vector)` pairs,
    /// clearing it first so the result contains exactly the given set
    /// (data model invariant 6).
    pub async fn build_index(
        &self,
        index: &dyn VectorIndex,
        chunks: Vec<(i64, Vec<f32>)>,
    ) -> Result<()> {
        index.clear().await;
        let model_name = self.active_model().model_name().to_string();
        let entries: Vec<(i64, Embedding)> = chunks
            .into_iter()
            .map(|(id, vector)| {
                let dimensions = vector.len();
                (
                    id,
                    Embedding {
                        vector,
                        model: model_name.clone(),
                        dimensions,
                    },
                )
            })
            .collect();
        index.add_many(entries).await
    }

    /// `stats()` (§4.3.1). `index_size` is supplied by the caller, since
    /// the vector index is a separate component (C4) this service does
    /// not own.
    pub fn stats(&self, index_size: usize) -> EmbeddingStats {
        let model = self.active_model();
        EmbeddingStats {
            mode: self.mode(),
            model_name: model.model_name().to_string(),
            dimensions: model.dimensions(),
            cache_entries: self.cache.entry_count(),
            cache_hits: self.hits.load(Ordering::Relaxed),
            cache_misses: self.misses.load(Ordering::Relaxed),
            index_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::embedding::hash_fallback::HASH_FALLBACK_DIMENSIONS;

    fn service_with_forced_no_ml() -> EmbeddingService {
        let mut config = EmbeddingConfig::default();
        config.no_ml_mode = true;
        EmbeddingService::new(config, true, Arc::new(HashFallbackModel::new()))
    }

    #[tokio::test]
    async fn no_ml_mode_is_deterministic_and_fixed_dimension() {
        // scenario 4 of the spec's end-to-end suite
        let service = service_with_forced_no_ml();
        let a = service.encode("المادة الأولى").await.unwrap();
        let b = service.encode("المادة الأولى").await.unwrap();
        assert_eq!(a.vector, b.vector);
        assert_eq!(a.dimensions, HASH_FALLBACK_DIMENSIONS);
        assert!((service.cosine_similarity(&a.vector, &a.vector) - 1.0).abs() < 1e-5);

        let c = service.encode("نص مختلف كليا").await.unwrap();
        let cross = service.cosine_similarity(&a.vector, &c.vector);
        assert!(cross < 1.0 && cross > -1.0);
        assert_eq!(service.mode(), EmbeddingMode::HashFallback);
    }

    #[tokio::test]
    async fn empty_input_returns_zero_vector() {
        let service = service_with_forced_no_ml();
        let embedding = service.encode("   ").await.unwrap();
        assert!(embedding.is_zero());
        assert_eq!(embedding.dimensions, HASH_FALLBACK_DIMENSIONS);
    }

    #[tokio::test]
    async fn batch_and_single_path_agree() {
        let service = service_with_forced_no_ml();
        let texts = vec!["نص أول".to_string(), "نص ثاني".to_string()];
        let batch = service.encode_batch(&texts).await.unwrap();
        for (text, outcome) in texts.iter().zip(batch.iter()) {
            let single = service.encode(text).await.unwrap();
            match outcome {
                BatchOutcome::Ok(vector) => assert_eq!(vector, &single.vector),
                BatchOutcome::Err(e) => panic!("unexpected batch failure: {e}"),
            }
        }
    }

    #[tokio::test]
    async fn cache_hit_rate_reported_in_stats() {
        let service = service_with_forced_no_ml();
        let _ = service.encode("نص متكرر").await.unwrap();
        let _ = service.encode("نص متكرر").await.unwrap();
        let stats = service.stats(0);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_misses, 1);
        assert!((stats.cache_hit_rate() - 0.5).abs() < 1e-9);
    }
}
