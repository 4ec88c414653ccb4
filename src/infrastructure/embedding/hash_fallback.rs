//! Deterministic hash-fallback embedding model (§4.3.5, NO-ML mode).
//!
//! Used whenever the memory guard trips, the real model fails to load, or
//! a caller forces `no_ml_mode`. Same text always yields the same vector;
//! cosine similarity stays well-defined but carries no semantic signal
//! beyond lexical equality — search quality degrades gracefully rather
//! than the service going down.

use crate::domain::error::Result;
use crate::domain::ports::embedding::EmbeddingModel;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Fixed dimension used by every vector this model produces, independent
/// of whatever `model_dimensions` the real model path is configured for
/// (§9 Open Question resolution: the two dimensions describe different
/// [`crate::domain::types::EmbeddingMode`] variants and are never mixed
/// within one index).
pub const HASH_FALLBACK_DIMENSIONS: usize = 256;

/// A model-free embedding backed by repeated SHA-256 hashing of the input
/// text, unpacked into floats in `[0, 1]`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HashFallbackModel;

impl HashFallbackModel {
    pub fn new() -> Self {
        Self
    }

    /// Hash `text` into exactly [`HASH_FALLBACK_DIMENSIONS`] floats in
    /// `[0, 1]` by chaining SHA-256 over an incrementing counter until
    /// enough bytes have been produced, then normalizing the resulting
    /// vector to unit length so it behaves like every other embedding in
    /// the system under cosine similarity.
    fn hash_embed(text: &str) -> Vec<f32> {
        let mut bytes = Vec::with_capacity(HASH_FALLBACK_DIMENSIONS * 4);
        let mut counter: u64 = 0;
        while bytes.len() < HASH_FALLBACK_DIMENSIONS * 4 {
            let mut hasher = Sha256::new();
            hasher.update(text.as_bytes());
            hasher.update(counter.to_le_bytes());
            bytes.extend_from_slice(&hasher.finalize());
            counter += 1;
        }
        bytes.truncate(HASH_FALLBACK_DIMENSIONS * 4);

        let mut vector: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|chunk| {
                let raw = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                raw as f32 / u32::MAX as f32
            })
            .collect();

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingModel for HashFallbackModel {
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let text = text.to_string();
        // SHA-256 over ~256 dims is cheap, but the contract requires
        // every model call to be a potential worker-offload point so a
        // future real model is a drop-in without a call-site change.
        let vector =
            tokio::task::spawn_blocking(move || HashFallbackModel::hash_embed(&text)).await;
        match vector {
            Ok(v) => Ok(v),
            Err(_) => Ok(Self::hash_embed(&text.clone())),
        }
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        use rayon::prelude::*;
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || {
            texts
                .par_iter()
                .map(|t| HashFallbackModel::hash_embed(t))
                .collect()
        })
        .await
        .map_err(|e| crate::domain::error::Error::internal(format!("hash batch join: {e}")))
    }

    fn dimensions(&self) -> usize {
        HASH_FALLBACK_DIMENSIONS
    }

    fn model_name(&self) -> &str {
        "hash-fallback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_text_yields_same_vector_of_fixed_length() {
        let model = HashFallbackModel::new();
        let a = model.embed_one("المادة الأولى").await.unwrap();
        let b = model.embed_one("المادة الأولى").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), HASH_FALLBACK_DIMENSIONS);
    }

    #[tokio::test]
    async fn self_similarity_is_one_and_distinct_texts_are_not_colinear() {
        let model = HashFallbackModel::new();
        let a = model.embed_one("نص أول").await.unwrap();
        let b = model.embed_one("نص مختلف تماما").await.unwrap();

        let cos = crate::domain::scoring::cosine_similarity(&a, &a);
        assert!((cos - 1.0).abs() < 1e-5);

        let cross = crate::domain::scoring::cosine_similarity(&a, &b);
        assert!(cross < 1.0 && cross > -1.0);
    }

    #[tokio::test]
    async fn batch_path_matches_single_path() {
        let model = HashFallbackModel::new();
        let texts = vec!["نص 1".to_string(), "نص 2".to_string()];
        let batch = model.embed_many(&texts).await.unwrap();
        for (text, vector) in texts.iter().zip(batch.iter()) {
            let single = model.embed_one(text).await.unwrap();
            assert_eq!(&single, vector);
        }
    }
}
