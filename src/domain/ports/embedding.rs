//! Port for the neural model backing the Embedding Service (C3).
//!
//! `EmbeddingService` (in [`crate::infrastructure::embedding`]) owns
//! caching, batching and the memory guard; this trait is only the thin
//! "turn already-normalized, already-truncated text into a vector" seam,
//! so the hash-fallback model and a real model can be swapped without
//! touching the service.

use crate::domain::error::Result;
use async_trait::async_trait;

/// A model capable of turning text into a fixed-dimension dense vector.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Encode a single already-normalized, already-truncated text.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>>;

    /// Encode a mini-batch in one call. Implementations that have no
    /// native batch API may loop over [`Self::embed_one`]; the default
    /// does exactly that.
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed_one(text).await?);
        }
        Ok(out)
    }

    /// Dimensionality of vectors this model produces.
    fn dimensions(&self) -> usize;

    /// Stable identifier surfaced in `stats()` and stored on each
    /// [`crate::domain::types::Embedding`].
    fn model_name(&self) -> &str;
}
