//! Real sentence-embedding model backing (§4.3, default configuration).
//!
//! Loads a multilingual sentence-transformer through `fastembed`'s ONNX
//! runtime on first use. This is the "documented extension point" named in
//! SPEC_FULL §4.3: [`EmbeddingService`](super::service::EmbeddingService)
//! only ever talks to the [`EmbeddingModel`] trait, so swapping this for a
//! different local or remote model never touches caching, batching, or the
//! memory guard.

use crate::domain::error::{Error, Result};
use crate::domain::ports::embedding::EmbeddingModel;
use async_trait::async_trait;
use fastembed::{EmbeddingModel as FastEmbedModelId, InitOptions, TextEmbedding};
use std::sync::Mutex;

/// Dimensionality of `paraphrase-multilingual-mpnet-base-v2`, this crate's
/// default model identity (§9 Open Question resolution).
pub const DEFAULT_MODEL_DIMENSIONS: usize = 768;

/// Lazily-initialized wrapper around `fastembed::TextEmbedding`. The model
/// is downloaded/loaded on first [`EmbeddingModel::embed_one`] or
/// [`EmbeddingModel::embed_many`] call, not at construction, matching
/// §4.3.1's "load the model... synchronous-at-first-use" contract.
pub struct FastEmbedTextModel {
    model_name: String,
    dimensions: usize,
    inner: Mutex<Option<TextEmbedding>>,
}

impl FastEmbedTextModel {
    /// `model_name` is stored verbatim for `stats()`; the actual weights
    /// loaded are always the multilingual paraphrase model this crate
    /// standardizes on (see DESIGN.md for why a single fixed id is used
    /// rather than a free-form mapping table).
    pub fn new(model_name: impl Into<String>, dimensions: usize) -> Self {
        Self {
            model_name: model_name.into(),
            dimensions,
            inner: Mutex::new(None),
        }
    }

    fn ensure_loaded(&self) -> Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| Error::internal("embedding model lock poisoned"))?;
        if guard.is_some() {
            return Ok(());
        }

        let init = InitOptions::new(FastEmbedModelId::ParaphraseMLMpnetBaseV2)
            .with_show_download_progress(false);
        let model = TextEmbedding::try_new(init)
            .map_err(|e| Error::service_unavailable(format!("model load failed: {e}")))?;
        *guard = Some(model);
        Ok(())
    }

    fn embed_blocking(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        self.ensure_loaded()?;
        let guard = self
            .inner
            .lock()
            .map_err(|_| Error::internal("embedding model lock poisoned"))?;
        let model = guard
            .as_ref()
            .ok_or_else(|| Error::service_unavailable("embedding model not initialized"))?;
        model
            .embed(texts, None)
            .map_err(|e| Error::internal(format!("embedding inference failed: {e}")))
    }
}

#[async_trait]
impl EmbeddingModel for FastEmbedTextModel {
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut batch = self.embed_many(std::slice::from_ref(&text.to_string())).await?;
        batch.pop().ok_or_else(|| Error::internal("empty embedding batch"))
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let texts = texts.to_vec();
        let model_name = self.model_name.clone();
        // ONNX inference is CPU-bound; `block_in_place` hands this thread
        // off to the multi-threaded runtime's blocking pool for the
        // duration of the call so a single encode never stalls other
        // handlers sharing the reactor (§5), without requiring `self` to
        // be `'static`.
        let result = tokio::task::block_in_place(|| self.embed_blocking(texts));
        result.map_err(|e| {
            Error::internal(format!("fastembed batch failed for model {model_name}: {e}"))
        })
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
