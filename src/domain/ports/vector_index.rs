//! Vector Index contract (C4).
//!
//! A brute-force in-process implementation lives in
//! [`crate::infrastructure::vector_index`]; a FAISS-backed implementation
//! would satisfy the same trait but is not shipped here (see DESIGN.md).

use crate::domain::error::Result;
use crate::domain::types::Embedding;
use async_trait::async_trait;

/// One candidate returned by [`VectorIndex::search`]: a chunk id and its
/// raw cosine similarity against the query vector, before any boosting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredCandidate {
    pub chunk_id: i64,
    pub similarity: f32,
}

/// An in-memory nearest-neighbor index over chunk embeddings.
///
/// All vectors held by one index share a single dimensionality, fixed by
/// whichever embedding was added first; implementations reject a mismatched
/// `add` rather than silently truncating or padding.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace the vector for `chunk_id`.
    async fn add(&self, chunk_id: i64, embedding: Embedding) -> Result<()>;

    /// Insert or replace many vectors in one call.
    async fn add_many(&self, entries: Vec<(i64, Embedding)>) -> Result<()> {
        for (chunk_id, embedding) in entries {
            self.add(chunk_id, embedding).await?;
        }
        Ok(())
    }

    /// Return the `top_k` chunks with highest cosine similarity to `query`,
    /// descending by similarity, ties broken by ascending `chunk_id`.
    async fn search(&self, query: &Embedding, top_k: usize) -> Result<Vec<ScoredCandidate>>;

    /// Number of vectors currently held.
    fn size(&self) -> usize;

    /// Drop every vector, as the first step of a full rebuild.
    async fn clear(&self);
}
