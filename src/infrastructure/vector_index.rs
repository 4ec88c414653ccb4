//! Brute-force Vector Index (C4).
//!
//! The specification treats a library-backed index (FAISS) as an
//! optional optimization: the Search Service must not observe a
//! difference beyond latency. A FAISS-backed `VectorIndex` would be a
//! drop-in behind the same trait; it is not vendored here (see
//! DESIGN.md — fabricating bindings for an unavailable library is worse
//! than not shipping one).

use crate::domain::error::{Error, Result};
use crate::domain::ports::vector_index::{ScoredCandidate, VectorIndex};
use crate::domain::types::Embedding;
use async_trait::async_trait;
use std::collections::BinaryHeap;
use std::sync::RwLock;

#[derive(Clone, Copy, PartialEq)]
struct HeapEntry {
    similarity: f32,
    chunk_id: i64,
}

impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reversed so `BinaryHeap` (a max-heap) behaves as a min-heap on
        // similarity, letting us keep only the best `top_k` seen so far.
        other
            .similarity
            .partial_cmp(&self.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| self.chunk_id.cmp(&other.chunk_id))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

struct State {
    dimensions: Option<usize>,
    vectors: Vec<(i64, Vec<f32>)>,
}

/// Brute-force cosine-similarity index. Vectors are expected to already
/// be unit-normalized by the embedding service, so inner product and
/// cosine similarity coincide.
pub struct BruteForceIndex {
    state: RwLock<State>,
}

impl Default for BruteForceIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl BruteForceIndex {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                dimensions: None,
                vectors: Vec::new(),
            }),
        }
    }
}

fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[async_trait]
impl VectorIndex for BruteForceIndex {
    async fn add(&self, chunk_id: i64, embedding: Embedding) -> Result<()> {
        let mut state = self.state.write().expect("vector index lock poisoned");
        match state.dimensions {
            Some(d) if d != embedding.dimensions => {
                return Err(Error::invalid_input(format!(
                    "embedding dimension {} does not match index dimension {d}",
                    embedding.dimensions
                )));
            }
            None => state.dimensions = Some(embedding.dimensions),
            _ => {}
        }

        if let Some(existing) = state.vectors.iter_mut().find(|(id, _)| *id == chunk_id) {
            existing.1 = embedding.vector;
        } else {
            state.vectors.push((chunk_id, embedding.vector));
        }
        Ok(())
    }

    async fn search(&self, query: &Embedding, top_k: usize) -> Result<Vec<ScoredCandidate>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let state = self.state.read().expect("vector index lock poisoned");
        if let Some(d) = state.dimensions {
            if d != query.dimensions {
                return Err(Error::invalid_input(format!(
                    "query dimension {} does not match index dimension {d}",
                    query.dimensions
                )));
            }
        }

        let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::with_capacity(top_k + 1);
        for (chunk_id, vector) in &state.vectors {
            let similarity = inner_product(&query.vector, vector);
            heap.push(HeapEntry {
                similarity,
                chunk_id: *chunk_id,
            });
            if heap.len() > top_k {
                heap.pop();
            }
        }

        let mut results: Vec<ScoredCandidate> = heap
            .into_iter()
            .map(|e| ScoredCandidate {
                chunk_id: e.chunk_id,
                similarity: e.similarity,
            })
            .collect();
        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        Ok(results)
    }

    fn size(&self) -> usize {
        self.state.read().expect("vector index lock poisoned").vectors.len()
    }

    async fn clear(&self) {
        let mut state = self.state.write().expect("vector index lock poisoned");
        state.vectors.clear();
        state.dimensions = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emb(v: Vec<f32>) -> Embedding {
        let d = v.len();
        Embedding {
            vector: v,
            model: "test".to_string(),
            dimensions: d,
        }
    }

    #[tokio::test]
    async fn returns_top_k_descending_with_id_tie_break() {
        let index = BruteForceIndex::new();
        index.add(3, emb(vec![1.0, 0.0])).await.unwrap();
        index.add(1, emb(vec![1.0, 0.0])).await.unwrap();
        index.add(2, emb(vec![0.0, 1.0])).await.unwrap();

        let results = index.search(&emb(vec![1.0, 0.0]), 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk_id, 1);
        assert!((results[0].similarity - 1.0).abs() < 1e-6);
        assert_eq!(results[1].chunk_id, 3);
    }

    #[tokio::test]
    async fn rejects_mismatched_dimensions() {
        let index = BruteForceIndex::new();
        index.add(1, emb(vec![1.0, 0.0])).await.unwrap();
        let err = index.add(2, emb(vec![1.0, 0.0, 0.0])).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }

    #[tokio::test]
    async fn clear_resets_size_and_dimension_lock() {
        let index = BruteForceIndex::new();
        index.add(1, emb(vec![1.0, 0.0])).await.unwrap();
        assert_eq!(index.size(), 1);
        index.clear().await;
        assert_eq!(index.size(), 0);
        index.add(1, emb(vec![1.0, 0.0, 0.0])).await.unwrap();
    }
}
