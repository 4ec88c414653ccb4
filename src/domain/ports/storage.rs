//! Storage Collaborator contract (C7).
//!
//! The relational schema, migrations, and CRUD surface live outside this
//! crate. What the core needs from storage is exactly the five operations
//! below; everything else (uploads, parsing, auth) is someone else's
//! concern.

use crate::domain::error::Result;
use crate::domain::types::{
    ArticleMetadata, BranchMetadata, CaseMetadata, Chunk, ChapterMetadata, LawMetadata,
    ParentStatus, SearchSourceType, SectionMetadata,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use std::collections::HashMap;

/// A stream of chunks, matching the specification's `async iterator<Chunk>`
/// return type for storage reads.
pub type ChunkStream = BoxStream<'static, Result<Chunk>>;

/// Selects which chunks [`StorageCollaborator::get_chunks`] returns. Mirrors
/// [`crate::domain::types::SearchFilters`] plus the parent/embedding-state
/// axes the maintenance API needs.
#[derive(Debug, Clone, Default)]
pub struct ChunkFilter {
    pub parent_id: Option<i64>,
    /// Restrict to exactly these chunk ids, regardless of parent —
    /// backs the batch-by-id maintenance entry point (§6
    /// `/embeddings/chunks/batch-generate`).
    pub chunk_ids: Option<Vec<i64>>,
    pub source_type: Option<SearchSourceType>,
    pub law_source_id: Option<i64>,
    pub jurisdiction: Option<String>,
    pub case_id: Option<i64>,
    pub verified_only: bool,
    pub min_date: Option<DateTime<Utc>>,
    pub max_date: Option<DateTime<Utc>>,
    /// Only chunks with `embedding_vector = NULL`.
    pub missing_embedding_only: bool,
}

/// The hierarchical metadata a bulk fetch returns for one chunk, used by
/// the Search Service's enrichment step.
#[derive(Debug, Clone)]
pub enum ParentMetadata {
    Law {
        law: LawMetadata,
        branch: Option<BranchMetadata>,
        chapter: Option<ChapterMetadata>,
        article: ArticleMetadata,
    },
    Case {
        case: CaseMetadata,
        section: SectionMetadata,
    },
}

/// External collaborator owning persistence. The core never holds a
/// long-running transaction across a model call, and every method here is
/// an explicit suspension point (§5).
#[async_trait]
pub trait StorageCollaborator: Send + Sync {
    /// Stream chunks matching `filter`.
    async fn get_chunks(&self, filter: ChunkFilter) -> Result<ChunkStream>;

    /// Stream chunks with no embedding yet, optionally scoped to one
    /// parent.
    async fn get_chunks_missing_embedding(&self, parent_id: Option<i64>) -> Result<ChunkStream>;

    /// Persist `(chunk_id, vector)` pairs atomically. A partial failure
    /// must not leave some vectors of this call committed and others not.
    async fn save_embeddings(&self, updates: &[(i64, Vec<f32>)]) -> Result<()>;

    /// Single bulk fetch of hierarchical metadata for a set of chunk ids.
    /// Enrichment must never N+1 — this is the only allowed shape.
    async fn get_parent_metadata_bulk(
        &self,
        chunk_ids: &[i64],
    ) -> Result<HashMap<i64, ParentMetadata>>;

    /// Transition a parent's lifecycle status.
    async fn set_parent_status(&self, parent_id: i64, status: ParentStatus) -> Result<()>;

    /// All parent ids currently in `status`, used by `generate_pending` to
    /// find work.
    async fn parents_by_status(&self, status: ParentStatus) -> Result<Vec<i64>>;
}
