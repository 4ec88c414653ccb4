//! Core entities of the Arabic legal search domain.
//!
//! These types are deliberately thin: the relational schema, migrations and
//! CRUD surface belong to the Ingestion and Storage Collaborators, which are
//! external to this crate. What lives here is the shape the core needs to
//! reason about chunks, their hierarchy, and search results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A dense vector representation of text. Every vector produced within one
/// [`EmbeddingMode`] shares the same `dimensions` (invariant 1 of the data
/// model: embedding dimension is a single process-wide constant).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Embedding {
    /// The vector values.
    pub vector: Vec<f32>,
    /// Identifier of the model (or `"hash-fallback"`) that produced this
    /// vector.
    pub model: String,
    /// `vector.len()`, stored redundantly so callers can validate without
    /// re-deriving it.
    pub dimensions: usize,
}

impl Embedding {
    /// A zero vector of the given dimension, returned for empty input per
    /// the embedding service's failure semantics.
    pub fn zero(dimensions: usize, model: impl Into<String>) -> Self {
        Self {
            vector: vec![0.0; dimensions],
            model: model.into(),
            dimensions,
        }
    }

    /// `true` when every component is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.vector.iter().all(|v| *v == 0.0)
    }
}

/// Which embedding strategy produced the index currently in use, replacing
/// the source system's two ad hoc `use_faiss` / `no_ml_mode` booleans with a
/// single enumerated state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EmbeddingMode {
    /// Real model, vectors served through the in-memory vector index.
    ModelWithIndex,
    /// Real model, but candidates are scored by brute-force cosine (index
    /// unavailable or filters force a full scan).
    ModelBruteForce,
    /// Deterministic hash-derived vectors; no model loaded.
    HashFallback,
}

/// The kind of legal instrument a [`LawSource`] represents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LawSourceKind {
    Law,
    Regulation,
    Code,
    Directive,
    Decree,
}

/// Lifecycle label carried by a [`LawSource`] or [`LegalCase`]. Only
/// `Processed` and `Indexed` parents have discoverable chunks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParentStatus {
    /// Chunks created, no embeddings yet.
    Raw,
    /// A generation run is in flight for this parent.
    Processing,
    /// All chunks under this parent carry valid embeddings.
    Processed,
    /// Processed and included in the last vector index build.
    Indexed,
}

impl ParentStatus {
    /// Whether chunks belonging to a parent in this status are eligible for
    /// search (data model lifecycle: "discoverable only when processed or
    /// indexed").
    pub fn is_discoverable(self) -> bool {
        matches!(self, Self::Processed | Self::Indexed)
    }
}

/// Identity of a legal text, owned by ingestion and referenced, never
/// mutated, by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LawSource {
    pub id: i64,
    pub name: String,
    pub kind: LawSourceKind,
    pub jurisdiction: String,
    pub issuing_authority: String,
    pub issue_date: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
    pub status: ParentStatus,
}

/// A branch under a [`LawSource`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LawBranch {
    pub id: i64,
    pub law_source_id: i64,
    pub name: String,
}

/// A chapter under a [`LawBranch`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LawChapter {
    pub id: i64,
    pub branch_id: i64,
    pub name: String,
}

/// A single article: the primary embedding unit on the law side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LawArticle {
    pub id: i64,
    pub law_source_id: i64,
    pub branch_id: Option<i64>,
    pub chapter_id: Option<i64>,
    pub article_number: String,
    pub title: Option<String>,
    pub content: String,
    pub keywords: Vec<String>,
}

/// A judicial decision, owned by ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegalCase {
    pub id: i64,
    pub title: String,
    pub jurisdiction: String,
    pub decided_at: DateTime<Utc>,
    pub status: ParentStatus,
}

/// The typed section a judicial decision is split into.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SectionType {
    Summary,
    Facts,
    Arguments,
    Ruling,
    LegalBasis,
}

impl SectionType {
    /// Arabic label used as the header line in [`crate::domain::chunking`]
    /// output, e.g. `"الوقائع"` for `Facts`.
    pub fn label_ar(self) -> &'static str {
        match self {
            Self::Summary => "الملخص",
            Self::Facts => "الوقائع",
            Self::Arguments => "الدفوع",
            Self::Ruling => "منطوق الحكم",
            Self::LegalBasis => "السند القانوني",
        }
    }
}

/// A single section of a [`LegalCase`]: the primary embedding unit on the
/// case side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseSection {
    pub id: i64,
    pub case_id: i64,
    pub section_type: SectionType,
    pub content: String,
}

/// Which half of the hierarchy a [`Chunk`] belongs to and the stable ids
/// that tie it back to its owner (data model invariant 3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "source_type", rename_all = "snake_case")]
pub enum ChunkParent {
    LawArticle {
        law_source_id: i64,
        branch_id: Option<i64>,
        chapter_id: Option<i64>,
        article_id: i64,
    },
    CaseSection {
        case_id: i64,
        section_id: i64,
    },
}

impl ChunkParent {
    /// `"law_article"` or `"case_section"`, matching the wire value of
    /// `source_type` in the data model.
    pub fn source_type(&self) -> &'static str {
        match self {
            Self::LawArticle { .. } => "law_article",
            Self::CaseSection { .. } => "case_section",
        }
    }
}

/// The indexable unit: a context-enriched text segment plus its embedding
/// and hierarchical back-references. This is the central entity of the
/// core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable integer id, assigned by the Storage Collaborator.
    pub id: i64,
    /// Context-enriched text as emitted by [`crate::domain::chunking`].
    pub content: String,
    /// Absent until the embedding service produces it.
    pub embedding_vector: Option<Vec<f32>>,
    /// Back-references to the owning article or case section.
    pub parent: ChunkParent,
    /// 0-based position within the source article/section.
    pub chunk_index: usize,
    /// Approximate token count of `content`.
    pub tokens_count: usize,
    pub verified_by_admin: bool,
    pub created_at: DateTime<Utc>,
    /// Inherited from the parent document; only `Processed`/`Indexed`
    /// chunks are discoverable.
    pub status: ParentStatus,
}

impl Chunk {
    /// Data model invariant 2: discoverable only with a present,
    /// correctly-sized embedding and a processed/indexed parent.
    pub fn is_discoverable(&self, expected_dimensions: usize) -> bool {
        self.status.is_discoverable()
            && matches!(
                &self.embedding_vector,
                Some(v) if !v.is_empty() && v.len() == expected_dimensions
            )
    }
}

/// Filters accepted by [`crate::application::search::SearchService`],
/// matching the enumerated set in the specification's Search Service
/// contract.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct SearchFilters {
    pub law_source_id: Option<i64>,
    /// Matched case-insensitively against `LawSource::jurisdiction`.
    pub jurisdiction: Option<String>,
    pub case_id: Option<i64>,
    #[serde(default)]
    pub verified_only: bool,
    pub min_date: Option<DateTime<Utc>>,
    pub max_date: Option<DateTime<Utc>>,
}

impl SearchFilters {
    /// No filter fields set; used to decide whether the index's fast path
    /// (no post-filtering) is available.
    pub fn is_empty(&self) -> bool {
        self.law_source_id.is_none()
            && self.jurisdiction.is_none()
            && self.case_id.is_none()
            && !self.verified_only
            && self.min_date.is_none()
            && self.max_date.is_none()
    }
}

/// Which half of the corpus a search targets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SearchSourceType {
    Law,
    Case,
}

/// A validated `find_similar` request. Constructed via
/// [`SearchRequest::new`], which enforces the boundary checks from §4.5
/// (query length, `top_k` range, `threshold` range) before anything is
/// encoded.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SearchRequest {
    #[validate(length(min = 3, message = "query must be at least 3 characters"))]
    pub query: String,
    #[validate(range(min = 1, max = 100, message = "top_k must be within 1..=100"))]
    pub top_k: usize,
    #[validate(range(min = 0.0, max = 1.0, message = "threshold must be within 0.0..=1.0"))]
    pub threshold: f32,
    #[validate(nested)]
    pub filters: SearchFilters,
    pub source_type: SearchSourceType,
}

impl SearchRequest {
    /// Default `top_k` (10) and `threshold` (0.6 — the Arabic-corpus
    /// default mandated by the spec, deliberately lower than the generic
    /// 0.7 because Arabic sentence-transformer scores distribute lower).
    pub fn new(query: impl Into<String>, source_type: SearchSourceType) -> Self {
        Self {
            query: query.into(),
            top_k: 10,
            threshold: 0.6,
            filters: SearchFilters::default(),
            source_type,
        }
    }
}

/// Metadata for one level of the law hierarchy, attached to a search result
/// by the bulk enrichment step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LawMetadata {
    pub id: i64,
    pub name: String,
    pub jurisdiction: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchMetadata {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterMetadata {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleMetadata {
    pub id: i64,
    pub article_number: String,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseMetadata {
    pub id: i64,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionMetadata {
    pub id: i64,
    pub section_type: SectionType,
}

/// One ranked, enriched search hit. Field names match the wire contract in
/// the specification's Collaborator Contracts section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedResult {
    pub id: i64,
    pub content: String,
    pub similarity: f32,
    pub source_type: &'static str,
    pub verified: bool,
    pub chunk_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub law_metadata: Option<LawMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_metadata: Option<ArticleMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_metadata: Option<BranchMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapter_metadata: Option<ChapterMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_metadata: Option<CaseMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_metadata: Option<SectionMetadata>,
}

/// A single `{field, message}` validation/error entry in an [`ApiResponse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub field: String,
    pub message: String,
}

/// The envelope every Search API and Index Maintenance API call returns.
/// Clients depend on this exact top-level shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<ApiError>,
}

impl<T> ApiResponse<T> {
    /// A successful response, including successful-but-empty results.
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            errors: Vec::new(),
        }
    }

    /// An error response built from a [`crate::domain::error::Error`].
    pub fn error(err: &crate::domain::error::Error) -> Self {
        Self {
            success: false,
            message: err.to_string(),
            data: None,
            errors: vec![ApiError {
                field: err.kind().to_string(),
                message: err.to_string(),
            }],
        }
    }
}

/// The response payload wrapped by an [`ApiResponse`] for a `find_similar`
/// call, matching the Search API contract in §4.7/§6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponseData {
    pub query: String,
    pub results: Vec<EnrichedResult>,
    pub total_results: usize,
    pub threshold: f32,
}

/// Outcome of encoding one text within a mini-batch. Replaces the source
/// system's exception-as-control-flow: a failure in one text never
/// contaminates the rest of the batch (§4.3.3, §9 redesign note).
#[derive(Debug, Clone)]
pub enum BatchOutcome {
    Ok(Vec<f32>),
    Err(String),
}

/// Aggregated counts returned by [`crate::application::maintenance`]
/// generation runs (`generate_for_document`, `generate_pending`).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GenerationStats {
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
}

impl GenerationStats {
    pub fn merge(&mut self, other: GenerationStats) {
        self.total += other.total;
        self.processed += other.processed;
        self.failed += other.failed;
    }
}

/// `stats()` payload for the Embedding Service (§4.3.1), exposing cache
/// hit rate, model identity, dimensionality, device and the current
/// [`EmbeddingMode`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingStats {
    pub mode: EmbeddingMode,
    pub model_name: String,
    pub dimensions: usize,
    pub cache_entries: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub index_size: usize,
}

impl EmbeddingStats {
    /// Cache hit rate in `0.0..=1.0`; `0.0` when nothing has been
    /// requested yet.
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

/// Parent counts by lifecycle bucket, part of [`MaintenanceStatus`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ParentStatusCounts {
    pub raw: usize,
    pub processing: usize,
    pub processed: usize,
    pub indexed: usize,
}

/// `status()` payload for Index Maintenance (§4.6), reporting corpus-wide
/// embedding completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceStatus {
    pub total_chunks: usize,
    pub chunks_with_embeddings: usize,
    pub percent_complete: f32,
    pub parents_by_status: ParentStatusCounts,
    pub index_size: usize,
    pub last_rebuild_failed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_embedding_has_requested_length() {
        let e = Embedding::zero(768, "hash-fallback");
        assert_eq!(e.vector.len(), 768);
        assert!(e.is_zero());
    }

    #[test]
    fn parent_status_discoverability() {
        assert!(!ParentStatus::Raw.is_discoverable());
        assert!(!ParentStatus::Processing.is_discoverable());
        assert!(ParentStatus::Processed.is_discoverable());
        assert!(ParentStatus::Indexed.is_discoverable());
    }

    #[test]
    fn chunk_requires_matching_dimension() {
        let chunk = Chunk {
            id: 1,
            content: "x".into(),
            embedding_vector: Some(vec![0.0; 10]),
            parent: ChunkParent::LawArticle {
                law_source_id: 1,
                branch_id: None,
                chapter_id: None,
                article_id: 1,
            },
            chunk_index: 0,
            tokens_count: 1,
            verified_by_admin: false,
            created_at: Utc::now(),
            status: ParentStatus::Processed,
        };
        assert!(chunk.is_discoverable(10));
        assert!(!chunk.is_discoverable(768));
    }

    #[test]
    fn empty_filters_detected() {
        assert!(SearchFilters::default().is_empty());
        let f = SearchFilters {
            verified_only: true,
            ..Default::default()
        };
        assert!(!f.is_empty());
    }
}
