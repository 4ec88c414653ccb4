//! Search Service (C5): `find_similar` and its hybrid variant.
//!
//! Orchestrates the Embedding Service, Vector Index, Storage Collaborator
//! and Query Cache behind the single read path described in SPEC_FULL
//! §4.5. Nothing here re-implements cosine similarity or the relevance
//! boost — both live in [`crate::domain::scoring`] so the ranking laws can
//! be asserted without a runtime.

use crate::domain::error::{Error, Result};
use crate::domain::ports::storage::{ChunkFilter, ParentMetadata, StorageCollaborator};
use crate::domain::ports::vector_index::VectorIndex;
use crate::domain::scoring;
use crate::domain::types::{
    ArticleMetadata, BranchMetadata, CaseMetadata, ChapterMetadata, Embedding, EnrichedResult,
    LawMetadata, SearchFilters, SearchRequest, SearchSourceType, SectionMetadata,
};
use crate::infrastructure::cache::{threshold_millis, QueryCache, QueryCacheKey};
use crate::infrastructure::config::ScoringConfig;
use crate::infrastructure::embedding::EmbeddingService;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use validator::Validate;

/// Deterministically renders a [`SearchFilters`] into the string used as
/// part of the query cache key (§4.5 step 1: "sorted(filters)"). Field
/// order is fixed here rather than derived from struct field order, so
/// the key is stable across refactors of `SearchFilters` itself.
fn filter_repr(filters: &SearchFilters) -> String {
    format!(
        "law_source_id={:?}|jurisdiction={:?}|case_id={:?}|verified_only={}|min_date={:?}|max_date={:?}",
        filters.law_source_id,
        filters.jurisdiction.as_deref().map(str::to_lowercase),
        filters.case_id,
        filters.verified_only,
        filters.min_date,
        filters.max_date,
    )
}

fn chunk_filter_from_search(filters: &SearchFilters, source_type: SearchSourceType) -> ChunkFilter {
    ChunkFilter {
        parent_id: None,
        source_type: Some(source_type),
        law_source_id: filters.law_source_id,
        jurisdiction: filters.jurisdiction.clone(),
        case_id: filters.case_id,
        verified_only: filters.verified_only,
        min_date: filters.min_date,
        max_date: filters.max_date,
        missing_embedding_only: false,
    }
}

fn enrich_one(chunk_id: i64, similarity: f32, content: &str, chunk_index: usize, verified: bool, metadata: Option<&ParentMetadata>) -> EnrichedResult {
    let mut result = EnrichedResult {
        id: chunk_id,
        content: content.to_string(),
        similarity,
        source_type: "law_article",
        verified,
        chunk_index,
        law_metadata: None,
        article_metadata: None,
        branch_metadata: None,
        chapter_metadata: None,
        case_metadata: None,
        section_metadata: None,
    };
    match metadata {
        Some(ParentMetadata::Law {
            law,
            branch,
            chapter,
            article,
        }) => {
            result.source_type = "law_article";
            result.law_metadata = Some(LawMetadata {
                id: law.id,
                name: law.name.clone(),
                jurisdiction: law.jurisdiction.clone(),
            });
            result.branch_metadata = branch.as_ref().map(|b| BranchMetadata {
                id: b.id,
                name: b.name.clone(),
            });
            result.chapter_metadata = chapter.as_ref().map(|c| ChapterMetadata {
                id: c.id,
                name: c.name.clone(),
            });
            result.article_metadata = Some(ArticleMetadata {
                id: article.id,
                article_number: article.article_number.clone(),
                title: article.title.clone(),
            });
        }
        Some(ParentMetadata::Case { case, section }) => {
            result.source_type = "case_section";
            result.case_metadata = Some(CaseMetadata {
                id: case.id,
                title: case.title.clone(),
            });
            result.section_metadata = Some(SectionMetadata {
                id: section.id,
                section_type: section.section_type,
            });
        }
        None => {}
    }
    result
}

/// A scored-but-not-yet-enriched candidate carried between the
/// similarity and ranking stages.
struct RankedCandidate {
    chunk_id: i64,
    content: String,
    chunk_index: usize,
    verified: bool,
    created_at: chrono::DateTime<Utc>,
    score: f32,
}

/// Orchestrates one `find_similar` call end to end.
pub struct SearchService {
    embeddings: EmbeddingService,
    index: Arc<dyn VectorIndex>,
    storage: Arc<dyn StorageCollaborator>,
    query_cache: QueryCache,
    scoring: ScoringConfig,
}

impl SearchService {
    pub fn new(
        embeddings: EmbeddingService,
        index: Arc<dyn VectorIndex>,
        storage: Arc<dyn StorageCollaborator>,
        query_cache: QueryCache,
        scoring: ScoringConfig,
    ) -> Self {
        Self {
            embeddings,
            index,
            storage,
            query_cache,
            scoring,
        }
    }

    /// `find_similar` (§4.5): validate, check the query cache, embed the
    /// query, retrieve candidates, filter by threshold, bulk-enrich, rank
    /// and cache the result.
    pub async fn find_similar(&self, request: &SearchRequest) -> Result<Vec<EnrichedResult>> {
        request.validate()?;

        let normalized_query = crate::domain::normalize::normalize(&request.query);
        let sorted_filter_repr = filter_repr(&request.filters);
        let cache_key = QueryCache::key(&QueryCacheKey {
            normalized_query: &normalized_query,
            top_k: request.top_k,
            threshold_millis: threshold_millis(request.threshold),
            sorted_filter_repr: &sorted_filter_repr,
            source_type: request.source_type,
        });

        if let Some(cached) = self.query_cache.get(cache_key).await {
            return Ok(cached);
        }

        let results = self.find_similar_uncached(request, &normalized_query).await?;
        self.query_cache.insert(cache_key, results.clone()).await;
        Ok(results)
    }

    async fn find_similar_uncached(
        &self,
        request: &SearchRequest,
        normalized_query: &str,
    ) -> Result<Vec<EnrichedResult>> {
        let query_embedding = self.embeddings.encode(normalized_query).await?;

        let candidates = if request.filters.is_empty() {
            self.candidates_via_index(&query_embedding, request).await?
        } else {
            self.candidates_via_scan(&query_embedding, request).await?
        };

        self.finish(candidates, request).await
    }

    /// Fast path: no filters, so the index's own top-k (over-fetched to
    /// absorb threshold filtering) is authoritative.
    async fn candidates_via_index(
        &self,
        query_embedding: &Embedding,
        request: &SearchRequest,
    ) -> Result<Vec<(i64, f32)>> {
        let over_fetch = (request.top_k * self.scoring.overfetch_multiplier)
            .max(self.scoring.overfetch_floor);
        let hits = self.index.search(query_embedding, over_fetch).await?;
        Ok(hits
            .into_iter()
            .map(|c| (c.chunk_id, c.similarity))
            .collect())
    }

    /// Filtered path: the index cannot express arbitrary storage
    /// predicates, so scan matching chunks from storage and score them
    /// by brute-force cosine against the query vector (§4.5, "filters
    /// force a full scan").
    async fn candidates_via_scan(
        &self,
        query_embedding: &Embedding,
        request: &SearchRequest,
    ) -> Result<Vec<(i64, f32)>> {
        use futures::StreamExt;

        let filter = chunk_filter_from_search(&request.filters, request.source_type);
        let mut stream = self.storage.get_chunks(filter).await?;
        let mut scored = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if !chunk.is_discoverable(query_embedding.dimensions) {
                continue;
            }
            let Some(vector) = chunk.embedding_vector.as_ref() else {
                continue;
            };
            let similarity = scoring::cosine_similarity(&query_embedding.vector, vector);
            scored.push((chunk.id, similarity));
        }
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(scored)
    }

    /// Shared tail of both candidate paths: re-fetch chunk bodies (the
    /// index only returns ids), apply the relevance boost, filter by
    /// `threshold`, bulk-enrich and rank.
    async fn finish(
        &self,
        candidates: Vec<(i64, f32)>,
        request: &SearchRequest,
    ) -> Result<Vec<EnrichedResult>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let chunk_ids: Vec<i64> = candidates.iter().map(|(id, _)| *id).collect();
        let filter = ChunkFilter {
            source_type: Some(request.source_type),
            ..Default::default()
        };
        let chunks_by_id = self.load_chunks(filter, &chunk_ids).await?;

        let now = Utc::now();
        let mut ranked = Vec::with_capacity(candidates.len());
        for (chunk_id, raw_similarity) in candidates {
            let Some(chunk) = chunks_by_id.get(&chunk_id) else {
                continue;
            };
            let score = scoring::relevance_score(
                raw_similarity,
                chunk.verified_by_admin,
                chunk.created_at,
                now,
                self.scoring.verified_boost,
                self.scoring.recency_boost,
                self.scoring.recency_days,
            );
            if score < request.threshold {
                continue;
            }
            ranked.push(RankedCandidate {
                chunk_id,
                content: chunk.content.clone(),
                chunk_index: chunk.chunk_index,
                verified: chunk.verified_by_admin,
                created_at: chunk.created_at,
                score,
            });
        }

        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| scoring::tie_break(a.verified, a.created_at, a.chunk_id, b.verified, b.created_at, b.chunk_id))
        });
        ranked.truncate(request.top_k);

        let ranked_ids: Vec<i64> = ranked.iter().map(|c| c.chunk_id).collect();
        let metadata = self.storage.get_parent_metadata_bulk(&ranked_ids).await?;

        Ok(ranked
            .into_iter()
            .map(|c| {
                enrich_one(
                    c.chunk_id,
                    c.score,
                    &c.content,
                    c.chunk_index,
                    c.verified,
                    metadata.get(&c.chunk_id),
                )
            })
            .collect())
    }

    /// Fetch chunk bodies for exactly `ids`, scoped by `filter.source_type`
    /// so a case-section id never collides with a law-article id.
    async fn load_chunks(
        &self,
        filter: ChunkFilter,
        ids: &[i64],
    ) -> Result<HashMap<i64, crate::domain::types::Chunk>> {
        use futures::StreamExt;
        let wanted: std::collections::HashSet<i64> = ids.iter().copied().collect();
        let mut stream = self.storage.get_chunks(filter).await?;
        let mut out = HashMap::with_capacity(ids.len());
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if wanted.contains(&chunk.id) {
                out.insert(chunk.id, chunk);
            }
        }
        Ok(out)
    }

    /// `find_similar_hybrid` (§4.5 extension): blend vector similarity
    /// with a naive lexical overlap score, `alpha` weighting the vector
    /// term. Defaults to [`ScoringConfig::hybrid_alpha`] when `alpha` is
    /// `None`.
    pub async fn find_similar_hybrid(
        &self,
        request: &SearchRequest,
        alpha: Option<f32>,
    ) -> Result<Vec<EnrichedResult>> {
        let alpha = alpha.unwrap_or(self.scoring.hybrid_alpha).clamp(0.0, 1.0);
        request.validate()?;

        let normalized_query = crate::domain::normalize::normalize(&request.query);
        let query_terms: std::collections::HashSet<&str> =
            normalized_query.split_whitespace().collect();

        let vector_results = self
            .find_similar_uncached(request, &normalized_query)
            .await?;

        let mut blended: Vec<EnrichedResult> = vector_results
            .into_iter()
            .map(|mut result| {
                let lexical = lexical_overlap(&result.content, &query_terms);
                result.similarity = alpha * result.similarity + (1.0 - alpha) * lexical;
                result
            })
            .collect();
        blended.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        Ok(blended)
    }

    /// Returns the configured `Error::invalid_input` when `request`
    /// targets an id-bearing filter the storage layer cannot see (kept
    /// here rather than on `SearchRequest` since it needs no domain-layer
    /// dependency and only the application layer calls it).
    pub fn validate_compatible(&self, request: &SearchRequest) -> Result<()> {
        if request.filters.case_id.is_some() && request.source_type != SearchSourceType::Case {
            return Err(Error::invalid_input(
                "case_id filter is only valid for source_type = case",
            ));
        }
        if request.filters.law_source_id.is_some() && request.source_type != SearchSourceType::Law
        {
            return Err(Error::invalid_input(
                "law_source_id filter is only valid for source_type = law",
            ));
        }
        Ok(())
    }
}

/// Fraction of `query_terms` that appear as whitespace-delimited tokens
/// in `content`, normalized the same way the query was. A placeholder
/// lexical signal; good enough to demonstrate the blend without pulling
/// in a full-text index.
fn lexical_overlap(content: &str, query_terms: &std::collections::HashSet<&str>) -> f32 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let normalized_content = crate::domain::normalize::normalize(content);
    let content_terms: std::collections::HashSet<&str> =
        normalized_content.split_whitespace().collect();
    let matched = query_terms.iter().filter(|t| content_terms.contains(*t)).count();
    matched as f32 / query_terms.len() as f32
}
