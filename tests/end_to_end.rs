//! End-to-end exercises of the Search API and Index Maintenance API against
//! `InMemoryStorage` and the NO-ML hash-fallback model, covering the
//! generate -> rebuild -> search pipeline and its key invariants.

use arabic_legal_search_core::adapters::InMemoryStorage;
use arabic_legal_search_core::application::{IndexMaintenance, SearchService};
use arabic_legal_search_core::domain::chunking::format_article;
use arabic_legal_search_core::domain::types::{
    Chunk, ChunkParent, LawBranch, LawChapter, LawSource, LawSourceKind, ParentStatus,
    SearchFilters, SearchRequest, SearchSourceType,
};
use arabic_legal_search_core::infrastructure::cache::QueryCache;
use arabic_legal_search_core::infrastructure::config::{EmbeddingConfig, MaintenanceConfig, ScoringConfig};
use arabic_legal_search_core::infrastructure::embedding::{EmbeddingService, HashFallbackModel};
use arabic_legal_search_core::infrastructure::vector_index::BruteForceIndex;
use chrono::Utc;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

fn no_ml_embedding_service() -> EmbeddingService {
    let mut config = EmbeddingConfig::default();
    config.no_ml_mode = true;
    EmbeddingService::new(config, true, Arc::new(HashFallbackModel::new()))
}

/// Seeds one law source with a single article split into one segment, and
/// one legal case is intentionally left out — these tests target the law
/// half of the hierarchy.
fn seed_one_article(storage: &InMemoryStorage, law_source_id: i64, article_id: i64, verified: bool) {
    let now = Utc::now();
    storage.insert_law_source(LawSource {
        id: law_source_id,
        name: "نظام تجريبي".to_string(),
        kind: LawSourceKind::Law,
        jurisdiction: "SA".to_string(),
        issuing_authority: "جهة تجريبية".to_string(),
        issue_date: now,
        last_update: now,
        status: ParentStatus::Raw,
    });
    storage.insert_branch(LawBranch {
        id: law_source_id * 10,
        law_source_id,
        name: "الباب الأول".to_string(),
    });
    storage.insert_chapter(LawChapter {
        id: law_source_id * 100,
        branch_id: law_source_id * 10,
        name: "الفصل الأول".to_string(),
    });
    storage.insert_article_metadata(article_id, "1", Some("حرية التعبير".to_string()));

    let segments = format_article(
        "نظام تجريبي",
        Some("الباب الأول"),
        Some("الفصل الأول"),
        "1",
        Some("حرية التعبير"),
        "تكفل الدولة حرية التعبير عن الرأي بالوسائل والشروط التي يحددها النظام.",
    );
    for (i, content) in segments.into_iter().enumerate() {
        storage.insert_chunk(Chunk {
            id: article_id * 10 + i as i64,
            content,
            embedding_vector: None,
            parent: ChunkParent::LawArticle {
                law_source_id,
                branch_id: Some(law_source_id * 10),
                chapter_id: Some(law_source_id * 100),
                article_id,
            },
            chunk_index: i,
            tokens_count: 20,
            verified_by_admin: verified,
            created_at: now,
            status: ParentStatus::Raw,
        });
    }
}

struct Harness {
    maintenance: IndexMaintenance,
    search: SearchService,
}

fn build_harness(storage: Arc<InMemoryStorage>) -> Harness {
    let embeddings = no_ml_embedding_service();
    let index = Arc::new(BruteForceIndex::new());
    let generation = Arc::new(AtomicU64::new(0));
    let query_cache = QueryCache::new(200, generation.clone());

    let maintenance = IndexMaintenance::new(
        embeddings.clone(),
        index.clone(),
        storage.clone(),
        MaintenanceConfig::default(),
        generation,
    );
    let search = SearchService::new(
        embeddings,
        index,
        storage,
        query_cache,
        ScoringConfig::default(),
    );
    Harness { maintenance, search }
}

#[tokio::test]
async fn generate_index_and_search_round_trip() {
    let storage = Arc::new(InMemoryStorage::new());
    seed_one_article(&storage, 1, 1000, true);
    let harness = build_harness(storage);

    let generated = harness.maintenance.generate_pending().await.unwrap();
    assert_eq!(generated.total, 1);
    assert_eq!(generated.processed, 1);
    assert_eq!(generated.failed, 0);

    let indexed = harness.maintenance.rebuild_index().await.unwrap();
    assert_eq!(indexed, 1);

    let request = SearchRequest::new("حرية التعبير", SearchSourceType::Law);
    let results = harness.search.find_similar(&request).await.unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].similarity > 0.0);
    assert!(results[0].law_metadata.is_some());
    assert!(results[0].article_metadata.is_some());
}

#[tokio::test]
async fn generate_pending_is_idempotent() {
    let storage = Arc::new(InMemoryStorage::new());
    seed_one_article(&storage, 2, 2000, false);
    let harness = build_harness(storage);

    let first = harness.maintenance.generate_pending().await.unwrap();
    assert_eq!(first.processed, 1);

    // the parent is now Processed, not Raw, so a second sweep finds nothing
    let second = harness.maintenance.generate_pending().await.unwrap();
    assert_eq!(second.total, 0);
    assert_eq!(second.processed, 0);
}

#[tokio::test]
async fn rebuild_index_size_matches_discoverable_chunk_count() {
    let storage = Arc::new(InMemoryStorage::new());
    seed_one_article(&storage, 3, 3000, true);
    seed_one_article(&storage, 4, 4000, false);
    let harness = build_harness(storage);

    harness.maintenance.generate_pending().await.unwrap();
    let indexed = harness.maintenance.rebuild_index().await.unwrap();
    assert_eq!(indexed, 2);

    let status = harness.maintenance.status().await.unwrap();
    assert_eq!(status.total_chunks, 2);
    assert_eq!(status.chunks_with_embeddings, 2);
    assert_eq!(status.index_size, 2);
    assert!((status.percent_complete - 100.0).abs() < 1e-4);
}

#[tokio::test]
async fn verified_chunk_outranks_unverified_at_equal_similarity() {
    let storage = Arc::new(InMemoryStorage::new());
    seed_one_article(&storage, 5, 5000, true);
    seed_one_article(&storage, 6, 6000, false);
    let harness = build_harness(storage);

    harness.maintenance.generate_pending().await.unwrap();
    harness.maintenance.rebuild_index().await.unwrap();

    let request = SearchRequest {
        top_k: 2,
        threshold: 0.0,
        ..SearchRequest::new("حرية التعبير عن الرأي", SearchSourceType::Law)
    };
    let results = harness.search.find_similar(&request).await.unwrap();
    assert_eq!(results.len(), 2);
    assert!(results[0].verified);
}

#[tokio::test]
async fn filtered_search_only_returns_matching_jurisdiction() {
    let storage = Arc::new(InMemoryStorage::new());
    seed_one_article(&storage, 7, 7000, true);
    let harness = build_harness(storage);
    harness.maintenance.generate_pending().await.unwrap();
    harness.maintenance.rebuild_index().await.unwrap();

    let request = SearchRequest {
        threshold: 0.0,
        filters: SearchFilters {
            jurisdiction: Some("EG".to_string()),
            ..SearchFilters::default()
        },
        ..SearchRequest::new("حرية التعبير", SearchSourceType::Law)
    };
    let results = harness.search.find_similar(&request).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn generate_by_chunk_ids_embeds_only_the_requested_chunks() {
    let storage = Arc::new(InMemoryStorage::new());
    seed_one_article(&storage, 9, 9000, true);
    seed_one_article(&storage, 10, 10000, true);
    let harness = build_harness(storage);

    // article 9's chunk id is 90000 (9000 * 10 + 0); only embed that one.
    let stats = harness
        .maintenance
        .generate_by_chunk_ids(&[90000], false)
        .await
        .unwrap();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.processed, 1);

    let status = harness.maintenance.status().await.unwrap();
    assert_eq!(status.total_chunks, 2);
    assert_eq!(status.chunks_with_embeddings, 1);

    // the targeted parent is fully embedded and promoted; the other is untouched.
    let raw = harness
        .maintenance
        .generate_pending()
        .await
        .unwrap();
    assert_eq!(raw.total, 1);
    assert_eq!(raw.processed, 1);
}

#[tokio::test]
async fn generate_by_chunk_ids_rejects_batches_over_the_limit() {
    let storage = Arc::new(InMemoryStorage::new());
    let harness = build_harness(storage);

    let too_many: Vec<i64> = (0..(arabic_legal_search_core::application::maintenance::MAX_BATCH_CHUNK_IDS as i64 + 1)).collect();
    let result = harness.maintenance.generate_by_chunk_ids(&too_many, false).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn generate_by_chunk_ids_skips_already_embedded_chunks_without_overwrite() {
    let storage = Arc::new(InMemoryStorage::new());
    seed_one_article(&storage, 11, 11000, true);
    let harness = build_harness(storage);

    let chunk_id = 110000;
    let first = harness
        .maintenance
        .generate_by_chunk_ids(&[chunk_id], false)
        .await
        .unwrap();
    assert_eq!(first.processed, 1);

    let second = harness
        .maintenance
        .generate_by_chunk_ids(&[chunk_id], false)
        .await
        .unwrap();
    assert_eq!(second.total, 0);
}

#[tokio::test]
async fn query_cache_hit_survives_index_mutation_until_rebuild_bumps_generation() {
    let storage = Arc::new(InMemoryStorage::new());
    seed_one_article(&storage, 8, 8000, true);
    let harness = build_harness(storage);
    harness.maintenance.generate_pending().await.unwrap();
    harness.maintenance.rebuild_index().await.unwrap();

    let request = SearchRequest {
        threshold: 0.0,
        ..SearchRequest::new("حرية التعبير", SearchSourceType::Law)
    };
    let first = harness.search.find_similar(&request).await.unwrap();
    assert_eq!(first.len(), 1);

    // a second identical call must hit the query cache and return the same
    // single result rather than erroring or drifting
    let second = harness.search.find_similar(&request).await.unwrap();
    assert_eq!(second.len(), first.len());
    assert_eq!(second[0].id, first[0].id);
}
