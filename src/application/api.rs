//! Search API and Index Maintenance API (§4.7/§6): thin facades that wrap
//! [`crate::application::search::SearchService`] and
//! [`crate::application::maintenance::IndexMaintenance`] in the
//! `ApiResponse<T>` envelope every external caller depends on.
//!
//! Neither facade adds behavior beyond translating `Result<T, Error>` into
//! `ApiResponse<T>` — all policy lives in the services themselves.

use crate::application::maintenance::IndexMaintenance;
use crate::application::search::SearchService;
use crate::domain::types::{
    ApiResponse, EmbeddingStats, EnrichedResult, GenerationStats, MaintenanceStatus,
    SearchRequest, SearchResponseData,
};

/// Public Search API surface (§4.7).
pub struct SearchApi {
    service: SearchService,
}

impl SearchApi {
    pub fn new(service: SearchService) -> Self {
        Self { service }
    }

    /// `find_similar`, wrapped in [`ApiResponse`].
    pub async fn find_similar(&self, request: SearchRequest) -> ApiResponse<SearchResponseData> {
        if let Err(err) = self.service.validate_compatible(&request) {
            return ApiResponse::error(&err);
        }
        match self.service.find_similar(&request).await {
            Ok(results) => ok_search_response(request, results),
            Err(err) => ApiResponse::error(&err),
        }
    }

    /// `find_similar_hybrid`, wrapped in [`ApiResponse`].
    pub async fn find_similar_hybrid(
        &self,
        request: SearchRequest,
        alpha: Option<f32>,
    ) -> ApiResponse<SearchResponseData> {
        if let Err(err) = self.service.validate_compatible(&request) {
            return ApiResponse::error(&err);
        }
        match self.service.find_similar_hybrid(&request, alpha).await {
            Ok(results) => ok_search_response(request, results),
            Err(err) => ApiResponse::error(&err),
        }
    }
}

fn ok_search_response(
    request: SearchRequest,
    results: Vec<EnrichedResult>,
) -> ApiResponse<SearchResponseData> {
    let data = SearchResponseData {
        query: request.query,
        total_results: results.len(),
        threshold: request.threshold,
        results,
    };
    ApiResponse::ok("search completed", data)
}

/// Public Index Maintenance API surface (§4.6/§6).
pub struct IndexMaintenanceApi {
    maintenance: IndexMaintenance,
}

impl IndexMaintenanceApi {
    pub fn new(maintenance: IndexMaintenance) -> Self {
        Self { maintenance }
    }

    pub async fn generate_for_document(
        &self,
        parent_id: i64,
        overwrite: bool,
    ) -> ApiResponse<GenerationStats> {
        match self
            .maintenance
            .generate_for_document(parent_id, overwrite)
            .await
        {
            Ok(stats) => ApiResponse::ok("generation complete", stats),
            Err(err) => ApiResponse::error(&err),
        }
    }

    pub async fn generate_pending(&self) -> ApiResponse<GenerationStats> {
        match self.maintenance.generate_pending().await {
            Ok(stats) => ApiResponse::ok("pending generation complete", stats),
            Err(err) => ApiResponse::error(&err),
        }
    }

    /// `POST /embeddings/chunks/batch-generate` (§6): generate embeddings
    /// for exactly the given chunk ids, bounded at
    /// [`crate::application::maintenance::MAX_BATCH_CHUNK_IDS`] per call.
    pub async fn generate_by_chunk_ids(
        &self,
        chunk_ids: &[i64],
        overwrite: bool,
    ) -> ApiResponse<GenerationStats> {
        match self.maintenance.generate_by_chunk_ids(chunk_ids, overwrite).await {
            Ok(stats) => ApiResponse::ok("batch generation complete", stats),
            Err(err) => ApiResponse::error(&err),
        }
    }

    pub async fn rebuild_index(&self) -> ApiResponse<usize> {
        match self.maintenance.rebuild_index().await {
            Ok(size) => ApiResponse::ok("index rebuilt", size),
            Err(err) => ApiResponse::error(&err),
        }
    }

    pub async fn status(&self) -> ApiResponse<MaintenanceStatus> {
        match self.maintenance.status().await {
            Ok(status) => ApiResponse::ok("status retrieved", status),
            Err(err) => ApiResponse::error(&err),
        }
    }
}

/// Exposes [`crate::infrastructure::embedding::EmbeddingService::stats`]
/// in the same `ApiResponse` envelope, for the CLI's diagnostics command.
pub fn embedding_stats_response(stats: EmbeddingStats) -> ApiResponse<EmbeddingStats> {
    ApiResponse::ok("embedding service stats", stats)
}
