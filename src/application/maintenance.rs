//! Index Maintenance (C6): turning raw chunks into embedded, indexed,
//! discoverable ones.
//!
//! Three operations compose the whole lifecycle: [`IndexMaintenance::generate_for_document`]
//! embeds one parent's chunks, [`IndexMaintenance::generate_pending`] sweeps
//! every parent still in [`ParentStatus::Raw`], and
//! [`IndexMaintenance::rebuild_index`] rematerializes the vector index from
//! whatever is currently embedded. A per-parent mutex (keyed in a
//! [`DashMap`]) makes concurrent `generate_for_document` calls against the
//! same parent serialize rather than race (§4.6).

use crate::domain::error::{Error, Result};
use crate::domain::ports::storage::{ChunkFilter, StorageCollaborator};
use crate::domain::ports::vector_index::VectorIndex;
use crate::domain::types::{
    BatchOutcome, ChunkParent, GenerationStats, MaintenanceStatus, ParentStatus,
    ParentStatusCounts,
};
use crate::infrastructure::config::MaintenanceConfig;
use crate::infrastructure::embedding::EmbeddingService;
use dashmap::DashMap;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

/// Maximum chunk ids accepted by one [`IndexMaintenance::generate_by_chunk_ids`]
/// call, mirroring the `/embeddings/chunks/batch-generate` endpoint's bound (§6).
pub const MAX_BATCH_CHUNK_IDS: usize = 1000;

fn parent_document_id(parent: &ChunkParent) -> i64 {
    match parent {
        ChunkParent::LawArticle { law_source_id, .. } => *law_source_id,
        ChunkParent::CaseSection { case_id, .. } => *case_id,
    }
}

/// Orchestrates embedding generation and vector index rebuilds.
pub struct IndexMaintenance {
    embeddings: EmbeddingService,
    index: Arc<dyn VectorIndex>,
    storage: Arc<dyn StorageCollaborator>,
    config: MaintenanceConfig,
    /// Shared with [`crate::infrastructure::cache::QueryCache`] so a
    /// successful rebuild makes every previously cached search result
    /// unobservable without a blocking flush (§4.6).
    generation: Arc<AtomicU64>,
    parent_locks: DashMap<i64, Arc<AsyncMutex<()>>>,
    last_rebuild_failed: AtomicBool,
}

impl IndexMaintenance {
    pub fn new(
        embeddings: EmbeddingService,
        index: Arc<dyn VectorIndex>,
        storage: Arc<dyn StorageCollaborator>,
        config: MaintenanceConfig,
        generation: Arc<AtomicU64>,
    ) -> Self {
        Self {
            embeddings,
            index,
            storage,
            config,
            generation,
            parent_locks: DashMap::new(),
            last_rebuild_failed: AtomicBool::new(false),
        }
    }

    fn lock_for(&self, parent_id: i64) -> Arc<AsyncMutex<()>> {
        self.parent_locks
            .entry(parent_id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Embed every chunk under `parent_id` that has no embedding yet
    /// (or every chunk, when `overwrite` is set), committing in batches of
    /// [`MaintenanceConfig::commit_batch_size`] so a crash mid-run loses at
    /// most one batch of work (§4.6). Finally triggers an index rebuild, so
    /// newly-embedded chunks become searchable without a separate call.
    ///
    /// Returns [`Error::Conflict`] if another generation run is already in
    /// flight for this parent.
    pub async fn generate_for_document(
        &self,
        parent_id: i64,
        overwrite: bool,
    ) -> Result<GenerationStats> {
        let stats = self.generate_for_document_inner(parent_id, overwrite).await?;
        self.rebuild_index().await?;
        Ok(stats)
    }

    async fn generate_for_document_inner(
        &self,
        parent_id: i64,
        overwrite: bool,
    ) -> Result<GenerationStats> {
        let lock = self.lock_for(parent_id);
        let _guard = lock
            .try_lock()
            .map_err(|_| Error::conflict(format!("generation already in flight for parent {parent_id}")))?;

        self.storage
            .set_parent_status(parent_id, ParentStatus::Processing)
            .await?;

        let filter = ChunkFilter {
            parent_id: Some(parent_id),
            missing_embedding_only: !overwrite,
            ..Default::default()
        };
        let mut stream = self.storage.get_chunks(filter).await?;
        let mut pending = Vec::new();
        while let Some(chunk) = stream.next().await {
            pending.push(chunk?);
        }
        drop(stream);

        let mut stats = GenerationStats {
            total: pending.len(),
            ..Default::default()
        };

        for batch in pending.chunks(self.config.commit_batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let outcomes = self.embeddings.encode_batch(&texts).await?;
            let expected_dims = self.embeddings.dimensions();

            let mut updates = Vec::with_capacity(batch.len());
            for (chunk, outcome) in batch.iter().zip(outcomes) {
                match outcome {
                    BatchOutcome::Ok(vector) if vector.len() == expected_dims => {
                        updates.push((chunk.id, vector));
                        stats.processed += 1;
                    }
                    BatchOutcome::Ok(_) => {
                        // dimension mismatch against the currently active
                        // model (e.g. a mini-batch degraded to hash
                        // fallback mid-run): never persist a vector that
                        // would fail is_discoverable's length check later.
                        tracing::warn!(chunk_id = chunk.id, "discarding embedding with mismatched dimension");
                        stats.failed += 1;
                    }
                    BatchOutcome::Err(error) => {
                        tracing::warn!(chunk_id = chunk.id, %error, "embedding generation failed for chunk");
                        stats.failed += 1;
                    }
                }
            }

            if !updates.is_empty() {
                self.storage.save_embeddings(&updates).await?;
            }
        }

        if stats.failed == 0 {
            self.storage
                .set_parent_status(parent_id, ParentStatus::Processed)
                .await?;
        }

        Ok(stats)
    }

    /// Run generation over every parent currently in [`ParentStatus::Raw`],
    /// merging per-parent stats. A parent whose run fails with a conflict
    /// (already in flight elsewhere) is skipped rather than aborting the
    /// sweep. Triggers a single index rebuild after the whole sweep rather
    /// than once per parent, unlike [`Self::generate_for_document`] called
    /// directly — equivalent end state, far fewer rebuilds for a corpus-wide
    /// run.
    pub async fn generate_pending(&self) -> Result<GenerationStats> {
        let parent_ids = self.storage.parents_by_status(ParentStatus::Raw).await?;
        let mut total = GenerationStats::default();
        for parent_id in parent_ids {
            match self.generate_for_document_inner(parent_id, false).await {
                Ok(stats) => total.merge(stats),
                Err(Error::Conflict { .. }) => {
                    tracing::debug!(parent_id, "skipping parent already being generated");
                }
                Err(error) => return Err(error),
            }
        }
        self.rebuild_index().await?;
        Ok(total)
    }

    /// `generate_missing` (§4.3.1, the core of C6; backs the
    /// `/embeddings/chunks/batch-generate` endpoint of §6): embed exactly
    /// the given chunk ids, spanning however many parents they belong to.
    /// Bounded at [`MAX_BATCH_CHUNK_IDS`] per call, matching the endpoint's
    /// documented limit. Every distinct parent touched is still serialized
    /// by its own per-parent mutex — a parent already mid-generation
    /// elsewhere causes this call to fail with [`Error::Conflict`] rather
    /// than silently skipping just that parent's chunks, since (unlike
    /// [`Self::generate_pending`]'s corpus sweep) the caller asked for
    /// these specific ids and a partial silent skip would be surprising.
    pub async fn generate_by_chunk_ids(
        &self,
        chunk_ids: &[i64],
        overwrite: bool,
    ) -> Result<GenerationStats> {
        if chunk_ids.is_empty() {
            return Ok(GenerationStats::default());
        }
        if chunk_ids.len() > MAX_BATCH_CHUNK_IDS {
            return Err(Error::invalid_input(format!(
                "at most {MAX_BATCH_CHUNK_IDS} chunk ids accepted per call, got {}",
                chunk_ids.len()
            )));
        }

        let filter = ChunkFilter {
            chunk_ids: Some(chunk_ids.to_vec()),
            missing_embedding_only: !overwrite,
            ..Default::default()
        };
        let mut stream = self.storage.get_chunks(filter).await?;
        let mut pending = Vec::new();
        while let Some(chunk) = stream.next().await {
            pending.push(chunk?);
        }
        drop(stream);

        let mut parent_ids: Vec<i64> =
            pending.iter().map(|c| parent_document_id(&c.parent)).collect();
        parent_ids.sort_unstable();
        parent_ids.dedup();

        let mut guards = Vec::with_capacity(parent_ids.len());
        for parent_id in &parent_ids {
            let lock = self.lock_for(*parent_id);
            match lock.try_lock_owned() {
                Ok(guard) => guards.push(guard),
                Err(_) => {
                    return Err(Error::conflict(format!(
                        "generation already in flight for parent {parent_id}"
                    )))
                }
            }
        }

        for parent_id in &parent_ids {
            self.storage
                .set_parent_status(*parent_id, ParentStatus::Processing)
                .await?;
        }

        let mut stats = GenerationStats {
            total: pending.len(),
            ..Default::default()
        };

        for batch in pending.chunks(self.config.commit_batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let outcomes = self.embeddings.encode_batch(&texts).await?;
            let expected_dims = self.embeddings.dimensions();

            let mut updates = Vec::with_capacity(batch.len());
            for (chunk, outcome) in batch.iter().zip(outcomes) {
                match outcome {
                    BatchOutcome::Ok(vector) if vector.len() == expected_dims => {
                        updates.push((chunk.id, vector));
                        stats.processed += 1;
                    }
                    BatchOutcome::Ok(_) => {
                        tracing::warn!(chunk_id = chunk.id, "discarding embedding with mismatched dimension");
                        stats.failed += 1;
                    }
                    BatchOutcome::Err(error) => {
                        tracing::warn!(chunk_id = chunk.id, %error, "embedding generation failed for chunk");
                        stats.failed += 1;
                    }
                }
            }

            if !updates.is_empty() {
                self.storage.save_embeddings(&updates).await?;
            }
        }

        for parent_id in &parent_ids {
            if self.parent_fully_embedded(*parent_id).await? {
                self.storage
                    .set_parent_status(*parent_id, ParentStatus::Processed)
                    .await?;
            }
        }
        drop(guards);

        self.rebuild_index().await?;
        Ok(stats)
    }

    /// Whether every chunk currently stored under `parent_id` carries a
    /// correctly-sized embedding — only then does a partial, by-id
    /// generation run get to advance that parent's lifecycle status.
    async fn parent_fully_embedded(&self, parent_id: i64) -> Result<bool> {
        let expected_dims = self.embeddings.dimensions();
        let filter = ChunkFilter {
            parent_id: Some(parent_id),
            ..Default::default()
        };
        let mut stream = self.storage.get_chunks(filter).await?;
        let mut any = false;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            any = true;
            if !chunk
                .embedding_vector
                .as_ref()
                .is_some_and(|v| v.len() == expected_dims)
            {
                return Ok(false);
            }
        }
        Ok(any)
    }

    /// Rematerialize the vector index from every currently-discoverable
    /// chunk (§4.6: "rebuild-on-start is authoritative", no incremental
    /// FAISS-style update). On success, bumps the shared generation
    /// counter and marks every indexed parent [`ParentStatus::Indexed`].
    pub async fn rebuild_index(&self) -> Result<usize> {
        let started = std::time::Instant::now();
        let expected_dims = self.embeddings.dimensions();
        let filter = ChunkFilter::default();

        let mut stream = match self.storage.get_chunks(filter).await {
            Ok(s) => s,
            Err(error) => {
                self.last_rebuild_failed.store(true, Ordering::Release);
                return Err(error);
            }
        };

        let mut entries = Vec::new();
        let mut parent_ids = std::collections::HashSet::new();
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(error) => {
                    self.last_rebuild_failed.store(true, Ordering::Release);
                    return Err(error);
                }
            };
            if !chunk.is_discoverable(expected_dims) {
                continue;
            }
            parent_ids.insert(parent_document_id(&chunk.parent));
            entries.push((chunk.id, chunk.embedding_vector.expect("checked by is_discoverable")));
        }

        let size = entries.len();
        if let Err(error) = self.embeddings.build_index(self.index.as_ref(), entries).await {
            self.last_rebuild_failed.store(true, Ordering::Release);
            return Err(error);
        }

        for parent_id in parent_ids {
            self.storage
                .set_parent_status(parent_id, ParentStatus::Indexed)
                .await?;
        }

        self.generation.fetch_add(1, Ordering::AcqRel);
        self.last_rebuild_failed.store(false, Ordering::Release);
        tracing::info!(
            size,
            elapsed = %humantime::format_duration(started.elapsed()),
            "vector index rebuilt"
        );
        Ok(size)
    }

    /// `status()` (§4.6): corpus-wide completion snapshot.
    pub async fn status(&self) -> Result<MaintenanceStatus> {
        let mut stream = self.storage.get_chunks(ChunkFilter::default()).await?;
        let mut total_chunks = 0usize;
        let mut chunks_with_embeddings = 0usize;
        let expected_dims = self.embeddings.dimensions();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            total_chunks += 1;
            if chunk.embedding_vector.as_ref().is_some_and(|v| v.len() == expected_dims) {
                chunks_with_embeddings += 1;
            }
        }

        let mut counts = ParentStatusCounts::default();
        counts.raw = self.storage.parents_by_status(ParentStatus::Raw).await?.len();
        counts.processing = self
            .storage
            .parents_by_status(ParentStatus::Processing)
            .await?
            .len();
        counts.processed = self
            .storage
            .parents_by_status(ParentStatus::Processed)
            .await?
            .len();
        counts.indexed = self
            .storage
            .parents_by_status(ParentStatus::Indexed)
            .await?
            .len();

        let percent_complete = if total_chunks == 0 {
            0.0
        } else {
            chunks_with_embeddings as f32 / total_chunks as f32 * 100.0
        };

        Ok(MaintenanceStatus {
            total_chunks,
            chunks_with_embeddings,
            percent_complete,
            parents_by_status: counts,
            index_size: self.index.size(),
            last_rebuild_failed: self.last_rebuild_failed.load(Ordering::Acquire),
        })
    }
}
