//! `InMemoryStorage`: a reference [`StorageCollaborator`] implementation.
//!
//! Not a production target — the real system's relational schema and
//! migrations live outside this crate (§4.4 Non-goals). This adapter
//! exists so `application` can be exercised end to end in tests and the
//! CLI demo without a database.

use crate::domain::error::{Error, Result};
use crate::domain::ports::storage::{ChunkFilter, ChunkStream, ParentMetadata, StorageCollaborator};
use crate::domain::types::{
    ArticleMetadata, BranchMetadata, CaseMetadata, ChapterMetadata, Chunk, ChunkParent,
    LawMetadata, LawBranch, LawChapter, LawSource, LegalCase, ParentStatus, SearchSourceType,
    SectionMetadata, CaseSection,
};
use async_trait::async_trait;
use futures::stream;
use std::collections::HashMap;
use std::sync::RwLock;

/// All state guarded by independent `RwLock`s rather than one coarse lock,
/// so a metadata write never blocks a chunk read.
#[derive(Default)]
pub struct InMemoryStorage {
    chunks: RwLock<HashMap<i64, Chunk>>,
    law_sources: RwLock<HashMap<i64, LawSource>>,
    branches: RwLock<HashMap<i64, LawBranch>>,
    chapters: RwLock<HashMap<i64, LawChapter>>,
    cases: RwLock<HashMap<i64, LegalCase>>,
    sections: RwLock<HashMap<i64, CaseSection>>,
    /// `article_id -> (article_number, title)`, the slice of `LawArticle`
    /// that survives into a [`Chunk`]'s metadata; the full article body
    /// lives only in the chunk content itself once chunked.
    article_index: RwLock<HashMap<i64, (String, Option<String>)>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_law_source(&self, law_source: LawSource) {
        self.law_sources.write().unwrap().insert(law_source.id, law_source);
    }

    pub fn insert_branch(&self, branch: LawBranch) {
        self.branches.write().unwrap().insert(branch.id, branch);
    }

    pub fn insert_chapter(&self, chapter: LawChapter) {
        self.chapters.write().unwrap().insert(chapter.id, chapter);
    }

    pub fn insert_article_metadata(
        &self,
        article_id: i64,
        article_number: impl Into<String>,
        title: Option<String>,
    ) {
        self.article_index
            .write()
            .unwrap()
            .insert(article_id, (article_number.into(), title));
    }

    pub fn insert_case(&self, case: LegalCase) {
        self.cases.write().unwrap().insert(case.id, case);
    }

    pub fn insert_section(&self, section: CaseSection) {
        self.sections.write().unwrap().insert(section.id, section);
    }

    pub fn insert_chunk(&self, chunk: Chunk) {
        self.chunks.write().unwrap().insert(chunk.id, chunk);
    }

    fn matches(&self, chunk: &Chunk, filter: &ChunkFilter) -> bool {
        if let Some(parent_id) = filter.parent_id {
            if parent_document_id(&chunk.parent) != parent_id {
                return false;
            }
        }
        if let Some(ids) = &filter.chunk_ids {
            if !ids.contains(&chunk.id) {
                return false;
            }
        }
        if let Some(source_type) = filter.source_type {
            let matches_type = match (&chunk.parent, source_type) {
                (ChunkParent::LawArticle { .. }, SearchSourceType::Law) => true,
                (ChunkParent::CaseSection { .. }, SearchSourceType::Case) => true,
                _ => false,
            };
            if !matches_type {
                return false;
            }
        }
        if let Some(law_source_id) = filter.law_source_id {
            match &chunk.parent {
                ChunkParent::LawArticle { law_source_id: id, .. } if *id == law_source_id => {}
                _ => return false,
            }
        }
        if let Some(case_id) = filter.case_id {
            match &chunk.parent {
                ChunkParent::CaseSection { case_id: id, .. } if *id == case_id => {}
                _ => return false,
            }
        }
        if let Some(jurisdiction) = &filter.jurisdiction {
            if !self.jurisdiction_matches(&chunk.parent, jurisdiction) {
                return false;
            }
        }
        if filter.verified_only && !chunk.verified_by_admin {
            return false;
        }
        if let Some(min_date) = filter.min_date {
            if chunk.created_at < min_date {
                return false;
            }
        }
        if let Some(max_date) = filter.max_date {
            if chunk.created_at > max_date {
                return false;
            }
        }
        if filter.missing_embedding_only && chunk.embedding_vector.is_some() {
            return false;
        }
        true
    }

    /// The parent document's current lifecycle status, looked up fresh on
    /// every read. `Chunk::status` as stored is never authoritative —
    /// `set_parent_status` is the only writer of lifecycle state, so reads
    /// must derive it rather than trust a denormalized copy that could
    /// drift out of sync.
    fn effective_status(&self, parent: &ChunkParent) -> ParentStatus {
        let id = parent_document_id(parent);
        match parent {
            ChunkParent::LawArticle { .. } => self
                .law_sources
                .read()
                .unwrap()
                .get(&id)
                .map(|l| l.status)
                .unwrap_or(ParentStatus::Raw),
            ChunkParent::CaseSection { .. } => self
                .cases
                .read()
                .unwrap()
                .get(&id)
                .map(|c| c.status)
                .unwrap_or(ParentStatus::Raw),
        }
    }

    fn jurisdiction_matches(&self, parent: &ChunkParent, jurisdiction: &str) -> bool {
        let needle = jurisdiction.to_lowercase();
        match parent {
            ChunkParent::LawArticle { law_source_id, .. } => self
                .law_sources
                .read()
                .unwrap()
                .get(law_source_id)
                .is_some_and(|law| law.jurisdiction.to_lowercase() == needle),
            ChunkParent::CaseSection { case_id, .. } => self
                .cases
                .read()
                .unwrap()
                .get(case_id)
                .is_some_and(|case| case.jurisdiction.to_lowercase() == needle),
        }
    }

    fn metadata_for(&self, chunk: &Chunk) -> Option<ParentMetadata> {
        match &chunk.parent {
            ChunkParent::LawArticle {
                law_source_id,
                branch_id,
                chapter_id,
                article_id,
            } => {
                let law_sources = self.law_sources.read().unwrap();
                let law = law_sources.get(law_source_id)?;
                let branches = self.branches.read().unwrap();
                let branch = branch_id.and_then(|id| branches.get(&id)).map(|b| BranchMetadata {
                    id: b.id,
                    name: b.name.clone(),
                });
                let chapters = self.chapters.read().unwrap();
                let chapter = chapter_id.and_then(|id| chapters.get(&id)).map(|c| ChapterMetadata {
                    id: c.id,
                    name: c.name.clone(),
                });
                let article_index = self.article_index.read().unwrap();
                let (article_number, title) = article_index.get(article_id).cloned()?;
                Some(ParentMetadata::Law {
                    law: LawMetadata {
                        id: law.id,
                        name: law.name.clone(),
                        jurisdiction: law.jurisdiction.clone(),
                    },
                    branch,
                    chapter,
                    article: ArticleMetadata {
                        id: *article_id,
                        article_number,
                        title,
                    },
                })
            }
            ChunkParent::CaseSection { case_id, section_id } => {
                let cases = self.cases.read().unwrap();
                let case = cases.get(case_id)?;
                let sections = self.sections.read().unwrap();
                let section = sections.get(section_id)?;
                Some(ParentMetadata::Case {
                    case: CaseMetadata {
                        id: case.id,
                        title: case.title.clone(),
                    },
                    section: SectionMetadata {
                        id: section.id,
                        section_type: section.section_type,
                    },
                })
            }
        }
    }
}

fn parent_document_id(parent: &ChunkParent) -> i64 {
    match parent {
        ChunkParent::LawArticle { law_source_id, .. } => *law_source_id,
        ChunkParent::CaseSection { case_id, .. } => *case_id,
    }
}

#[async_trait]
impl StorageCollaborator for InMemoryStorage {
    async fn get_chunks(&self, filter: ChunkFilter) -> Result<ChunkStream> {
        let matching: Vec<Chunk> = self
            .chunks
            .read()
            .unwrap()
            .values()
            .filter(|c| self.matches(c, &filter))
            .map(|c| Chunk {
                status: self.effective_status(&c.parent),
                ..c.clone()
            })
            .collect();
        Ok(Box::pin(stream::iter(matching.into_iter().map(Ok))))
    }

    async fn get_chunks_missing_embedding(&self, parent_id: Option<i64>) -> Result<ChunkStream> {
        let filter = ChunkFilter {
            parent_id,
            missing_embedding_only: true,
            ..Default::default()
        };
        self.get_chunks(filter).await
    }

    async fn save_embeddings(&self, updates: &[(i64, Vec<f32>)]) -> Result<()> {
        let mut chunks = self.chunks.write().unwrap();
        // Validate every id exists before mutating any of them, so a
        // missing id fails the whole call without committing a partial
        // write (ports/storage.rs: "must be atomic per call").
        for (chunk_id, _) in updates {
            if !chunks.contains_key(chunk_id) {
                return Err(Error::not_found(format!("chunk {chunk_id}")));
            }
        }
        for (chunk_id, vector) in updates {
            chunks.get_mut(chunk_id).unwrap().embedding_vector = Some(vector.clone());
        }
        Ok(())
    }

    async fn get_parent_metadata_bulk(
        &self,
        chunk_ids: &[i64],
    ) -> Result<HashMap<i64, ParentMetadata>> {
        let chunks = self.chunks.read().unwrap();
        let mut out = HashMap::with_capacity(chunk_ids.len());
        for id in chunk_ids {
            if let Some(chunk) = chunks.get(id) {
                if let Some(metadata) = self.metadata_for(chunk) {
                    out.insert(*id, metadata);
                }
            }
        }
        Ok(out)
    }

    async fn set_parent_status(&self, parent_id: i64, status: ParentStatus) -> Result<()> {
        let mut found = false;
        if let Some(law) = self.law_sources.write().unwrap().get_mut(&parent_id) {
            law.status = status;
            found = true;
        }
        if let Some(case) = self.cases.write().unwrap().get_mut(&parent_id) {
            case.status = status;
            found = true;
        }
        if found {
            Ok(())
        } else {
            Err(Error::not_found(format!("parent document {parent_id}")))
        }
    }

    async fn parents_by_status(&self, status: ParentStatus) -> Result<Vec<i64>> {
        let mut ids: Vec<i64> = self
            .law_sources
            .read()
            .unwrap()
            .values()
            .filter(|l| l.status == status)
            .map(|l| l.id)
            .collect();
        ids.extend(
            self.cases
                .read()
                .unwrap()
                .values()
                .filter(|c| c.status == status)
                .map(|c| c.id),
        );
        Ok(ids)
    }
}
