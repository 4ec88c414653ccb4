//! Boundary contracts between the core and everything outside it.
//!
//! Ports are trait-based so the application layer can be exercised against
//! an in-memory test double without depending on the embedding model,
//! network, or a real relational store.

pub mod embedding;
pub mod storage;
pub mod vector_index;

pub use embedding::EmbeddingModel;
pub use storage::{ParentMetadata, StorageCollaborator};
pub use vector_index::VectorIndex;
