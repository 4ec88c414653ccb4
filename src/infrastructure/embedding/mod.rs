//! Embedding Service (C3): model identities and the orchestrator that
//! wraps them with caching, batching and the memory guard.

pub mod fastembed_model;
pub mod hash_fallback;
pub mod service;

pub use fastembed_model::FastEmbedTextModel;
pub use hash_fallback::HashFallbackModel;
pub use service::EmbeddingService;
