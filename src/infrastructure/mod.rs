//! Concrete adapters: configuration loading, caching, the embedding
//! service and its models, and the in-memory vector index.
//!
//! Everything here implements a `domain::ports` trait or is consumed by
//! `application`; nothing in `domain` depends back on this module.

pub mod cache;
pub mod config;
pub mod embedding;
pub mod vector_index;
