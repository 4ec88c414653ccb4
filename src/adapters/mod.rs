//! Reference adapters: concrete, non-production implementations of the
//! `domain::ports` traits used to exercise `application` without external
//! services. Production storage is supplied by the embedding caller, not
//! this crate (§4.4 Non-goals).

pub mod storage;

pub use storage::InMemoryStorage;
