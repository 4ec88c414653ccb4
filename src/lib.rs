//! Indexing and retrieval core for hierarchical Arabic legal corpora.
//!
//! Laid out hexagonally: [`domain`] is pure (no I/O, no `tokio`), `ports`
//! inside it are the trait seams, [`infrastructure`] provides concrete
//! adapters for those seams (config, caching, the embedding service, the
//! vector index), [`application`] orchestrates `domain` and
//! `infrastructure` into the Search API and Index Maintenance API, and
//! [`adapters`] holds a reference `StorageCollaborator` for tests and the
//! CLI demo.
//!
//! ```text
//! adapters ───┐
//!             ▼
//! application ──uses──▶ infrastructure ──implements──▶ domain::ports
//!      │                                                     ▲
//!      └─────────────────────uses pure types/fns─────────────┘
//! ```

pub mod adapters;
pub mod application;
pub mod domain;
pub mod infrastructure;

pub use domain::error::{Error, Result};
