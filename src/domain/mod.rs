//! The pure core: entities, normalization, chunking and the port traits
//! that infrastructure and application code are built against.
//!
//! Nothing in this module performs I/O or depends on `tokio`'s reactor
//! directly (ports are `async fn` but have no bodies here). It can be
//! exercised in a plain `#[test]` with no runtime.

pub mod chunking;
pub mod error;
pub mod normalize;
pub mod ports;
pub mod scoring;
pub mod types;

pub use error::{Error, Result};
