//! Vector index abstraction.
//!
//! A [`VectorIndex`] stores embedded [`DocumentChunk`]s and answers
//! nearest-neighbor queries by cosine similarity. Two implementations
//! satisfy the contract: the in-memory index in this module (ephemeral,
//! used for tests and throwaway sessions) and the SQLite-backed index in
//! the application crate (the persistent default).

pub mod memory;

pub use memory::InMemoryIndex;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{DocumentChunk, ScoredChunk, SourceType};

/// Trait for vector stores.
///
/// # Contract
///
/// - `upsert` replaces by chunk id: writing a chunk whose id already
///   exists overwrites the stored row, so re-ingestion is idempotent.
/// - `query` returns at most `k` results in descending score order; ties
///   are broken by insertion order (first inserted wins). `k == 0` is a
///   caller bug and returns an error. An empty index returns an empty
///   list, not an error.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert(&self, chunks: &[DocumentChunk]) -> Result<()>;

    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        source_type: Option<SourceType>,
    ) -> Result<Vec<ScoredChunk>>;

    async fn count(&self) -> Result<u64>;
}
