//! In-memory vector index.
//!
//! Brute-force cosine scan over an insertion-ordered vector behind an
//! `RwLock`. Suitable for tests and small ephemeral corpora; the
//! persistent SQLite index in the app crate implements the same trait.

use std::sync::RwLock;

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::error::{Error, Result};
use crate::index::VectorIndex;
use crate::models::{DocumentChunk, ScoredChunk, SourceType};

#[derive(Default)]
pub struct InMemoryIndex {
    // Insertion order is preserved so equal scores rank deterministically.
    chunks: RwLock<Vec<DocumentChunk>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(&self, chunks: &[DocumentChunk]) -> Result<()> {
        let mut store = self
            .chunks
            .write()
            .map_err(|e| Error::Index(format!("lock poisoned: {}", e)))?;
        for chunk in chunks {
            match store.iter_mut().find(|c| c.id == chunk.id) {
                // Replace in place, keeping the original position.
                Some(existing) => *existing = chunk.clone(),
                None => store.push(chunk.clone()),
            }
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        source_type: Option<SourceType>,
    ) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Err(Error::Index("query limit must be > 0".to_string()));
        }
        let store = self
            .chunks
            .read()
            .map_err(|e| Error::Index(format!("lock poisoned: {}", e)))?;

        let mut scored: Vec<ScoredChunk> = store
            .iter()
            .filter(|c| source_type.map_or(true, |t| c.source_type == t))
            .map(|c| ScoredChunk {
                chunk: c.clone(),
                score: cosine_similarity(vector, &c.embedding),
            })
            .collect();

        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    async fn count(&self) -> Result<u64> {
        let store = self
            .chunks
            .read()
            .map_err(|e| Error::Index(format!("lock poisoned: {}", e)))?;
        Ok(store.len() as u64)
    }
}
