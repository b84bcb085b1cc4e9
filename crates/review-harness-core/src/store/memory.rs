//! In-memory [`VectorIndex`] implementation.
//!
//! Holds chunks in a `Vec` in indexing order and answers queries with a
//! brute-force cosine scan. Sized for a single repository held in memory
//! for the length of one session.

use serde::{Deserialize, Serialize};

use crate::embedding::cosine_similarity;
use crate::models::Chunk;

use super::{DimensionMismatch, ScoredChunk, VectorIndex};

/// Ordered chunk collection with a fixed embedding dimensionality.
///
/// The dimensionality is taken from the first inserted chunk; every later
/// insert must match it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkStore {
    chunks: Vec<Chunk>,
}

impl ChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from chunks in order, rejecting mixed dimensionality.
    pub fn from_chunks(chunks: Vec<Chunk>) -> Result<Self, DimensionMismatch> {
        let mut store = Self::new();
        for chunk in chunks {
            store.push(chunk)?;
        }
        Ok(store)
    }

    /// Append a chunk at the end of the store.
    pub fn push(&mut self, chunk: Chunk) -> Result<(), DimensionMismatch> {
        if let Some(expected) = self.dims() {
            if chunk.embedding.len() != expected {
                return Err(DimensionMismatch {
                    path: chunk.source_path,
                    expected,
                    got: chunk.embedding.len(),
                });
            }
        }
        self.chunks.push(chunk);
        Ok(())
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn into_chunks(self) -> Vec<Chunk> {
        self.chunks
    }
}

impl VectorIndex for ChunkStore {
    fn len(&self) -> usize {
        self.chunks.len()
    }

    fn dims(&self) -> Option<usize> {
        self.chunks.first().map(|c| c.embedding.len())
    }

    fn top_k(&self, query: &[f32], k: usize) -> Vec<ScoredChunk<'_>> {
        let mut scored: Vec<ScoredChunk<'_>> = self
            .chunks
            .iter()
            .map(|chunk| ScoredChunk {
                chunk,
                score: cosine_similarity(query, &chunk.embedding),
            })
            .collect();
        // sort_by is stable: equal scores keep insertion order.
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        scored
    }
}
