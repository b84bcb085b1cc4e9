//! Similarity search abstraction.
//!
//! The [`VectorIndex`] trait isolates top-k retrieval so that the
//! in-memory linear scan in [`memory::ChunkStore`] can be swapped for a
//! real vector index without touching the indexer or the answerer.

pub mod memory;

use thiserror::Error;

use crate::models::Chunk;

/// A chunk paired with its similarity to a query.
#[derive(Debug, Clone, Copy)]
pub struct ScoredChunk<'a> {
    pub chunk: &'a Chunk,
    pub score: f32,
}

/// Rejected insert: the embedding length differs from the store's.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("embedding for {path} has {got} dimensions, store expects {expected}")]
pub struct DimensionMismatch {
    pub path: String,
    pub expected: usize,
    pub got: usize,
}

/// Read-side contract of a chunk collection.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`len`](VectorIndex::len) | Number of stored chunks |
/// | [`dims`](VectorIndex::dims) | Embedding dimensionality, `None` while empty |
/// | [`top_k`](VectorIndex::top_k) | Best `k` chunks by cosine similarity |
pub trait VectorIndex: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn dims(&self) -> Option<usize>;

    /// Return `min(k, len)` chunks ordered by descending similarity.
    ///
    /// Ties keep insertion order.
    fn top_k(&self, query: &[f32], k: usize) -> Vec<ScoredChunk<'_>>;
}
