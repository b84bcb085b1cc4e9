//! Vector utilities.
//!
//! Pure helpers for similarity scoring and for the compact byte encoding
//! used when embeddings are persisted in the index cache. The provider
//! clients that produce embeddings live in the `review-harness` app
//! crate.

/// Encode a float vector as little-endian f32 bytes.
///
/// # Example
///
/// ```rust
/// use review_harness_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), Some(v));
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode bytes produced by [`vec_to_blob`].
///
/// Returns `None` when the length is not a multiple of four, which only
/// happens for a truncated or foreign payload.
pub fn blob_to_vec(blob: &[u8]) -> Option<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return None;
    }
    Some(
        blob.chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

/// Cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`. Returns exactly `0.0` when either
/// vector has zero norm, when the lengths differ, when either vector is
/// empty, or when the arithmetic produces a non-finite value.
///
/// Accumulation is done in `f64`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let sim = dot / (norm_a.sqrt() * norm_b.sqrt());
    if sim.is_finite() {
        sim.clamp(-1.0, 1.0) as f32
    } else {
        0.0
    }
}
