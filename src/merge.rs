//! Turning boundaries back into text and vectors.
//!
//! [`merge`] joins each boundary's segments with a single space. Every segment
//! lands in exactly one chunk, in order, so splitting the chunks on spaces
//! gives back the segments' words in their original order.
//!
//! [`pool`] mean-pools segment embeddings per boundary, the same way late
//! chunking pools token embeddings:
//!
//! ```text
//! chunk_embedding = normalize( (1 / |chunk|) * Σ_{i in chunk} e_i )
//! ```

use crate::{ChunkBoundary, Segment};

/// Join segment texts per boundary. Produces exactly `boundaries.len()` chunks.
///
/// ```rust
/// use tessera::{merge, ChunkBoundary, Segment};
///
/// let segments = vec![
///     Segment::new(0, "One.", 1),
///     Segment::new(1, "Two.", 1),
///     Segment::new(2, "Three.", 1),
/// ];
/// let chunks = merge(&segments, &[ChunkBoundary::new(0, 1), ChunkBoundary::new(2, 2)]);
/// assert_eq!(chunks, ["One. Two.", "Three."]);
/// ```
#[must_use]
pub fn merge(segments: &[Segment], boundaries: &[ChunkBoundary]) -> Vec<String> {
    boundaries
        .iter()
        .map(|b| {
            segments[b.start..=b.end]
                .iter()
                .map(|s| s.text.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

/// Mean-pool and L2-normalize `embeddings` per boundary.
#[must_use]
pub fn pool(embeddings: &[Vec<f32>], boundaries: &[ChunkBoundary]) -> Vec<Vec<f32>> {
    boundaries
        .iter()
        .map(|b| mean_pool(&embeddings[b.start..=b.end]))
        .collect()
}

/// Mean of `vectors`, scaled to unit length unless it is (near) zero.
#[must_use]
pub fn mean_pool(vectors: &[Vec<f32>]) -> Vec<f32> {
    let Some(first) = vectors.first() else {
        return Vec::new();
    };

    let mut result = vec![0.0; first.len()];
    for v in vectors {
        for (acc, &x) in result.iter_mut().zip(v) {
            *acc += x;
        }
    }

    let count = vectors.len() as f32;
    for v in &mut result {
        *v /= count;
    }

    // L2 normalize
    let norm: f32 = result.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-9 {
        for v in &mut result {
            *v /= norm;
        }
    }

    result
}
