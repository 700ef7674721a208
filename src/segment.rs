//! Segments, chunk boundaries, and segmentations.
//!
//! A [`Segment`] is the smallest unit the chunker moves around: a paragraph,
//! or a group of sentences cut from a long paragraph. Final chunks are runs of
//! consecutive segments, described by a [`ChunkBoundary`]:
//!
//! ```text
//! segments:      [s0] [s1] [s2] [s3] [s4] [s5]
//! segmentation:  (0,1)     (2,2) (3,5)
//!                 ^^^^^^^^  ^^^^  ^^^^^^^^^^^^^
//! chunks:        "s0 s1"   "s2"  "s3 s4 s5"
//! ```
//!
//! A [`Segmentation`] over `N` segments always covers `0..=N-1` exactly once,
//! in order, with no gaps.

use serde::{Deserialize, Serialize};

/// An immutable span of source text, indexed by creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Zero-based position in the document's segment sequence.
    pub index: usize,
    /// The segment text.
    pub text: String,
    /// Token count of `text`.
    pub tokens: usize,
}

impl Segment {
    /// Create a new segment.
    #[must_use]
    pub fn new(index: usize, text: impl Into<String>, tokens: usize) -> Self {
        Self {
            index,
            text: text.into(),
            tokens,
        }
    }
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Segment {{ index: {}, tokens: {}, len: {} }}",
            self.index,
            self.tokens,
            self.text.len()
        )
    }
}

/// An inclusive run of segment indices `start..=end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkBoundary {
    /// First segment index.
    pub start: usize,
    /// Last segment index (inclusive).
    pub end: usize,
}

impl ChunkBoundary {
    /// Create a boundary. `start` must not exceed `end`.
    #[must_use]
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "boundary start {start} > end {end}");
        Self { start, end }
    }

    /// Number of segments covered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// Always false: a boundary covers at least one segment.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The covered indices as a range.
    #[must_use]
    pub fn range(&self) -> std::ops::RangeInclusive<usize> {
        self.start..=self.end
    }
}

/// Ordered, contiguous boundaries covering every segment exactly once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Segmentation {
    /// Boundaries in document order.
    pub boundaries: Vec<ChunkBoundary>,
    /// Total reward of the boundaries, as scored by the solver.
    pub score: f64,
}

impl Segmentation {
    /// Wrap boundaries with their total score.
    #[must_use]
    pub fn new(boundaries: Vec<ChunkBoundary>, score: f64) -> Self {
        Self { boundaries, score }
    }

    /// Number of chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    /// Whether there are no chunks (only for zero segments).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }

    /// Iterate boundaries in order.
    pub fn iter(&self) -> std::slice::Iter<'_, ChunkBoundary> {
        self.boundaries.iter()
    }

    /// Whether the boundaries cover `0..n` exactly once with no gaps.
    #[must_use]
    pub fn covers(&self, n: usize) -> bool {
        covers(&self.boundaries, n)
    }
}

impl<'a> IntoIterator for &'a Segmentation {
    type Item = &'a ChunkBoundary;
    type IntoIter = std::slice::Iter<'a, ChunkBoundary>;

    fn into_iter(self) -> Self::IntoIter {
        self.boundaries.iter()
    }
}

/// Whether `boundaries` cover `0..n` exactly once, contiguously and in order.
#[must_use]
pub fn covers(boundaries: &[ChunkBoundary], n: usize) -> bool {
    let mut next = 0;
    for b in boundaries {
        if b.start != next || b.end < b.start {
            return false;
        }
        next = b.end + 1;
    }
    next == n
}
