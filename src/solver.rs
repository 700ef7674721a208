//! Globally optimal segmentation by dynamic programming.
//!
//! ## The Objective
//!
//! Given the mean-centered similarity matrix `S` over `N` segments, choose
//! contiguous chunks (each at most `max_cluster` segments long) maximizing
//!
//! ```text
//! total = Σ_chunks reward(start, end)
//! reward(start, end) = Σ_{i=start..=end} Σ_{j=start..=end} S[i][j]
//! ```
//!
//! A chunk earns its internal cohesion. Because `S` is centered, gluing a
//! loosely related segment onto a chunk costs reward, so the optimum is not
//! simply "as few chunks as possible".
//!
//! ## The Recurrence
//!
//! ```text
//! dp[-1] = 0
//! dp[i]  = max over s in 1..=min(i+1, max_cluster) of
//!              reward(i-s+1, i) + dp[i-s]
//! from[i] = the start i-s+1 of the best s
//! ```
//!
//! Sizes are tried in ascending order and only a strictly greater score
//! replaces the incumbent, so ties go to the *smallest* trailing chunk. The
//! result is reproducible across runs and platforms.
//!
//! Boundaries are recovered by walking `from` backwards from `N-1`.
//!
//! ## Cost
//!
//! `reward` is O(1) via a 2-D prefix sum over `S` (built once in O(N²)),
//! so the DP itself is O(N · max_cluster) time. Memory is O(N²) for the
//! matrix and the prefix table.

use tracing::debug;

use crate::{ChunkBoundary, Segmentation, SimilarityMatrix};

/// Constant-time block sums over a similarity matrix.
///
/// `prefix[i * (n + 1) + j]` holds the sum of `S[0..i][0..j]`, accumulated in
/// `f64` so long documents do not drift.
#[derive(Debug, Clone)]
pub struct RewardTable {
    n: usize,
    prefix: Vec<f64>,
}

impl RewardTable {
    /// Precompute prefix sums for `matrix`.
    #[must_use]
    pub fn new(matrix: &SimilarityMatrix) -> Self {
        let n = matrix.len();
        let w = n + 1;
        let mut prefix = vec![0.0f64; w * w];
        for i in 0..n {
            let row = matrix.row(i);
            let mut running = 0.0f64;
            for j in 0..n {
                running += f64::from(row[j]);
                prefix[(i + 1) * w + (j + 1)] = prefix[i * w + (j + 1)] + running;
            }
        }
        Self { n, prefix }
    }

    /// Number of segments covered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.n
    }

    /// Whether the table covers no segments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Sum of the square block `start..=end` x `start..=end`.
    #[must_use]
    pub fn reward(&self, start: usize, end: usize) -> f64 {
        let w = self.n + 1;
        let (a, b) = (start, end + 1);
        self.prefix[b * w + b] - self.prefix[a * w + b] - self.prefix[b * w + a]
            + self.prefix[a * w + a]
    }

    /// Total reward of a list of boundaries, summed left to right.
    #[must_use]
    pub fn score(&self, boundaries: &[ChunkBoundary]) -> f64 {
        boundaries.iter().map(|b| self.reward(b.start, b.end)).sum()
    }
}

/// Find the segmentation of maximum total reward.
///
/// `max_cluster` below 1 is treated as 1. An empty matrix yields an empty
/// segmentation.
///
/// ```rust
/// use tessera::{solve, SimilarityMatrix};
///
/// // Segments 0-1 agree, 2-3 agree, the two pairs disagree.
/// let m = SimilarityMatrix::build(&[
///     vec![1.0, 0.0],
///     vec![1.0, 0.1],
///     vec![0.0, 1.0],
///     vec![0.1, 1.0],
/// ]);
/// let seg = solve(&m, 4);
///
/// let spans: Vec<_> = seg.iter().map(|b| (b.start, b.end)).collect();
/// assert_eq!(spans, [(0, 1), (2, 3)]);
/// ```
#[must_use]
pub fn solve(matrix: &SimilarityMatrix, max_cluster: usize) -> Segmentation {
    let n = matrix.len();
    if n == 0 {
        return Segmentation::default();
    }

    let max_cluster = max_cluster.max(1);
    let table = RewardTable::new(matrix);

    let mut dp = vec![0.0f64; n];
    let mut from = vec![0usize; n];

    for i in 0..n {
        let mut best = f64::NEG_INFINITY;
        let mut best_start = i;
        for size in 1..=(i + 1).min(max_cluster) {
            let start = i + 1 - size;
            let before = if start > 0 { dp[start - 1] } else { 0.0 };
            let score = table.reward(start, i) + before;
            if score > best {
                best = score;
                best_start = start;
            }
        }
        dp[i] = best;
        from[i] = best_start;
    }

    let mut boundaries = Vec::new();
    let mut end = n;
    while end > 0 {
        let i = end - 1;
        boundaries.push(ChunkBoundary::new(from[i], i));
        end = from[i];
    }
    boundaries.reverse();

    debug_assert!(crate::segment::covers(&boundaries, n));
    let score = table.score(&boundaries);
    debug!(
        segments = n,
        chunks = boundaries.len(),
        max_cluster,
        score,
        "optimal segmentation solved"
    );

    Segmentation::new(boundaries, score)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans(seg: &Segmentation) -> Vec<(usize, usize)> {
        seg.iter().map(|b| (b.start, b.end)).collect()
    }

    #[test]
    fn test_reward_matches_naive_sum() {
        let values: Vec<f32> = (0..25).map(|v| (v as f32 * 0.37).sin()).collect();
        let m = SimilarityMatrix::from_values(5, values);
        let table = RewardTable::new(&m);
        for start in 0..5 {
            for end in start..5 {
                let naive: f64 = (start..=end)
                    .flat_map(|i| (start..=end).map(move |j| (i, j)))
                    .map(|(i, j)| f64::from(m.get(i, j)))
                    .sum();
                assert!((table.reward(start, end) - naive).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_single_segment() {
        let m = SimilarityMatrix::build(&[vec![1.0, 2.0]]);
        assert_eq!(spans(&solve(&m, 5)), [(0, 0)]);
    }

    #[test]
    fn test_empty() {
        let m = SimilarityMatrix::build(&[]);
        assert!(solve(&m, 3).is_empty());
    }

    #[test]
    fn test_ties_prefer_smallest_trailing_chunk() {
        // All-zero matrix: every segmentation scores 0.
        let m = SimilarityMatrix::from_values(4, vec![0.0; 16]);
        assert_eq!(spans(&solve(&m, 4)), [(0, 0), (1, 1), (2, 2), (3, 3)]);
    }

    #[test]
    fn test_max_cluster_respected() {
        // Uniformly positive off-diagonal: bigger is better, up to the cap.
        let n = 7;
        let values = (0..n * n)
            .map(|idx| if idx / n == idx % n { 0.0 } else { 1.0 })
            .collect();
        let m = SimilarityMatrix::from_values(n, values);

        let seg = solve(&m, 3);
        assert!(seg.covers(n));
        assert!(seg.iter().all(|b| b.len() <= 3));
        assert_eq!(spans(&seg), [(0, 2), (3, 5), (6, 6)]);
    }

    #[test]
    fn test_zero_max_cluster_clamped() {
        let m = SimilarityMatrix::from_values(2, vec![0.0, 1.0, 1.0, 0.0]);
        assert_eq!(spans(&solve(&m, 0)), [(0, 0), (1, 1)]);
    }

    #[test]
    fn test_isolates_outlier() {
        let m = SimilarityMatrix::build(&[
            vec![1.0, 0.0, 0.0],
            vec![0.0, 0.0, 1.0],
            vec![0.9, 0.1, 0.0],
        ]);
        let seg = solve(&m, 2);
        assert_eq!(spans(&seg), [(0, 0), (1, 1), (2, 2)]);
    }

    #[test]
    fn test_score_reported() {
        let m = SimilarityMatrix::build(&[
            vec![1.0, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
        ]);
        let seg = solve(&m, 3);
        let table = RewardTable::new(&m);
        assert!((seg.score - table.score(&seg.boundaries)).abs() < 1e-12);
        assert!(seg.score > 0.0);
    }
}
