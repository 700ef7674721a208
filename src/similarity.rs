//! Mean-centered cosine similarity matrix.
//!
//! ## Construction
//!
//! ```text
//! 1. L2-normalize every embedding (a zero vector stays zero)
//! 2. S[i][j] = dot(e_i, e_j)                       cosine similarity
//! 3. mean    = (sum(S) - trace(S)) / (N^2 - N)      off-diagonal average
//! 4. S[i][j] -= mean
//! 5. S[i][i]  = 0
//! ```
//!
//! ## Why Center?
//!
//! Raw cosines of sentence embeddings are almost all positive (0.2-0.9 is
//! typical). Summed over a block, a bigger block always scores higher, so a
//! segmentation solver would happily return one giant chunk. After
//! subtracting the average, a pair that is *more* similar than usual adds
//! reward and a pair that is *less* similar subtracts it:
//!
//! ```text
//! raw:       [0.0  0.8  0.3]      mean = 0.5     centered: [ 0.0  0.3 -0.2]
//!            [0.8  0.0  0.4]                                [ 0.3  0.0 -0.1]
//!            [0.3  0.4  0.0]                                [-0.2 -0.1  0.0]
//! ```
//!
//! Zeroing the diagonal removes the self-similarity reward a lone segment
//! would otherwise get for free.
//!
//! Rows are computed in parallel with rayon. Every entry is the same
//! sequential dot product regardless of scheduling, so the matrix is
//! bit-identical to a single-threaded build and exactly symmetric.

use rayon::prelude::*;

/// An `N x N` symmetric similarity matrix with a zero diagonal.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    n: usize,
    values: Vec<f32>,
    mean: f32,
}

impl SimilarityMatrix {
    /// Build the mean-centered matrix for `embeddings`.
    ///
    /// ```rust
    /// use tessera::SimilarityMatrix;
    ///
    /// let m = SimilarityMatrix::build(&[
    ///     vec![1.0, 0.0],
    ///     vec![1.0, 0.0],
    ///     vec![0.0, 1.0],
    /// ]);
    ///
    /// assert_eq!(m.get(0, 0), 0.0);
    /// assert!(m.get(0, 1) > 0.0);   // identical direction: above average
    /// assert!(m.get(0, 2) < 0.0);   // orthogonal: below average
    /// assert_eq!(m.get(1, 2), m.get(2, 1));
    /// ```
    #[must_use]
    pub fn build(embeddings: &[Vec<f32>]) -> Self {
        let n = embeddings.len();
        if n <= 1 {
            return Self {
                n,
                values: vec![0.0; n * n],
                mean: 0.0,
            };
        }

        let normalized: Vec<Vec<f32>> = embeddings.iter().map(|e| normalize(e)).collect();

        let mut values = vec![0.0f32; n * n];
        values
            .par_chunks_mut(n)
            .enumerate()
            .for_each(|(i, row)| {
                for (j, cell) in row.iter_mut().enumerate() {
                    *cell = dot(&normalized[i], &normalized[j]);
                }
            });

        let total: f64 = values.iter().map(|&v| f64::from(v)).sum();
        let trace: f64 = (0..n).map(|i| f64::from(values[i * n + i])).sum();
        let mean = ((total - trace) / (n * n - n) as f64) as f32;

        for (idx, cell) in values.iter_mut().enumerate() {
            *cell = if idx / n == idx % n { 0.0 } else { *cell - mean };
        }

        Self { n, values, mean }
    }

    /// Build directly from row-major values, for synthetic matrices.
    ///
    /// # Panics
    ///
    /// Panics if `values.len() != n * n`.
    #[must_use]
    pub fn from_values(n: usize, values: Vec<f32>) -> Self {
        assert_eq!(values.len(), n * n, "expected {n}x{n} values");
        Self { n, values, mean: 0.0 }
    }

    /// Number of rows (and columns).
    #[must_use]
    pub fn len(&self) -> usize {
        self.n
    }

    /// Whether the matrix is `0 x 0`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Entry at row `i`, column `j`.
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> f32 {
        self.values[i * self.n + j]
    }

    /// Row `i` as a slice.
    #[must_use]
    pub fn row(&self, i: usize) -> &[f32] {
        &self.values[i * self.n..(i + 1) * self.n]
    }

    /// Off-diagonal mean subtracted during construction.
    #[must_use]
    pub fn mean(&self) -> f32 {
        self.mean
    }
}

/// Dot product over the shared prefix of `a` and `b`.
#[must_use]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Copy of `v` scaled to unit length. A zero-norm vector is divided by 1.
#[must_use]
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let norm = dot(v, v).sqrt();
    let norm = if norm > 0.0 { norm } else { 1.0 };
    v.iter().map(|x| x / norm).collect()
}

/// Cosine similarity; 0 when either vector has zero norm.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = dot(a, a).sqrt();
    let norm_b = dot(b, b).sqrt();
    if norm_a > 0.0 && norm_b > 0.0 {
        dot(a, b) / (norm_a * norm_b)
    } else {
        0.0
    }
}
