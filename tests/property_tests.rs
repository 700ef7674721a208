//! Property-based tests for segmentation and caching.
//!
//! These tests verify the invariants every chunking run depends on:
//! - Completeness: the solver covers every segment exactly once, in order
//! - Optimality: the DP beats (or ties) every legal segmentation
//! - Round-trip: merged chunks hold every segment's words exactly once
//! - LRU: the embedding cache evicts exactly what a reference model evicts

use std::sync::Arc;

use proptest::prelude::*;
use tessera::budget::pack;
use tessera::{
    merge, solve, BaseSegmenter, ChunkBoundary, ChunkerConfig, EmbeddingCache, RewardTable,
    Segment, SimilarityMatrix, WhitespaceTokenizer,
};

// =============================================================================
// Test Generators
// =============================================================================

/// Between `lo` and `hi` embeddings of dimension 4.
fn embeddings(lo: usize, hi: usize) -> impl Strategy<Value = Vec<Vec<f32>>> {
    prop::collection::vec(prop::collection::vec(-1.0f32..1.0, 4), lo..=hi)
}

/// Segments of one to six lowercase words each.
fn segments(lo: usize, hi: usize) -> impl Strategy<Value = Vec<Segment>> {
    prop::collection::vec(
        prop::collection::vec(prop::string::string_regex("[a-z]{1,8}").unwrap(), 1..6),
        lo..=hi,
    )
    .prop_map(|groups| {
        groups
            .into_iter()
            .enumerate()
            .map(|(i, words)| {
                let tokens = words.len();
                Segment::new(i, words.join(" "), tokens)
            })
            .collect()
    })
}

/// Paragraph-structured text.
fn paragraph_text() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop::collection::vec(prop::string::string_regex("[A-Za-z]{1,10}[.!?]?").unwrap(), 1..30),
        1..6,
    )
    .prop_map(|paras| {
        paras
            .iter()
            .map(|words| words.join(" "))
            .collect::<Vec<_>>()
            .join("\n\n")
    })
}

// =============================================================================
// Invariant Helpers
// =============================================================================

/// Contiguous, ordered, and covering `0..n` exactly once.
fn is_complete(boundaries: &[ChunkBoundary], n: usize) -> bool {
    let mut next = 0;
    for b in boundaries {
        if b.start != next || b.end < b.start {
            return false;
        }
        next = b.end + 1;
    }
    next == n
}

/// Best total reward over every segmentation with chunks of at most `cap`.
fn brute_force_best(table: &RewardTable, start: usize, n: usize, cap: usize) -> f64 {
    if start == n {
        return 0.0;
    }
    (start..n)
        .take(cap)
        .map(|end| table.reward(start, end) + brute_force_best(table, end + 1, n, cap))
        .fold(f64::NEG_INFINITY, f64::max)
}

// =============================================================================
// Solver
// =============================================================================

proptest! {
    #[test]
    fn solver_covers_every_segment(e in embeddings(1, 60), cap in 0usize..12) {
        let m = SimilarityMatrix::build(&e);
        let seg = solve(&m, cap);

        prop_assert!(is_complete(&seg.boundaries, e.len()));
        prop_assert!(seg.covers(e.len()));
        for b in &seg.boundaries {
            prop_assert!(b.len() <= cap.max(1));
        }
    }

    #[test]
    fn solver_matches_brute_force(e in embeddings(1, 8), cap in 1usize..=8) {
        let m = SimilarityMatrix::build(&e);
        let table = RewardTable::new(&m);
        let seg = solve(&m, cap);

        let best = brute_force_best(&table, 0, e.len(), cap);
        let chosen = table.score(&seg.boundaries);

        prop_assert!((seg.score - chosen).abs() < 1e-9);
        prop_assert!(chosen + 1e-6 >= best, "dp {} < brute force {}", chosen, best);
    }

    #[test]
    fn solver_is_deterministic(e in embeddings(2, 30), cap in 1usize..6) {
        let m = SimilarityMatrix::build(&e);
        prop_assert_eq!(solve(&m, cap), solve(&m, cap));
    }

    #[test]
    fn matrix_symmetric_with_zero_diagonal(e in embeddings(0, 25)) {
        let m = SimilarityMatrix::build(&e);
        for i in 0..m.len() {
            prop_assert_eq!(m.get(i, i), 0.0);
            for j in 0..m.len() {
                prop_assert_eq!(m.get(i, j), m.get(j, i));
            }
        }
    }
}

// =============================================================================
// Merge Round-Trip
// =============================================================================

proptest! {
    #[test]
    fn merge_uses_every_segment_once(
        segs in segments(1, 30),
        dims in prop::collection::vec(prop::collection::vec(-1.0f32..1.0, 3), 30),
        cap in 1usize..6,
    ) {
        let e: Vec<Vec<f32>> = dims.into_iter().take(segs.len()).collect();
        let seg = solve(&SimilarityMatrix::build(&e), cap);
        let chunks = merge(&segs, &seg.boundaries);

        prop_assert_eq!(chunks.len(), seg.len());

        let rejoined: Vec<&str> = chunks
            .iter()
            .flat_map(|c| c.split(' '))
            .filter(|w| !w.is_empty())
            .collect();
        let original: Vec<&str> = segs.iter().flat_map(|s| s.text.split(' ')).collect();
        prop_assert_eq!(rejoined, original);
    }

    #[test]
    fn budget_pack_is_complete(segs in segments(0, 40), max in 1usize..20) {
        let boundaries = pack(&segs, max);
        prop_assert!(is_complete(&boundaries, segs.len()));

        for b in &boundaries {
            let tokens: usize = segs[b.start..=b.end].iter().map(|s| s.tokens).sum();
            prop_assert!(b.len() == 1 || tokens <= max);
        }
    }

    #[test]
    fn segmenter_keeps_every_word(text in paragraph_text(), min in 1usize..12) {
        let segmenter = BaseSegmenter::new(
            &ChunkerConfig::new(min, min * 8),
            Arc::new(WhitespaceTokenizer::new()),
        );
        let segs = segmenter.segment(&text);

        let words: Vec<&str> = segs.iter().flat_map(|s| s.text.split_whitespace()).collect();
        prop_assert_eq!(words, text.split_whitespace().collect::<Vec<_>>());
        for (i, s) in segs.iter().enumerate() {
            prop_assert_eq!(s.index, i);
        }
    }
}

// =============================================================================
// Cache Model
// =============================================================================

#[derive(Debug, Clone)]
enum Op {
    Put(u8),
    Get(u8),
}

fn ops() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(
        prop_oneof![(0u8..6).prop_map(Op::Put), (0u8..6).prop_map(Op::Get)],
        0..60,
    )
}

proptest! {
    #[test]
    fn cache_matches_lru_model(capacity in 0usize..5, ops in ops()) {
        let mut cache = EmbeddingCache::new(capacity);
        // Most recently used last.
        let mut model: Vec<u8> = Vec::new();

        for op in ops {
            match op {
                Op::Put(k) => {
                    cache.put(&format!("key {k}"), vec![f32::from(k)]);
                    if capacity > 0 {
                        model.retain(|&m| m != k);
                        if model.len() == capacity {
                            model.remove(0);
                        }
                        model.push(k);
                    }
                }
                Op::Get(k) => {
                    let hit = cache.get(&format!("key {k}"));
                    if let Some(pos) = model.iter().position(|&m| m == k) {
                        prop_assert_eq!(hit, Some(vec![f32::from(k)]));
                        model.remove(pos);
                        model.push(k);
                    } else {
                        prop_assert!(hit.is_none());
                    }
                }
            }

            prop_assert_eq!(cache.len(), model.len());
            for k in 0u8..6 {
                prop_assert_eq!(cache.contains(&format!("key {k}")), model.contains(&k));
            }
        }
    }
}

// =============================================================================
// Fixed Cases
// =============================================================================

#[test]
fn cache_evicts_oldest_then_respects_promotion() {
    let mut cache = EmbeddingCache::new(2);
    cache.put("A", vec![1.0]);
    cache.put("B", vec![2.0]);
    cache.put("C", vec![3.0]);
    assert!(!cache.contains("A"));
    assert!(cache.contains("B") && cache.contains("C"));

    let mut cache = EmbeddingCache::new(2);
    cache.put("A", vec![1.0]);
    cache.put("B", vec![2.0]);
    assert!(cache.get("A").is_some());
    cache.put("C", vec![3.0]);
    assert!(cache.contains("A"));
    assert!(!cache.contains("B"));
}

#[test]
fn solver_isolates_unrelated_middle() {
    // 0 and 2 share a direction, 1 is orthogonal to both.
    let m = SimilarityMatrix::build(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.05]]);
    let seg = solve(&m, 2);
    let spans: Vec<_> = seg.iter().map(|b| (b.start, b.end)).collect();
    assert_eq!(spans, [(0, 0), (1, 1), (2, 2)]);
}
