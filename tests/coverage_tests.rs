//! Coverage tests for every chunking strategy.
//!
//! These tests verify that chunks properly cover input text: every word of
//! the document lands in the output, in order, for every strategy, with and
//! without an embedding provider.

use std::sync::Arc;

use tessera::{
    BpeTokenizer, Chunker, ChunkerConfig, ClusterChunker, EmbeddingProvider, FixedChunker,
    FixedMode, GreedyChunker, HashingEmbedder, NarrativeChunker, Tokenizer, WhitespaceTokenizer,
};

const DOCUMENT: &str = "\
The borrow checker tracks ownership of every value. A value has exactly one owner. \
When the owner goes out of scope the value is dropped.

References let code read a value without taking ownership. Mutable references are \
exclusive. Shared references may be many.

Sourdough bread starts with a starter of flour and water. The starter ferments for days.


Bake the loaf in a hot oven. Let it cool before slicing!

Lifetimes describe how long references stay valid. The compiler infers most of them.";

fn all_chunkers(config: &ChunkerConfig, tokenizer: Arc<dyn Tokenizer>) -> Vec<Box<dyn Chunker>> {
    let mut tokens = config.clone();
    tokens.fixed.mode = FixedMode::Tokens;
    vec![
        Box::new(ClusterChunker::new(config, Arc::clone(&tokenizer))),
        Box::new(GreedyChunker::new(config, Arc::clone(&tokenizer))),
        Box::new(FixedChunker::new(config, Arc::clone(&tokenizer))),
        Box::new(FixedChunker::new(&tokens, Arc::clone(&tokenizer))),
        Box::new(NarrativeChunker::from_config(config, tokenizer)),
    ]
}

fn words(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

// =============================================================================
// Coverage: every word, once, in order
// =============================================================================

#[tokio::test]
async fn every_strategy_keeps_every_word() {
    let embedder = HashingEmbedder::default();
    let tokenizer: Arc<dyn Tokenizer> = Arc::new(WhitespaceTokenizer::new());

    for (min, max) in [(5, 20), (10, 40), (50, 400)] {
        let config = ChunkerConfig::new(min, max);
        for chunker in all_chunkers(&config, Arc::clone(&tokenizer)) {
            for provider in [None, Some(&embedder as &dyn EmbeddingProvider)] {
                let doc = chunker.chunk(DOCUMENT, provider).await.unwrap();
                let output: Vec<&str> = doc.iter().flat_map(str::split_whitespace).collect();
                assert_eq!(
                    output,
                    words(DOCUMENT),
                    "{} lost or reordered words at min={min} max={max}",
                    chunker.strategy()
                );
                assert_eq!(doc.metadata.chunks, doc.len());
            }
        }
    }
}

#[tokio::test]
async fn bpe_sized_strategies_keep_every_character() {
    let tokenizer: Arc<dyn Tokenizer> = Arc::new(BpeTokenizer::cl100k().unwrap());
    let embedder = HashingEmbedder::default();
    let config = ChunkerConfig::new(12, 48);

    // Token windows may cut inside a word, so compare with whitespace removed.
    let expected: String = DOCUMENT.split_whitespace().collect();
    for chunker in all_chunkers(&config, tokenizer) {
        let doc = chunker.chunk(DOCUMENT, Some(&embedder)).await.unwrap();
        let output: String = doc.iter().flat_map(str::split_whitespace).collect();
        assert_eq!(output, expected, "{}", chunker.strategy());
    }
}

// =============================================================================
// Empty input
// =============================================================================

#[tokio::test]
async fn empty_input_produces_empty_output() {
    let embedder = HashingEmbedder::default();
    let config = ChunkerConfig::new(10, 20);

    for chunker in all_chunkers(&config, Arc::new(WhitespaceTokenizer::new())) {
        for text in ["", "   \n\n  ", "\t\n"] {
            let doc = chunker.chunk(text, Some(&embedder)).await.unwrap();
            assert!(doc.is_empty(), "{} produced chunks for {text:?}", chunker.strategy());
            assert_eq!(doc.metadata.segments, 0);
            assert_eq!(doc.metadata.strategy, chunker.strategy());
        }
    }
}

// =============================================================================
// Size bounds
// =============================================================================

#[tokio::test]
async fn budget_strategies_respect_max_chunk_size() {
    let tokenizer = Arc::new(WhitespaceTokenizer::new());
    let config = ChunkerConfig::new(5, 20);

    let chunkers: Vec<Box<dyn Chunker>> = vec![
        Box::new(FixedChunker::new(&config, tokenizer.clone())),
        Box::new(NarrativeChunker::from_config(&config, tokenizer.clone())),
        Box::new(GreedyChunker::new(&config, tokenizer.clone())),
    ];

    for chunker in chunkers {
        let doc = chunker
            .chunk(DOCUMENT, Some(&HashingEmbedder::default()))
            .await
            .unwrap();
        for chunk in doc.iter() {
            assert!(
                tokenizer.count_tokens(chunk) <= 20,
                "{} chunk has {} tokens: {chunk:?}",
                chunker.strategy(),
                tokenizer.count_tokens(chunk)
            );
        }
    }
}

#[tokio::test]
async fn cluster_chunks_hold_at_most_max_cluster_segments() {
    let config = ChunkerConfig::new(5, 15);
    let chunker = ClusterChunker::new(&config, Arc::new(WhitespaceTokenizer::new()));
    assert_eq!(chunker.max_cluster(), 3);

    let doc = chunker
        .chunk(DOCUMENT, Some(&HashingEmbedder::default()))
        .await
        .unwrap();
    assert!(doc.len() * 3 >= doc.metadata.segments);
    assert_eq!(doc.embeddings.as_ref().map(Vec::len), Some(doc.len()));
}

// =============================================================================
// Overlap in token mode
// =============================================================================

#[test]
fn token_windows_overlap_by_requested_amount() {
    let text = "t0 t1 t2 t3 t4 t5 t6 t7 t8 t9 t10 t11";

    for overlap in [0, 1, 2, 3] {
        let chunker = FixedChunker::tokens(5, overlap, Arc::new(WhitespaceTokenizer::new()));
        let doc = chunker.chunk_tokens(text).unwrap();

        for pair in doc.chunks.windows(2) {
            let first = words(&pair[0]);
            let second = words(&pair[1]);
            assert_eq!(first.len(), 5);
            assert_eq!(&first[5 - overlap..], &second[..overlap]);
        }
    }
}

// =============================================================================
// Consistency
// =============================================================================

#[tokio::test]
async fn chunking_is_deterministic() {
    let embedder = HashingEmbedder::default();
    let config = ChunkerConfig::new(10, 40);

    for chunker in all_chunkers(&config, Arc::new(WhitespaceTokenizer::new())) {
        let a = chunker.chunk(DOCUMENT, Some(&embedder)).await.unwrap();
        let b = chunker.chunk(DOCUMENT, Some(&embedder)).await.unwrap();
        assert_eq!(a.chunks, b.chunks);
        assert_eq!(a.embeddings, b.embeddings);
    }
}
