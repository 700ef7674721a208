//! Greedy semantic chunking with a coherence window.
//!
//! Splits where the topic drifts, one local decision at a time.
//!
//! ## The Idea
//!
//! Walk the base segments in order. Before appending the next segment,
//! compare its embedding with the mean of the last `window` segments already
//! in the chunk:
//!
//! ```text
//! window = 3, threshold = 0.5
//!
//! chunk:     [s0] [s1] [s2] [s3]
//!                  └────┴────┘   centroid c
//! next:                          [s4]
//!
//! cos(c, e4) = 0.81  -> append s4
//! cos(c, e4) = 0.22  -> start a new chunk at s4
//! ```
//!
//! Averaging over a window instead of comparing against the previous segment
//! alone keeps one off-topic sentence from triggering a split.
//!
//! ## Guards
//!
//! - A drift split only happens once the current chunk holds at least
//!   `min_chunk_size` tokens, which prevents over-fragmentation.
//! - A segment that would push the chunk past `max_chunk_size` always starts
//!   a new chunk, drift or not.
//!
//! ## Threshold Selection
//!
//! | Threshold | Effect |
//! |-----------|--------|
//! | 0.3 | Only major topic shifts |
//! | 0.5 | Balanced (default) |
//! | 0.7 | Very sensitive, many small chunks |
//!
//! ## Performance
//!
//! O(N × window × d) after embedding, where N is the segment count and d the
//! embedding dimension. No N × N matrix is built, which is why
//! [`crate::Strategy::Auto`] prefers this strategy for mid-sized documents.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::budget::packed_document;
use crate::merge::mean_pool;
use crate::{
    cosine_similarity, embed_segments, merge, pool, BaseSegmenter, ChunkBoundary, ChunkedDocument,
    Chunker, ChunkerConfig, EmbeddingProvider, Result, Segment, Strategy, Tokenizer,
};

/// Greedy chunker that splits on drops in windowed similarity.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
/// use tessera::{Chunker, ChunkerConfig, GreedyChunker, HashingEmbedder, WhitespaceTokenizer};
///
/// let cfg = ChunkerConfig::new(5, 100);
/// let chunker = GreedyChunker::new(&cfg, Arc::new(WhitespaceTokenizer::new()));
///
/// let text = "Cats purr and cats nap.\n\nCats nap and cats purr.\n\n\
///             Stock markets fell sharply today.\n\nStock markets fell sharply as prices dropped.";
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let doc = chunker.chunk(text, Some(&HashingEmbedder::new(4096))).await.unwrap();
/// assert_eq!(doc.len(), 2);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct GreedyChunker {
    segmenter: BaseSegmenter,
    min_chunk_size: usize,
    max_chunk_size: usize,
    threshold: f32,
    window: usize,
    concurrency: usize,
}

impl GreedyChunker {
    /// Create a chunker from `config` sizes and `config.greedy` knobs.
    #[must_use]
    pub fn new(config: &ChunkerConfig, tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self {
            segmenter: BaseSegmenter::new(config, tokenizer),
            min_chunk_size: config.min_chunk_size,
            max_chunk_size: config.max_chunk_size,
            threshold: config.greedy.threshold,
            window: config.greedy.window.max(1),
            concurrency: config.concurrency(),
        }
    }

    /// Override the similarity threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Override the coherence window (at least 1).
    #[must_use]
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.max(1);
        self
    }

    /// Find chunk boundaries over embedded segments.
    fn find_boundaries(&self, segments: &[Segment], embeddings: &[Vec<f32>]) -> Vec<ChunkBoundary> {
        let mut boundaries = Vec::new();
        let Some(first) = segments.first() else {
            return boundaries;
        };

        let mut start = 0;
        let mut tokens = first.tokens;

        for i in 1..segments.len() {
            let overflow = tokens.saturating_add(segments[i].tokens) > self.max_chunk_size;

            let drift = tokens >= self.min_chunk_size && {
                let from = start.max(i.saturating_sub(self.window));
                let centroid = mean_pool(&embeddings[from..i]);
                cosine_similarity(&centroid, &embeddings[i]) < self.threshold
            };

            if overflow || drift {
                debug!(segment = i, overflow, drift, "greedy split");
                boundaries.push(ChunkBoundary::new(start, i - 1));
                start = i;
                tokens = 0;
            }
            tokens += segments[i].tokens;
        }

        boundaries.push(ChunkBoundary::new(start, segments.len() - 1));
        boundaries
    }
}

#[async_trait]
impl Chunker for GreedyChunker {
    fn strategy(&self) -> Strategy {
        Strategy::GreedySemantic
    }

    async fn chunk(
        &self,
        text: &str,
        embedder: Option<&dyn EmbeddingProvider>,
    ) -> Result<ChunkedDocument> {
        let segments = self.segmenter.segment(text);
        if segments.is_empty() {
            return Ok(ChunkedDocument::empty(Strategy::GreedySemantic));
        }

        let Some(embedder) = embedder else {
            return Ok(packed_document(
                Strategy::GreedySemantic,
                &segments,
                self.max_chunk_size,
                &self.segmenter,
            )
            .with_fallback());
        };

        let embedded = embed_segments(embedder, &segments, self.concurrency).await;
        let boundaries = self.find_boundaries(&segments, &embedded.vectors);

        let mut doc = ChunkedDocument::new(
            Strategy::GreedySemantic,
            segments.len(),
            merge(&segments, &boundaries),
            Some(pool(&embedded.vectors, &boundaries)),
            self.segmenter.tokenizer().as_ref(),
        );
        doc.metadata.failed_embeddings = embedded.failed;
        Ok(doc)
    }
}
