//! Token-budget packing of base segments.
//!
//! The fallback whenever embeddings are unavailable, and the default
//! [`Strategy::FixedSize`] behaviour:
//!
//! ```text
//! max = 10
//! segments:  [4] [3] [5] [2] [9] [12]
//! chunks:    [4 3] [5 2] [9] [12]        <- 12 is over budget but never split
//! ```
//!
//! The running count is the sum of segment token counts. The single spaces
//! `merge` inserts between segments are not counted.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    merge, BaseSegmenter, ChunkBoundary, ChunkedDocument, Chunker, ChunkerConfig,
    EmbeddingProvider, Result, Segment, Strategy, Tokenizer,
};

/// Group consecutive segments while their token total stays within
/// `max_tokens`. A segment larger than the budget gets a chunk of its own.
#[must_use]
pub fn pack(segments: &[Segment], max_tokens: usize) -> Vec<ChunkBoundary> {
    let mut boundaries = Vec::new();
    let Some(first) = segments.first() else {
        return boundaries;
    };

    let mut start = 0;
    let mut running = first.tokens;
    for (i, segment) in segments.iter().enumerate().skip(1) {
        if running.saturating_add(segment.tokens) > max_tokens {
            boundaries.push(ChunkBoundary::new(start, i - 1));
            start = i;
            running = 0;
        }
        running += segment.tokens;
    }
    boundaries.push(ChunkBoundary::new(start, segments.len() - 1));
    boundaries
}

/// Fixed-size chunker over base segments. Never consults a provider.
#[derive(Debug, Clone)]
pub struct BudgetChunker {
    segmenter: BaseSegmenter,
    max_chunk_size: usize,
}

impl BudgetChunker {
    /// Create a chunker from `config` sizes.
    #[must_use]
    pub fn new(config: &ChunkerConfig, tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self {
            segmenter: BaseSegmenter::new(config, tokenizer),
            max_chunk_size: config.max_chunk_size,
        }
    }

    /// Segment and pack `text` synchronously.
    #[must_use]
    pub fn chunk_sync(&self, text: &str) -> ChunkedDocument {
        let segments = self.segmenter.segment(text);
        packed_document(Strategy::FixedSize, &segments, self.max_chunk_size, &self.segmenter)
    }
}

/// Build a document by budget-packing already computed `segments`.
pub(crate) fn packed_document(
    strategy: Strategy,
    segments: &[Segment],
    max_chunk_size: usize,
    segmenter: &BaseSegmenter,
) -> ChunkedDocument {
    if segments.is_empty() {
        return ChunkedDocument::empty(strategy);
    }
    let boundaries = pack(segments, max_chunk_size);
    ChunkedDocument::new(
        strategy,
        segments.len(),
        merge(segments, &boundaries),
        None,
        segmenter.tokenizer().as_ref(),
    )
}

#[async_trait]
impl Chunker for BudgetChunker {
    fn strategy(&self) -> Strategy {
        Strategy::FixedSize
    }

    async fn chunk(
        &self,
        text: &str,
        _embedder: Option<&dyn EmbeddingProvider>,
    ) -> Result<ChunkedDocument> {
        Ok(self.chunk_sync(text))
    }
}
