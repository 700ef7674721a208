//! Cluster-semantic chunking: the globally optimal path.
//!
//! ## Pipeline
//!
//! ```text
//! text
//!   │  BaseSegmenter
//!   ▼
//! [s0 .. sN-1]
//!   │  embed_segments (concurrent, order-preserving)
//!   ▼
//! [e0 .. eN-1]
//!   │  SimilarityMatrix::build (mean-centered, zero diagonal)
//!   ▼
//! S (N x N)
//!   │  solve(S, max_cluster)
//!   ▼
//! [(0,a) (a+1,b) .. (k,N-1)]
//!   │  merge + pool
//!   ▼
//! ChunkedDocument
//! ```
//!
//! ## When to Use
//!
//! Best boundary quality of all strategies, at the cost of one provider call
//! per segment and an O(N²) matrix. [`crate::Strategy::Auto`] picks it for
//! documents under 2000 words.
//!
//! Without a provider the segments are packed by token budget instead, and
//! the result is flagged as a fallback.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::budget::packed_document;
use crate::{
    embed_segments, merge, pool, solve, BaseSegmenter, ChunkBoundary, ChunkedDocument, Chunker,
    ChunkerConfig, EmbeddingProvider, Result, SimilarityMatrix, Strategy, Tokenizer,
};

/// Segments, embeds, and solves for the best chunk boundaries.
#[derive(Debug, Clone)]
pub struct ClusterChunker {
    segmenter: BaseSegmenter,
    max_cluster: usize,
    max_chunk_size: usize,
    concurrency: usize,
}

impl ClusterChunker {
    /// Create a chunker from `config`.
    #[must_use]
    pub fn new(config: &ChunkerConfig, tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self {
            segmenter: BaseSegmenter::new(config, tokenizer),
            max_cluster: config.max_cluster(),
            max_chunk_size: config.max_chunk_size,
            concurrency: config.concurrency(),
        }
    }

    /// Most base segments one chunk may hold.
    #[must_use]
    pub fn max_cluster(&self) -> usize {
        self.max_cluster
    }
}

#[async_trait]
impl Chunker for ClusterChunker {
    fn strategy(&self) -> Strategy {
        Strategy::ClusterSemantic
    }

    async fn chunk(
        &self,
        text: &str,
        embedder: Option<&dyn EmbeddingProvider>,
    ) -> Result<ChunkedDocument> {
        let segments = self.segmenter.segment(text);
        if segments.is_empty() {
            return Ok(ChunkedDocument::empty(Strategy::ClusterSemantic));
        }

        let Some(embedder) = embedder else {
            debug!("no embedding provider, packing segments by token budget");
            return Ok(packed_document(
                Strategy::ClusterSemantic,
                &segments,
                self.max_chunk_size,
                &self.segmenter,
            )
            .with_fallback());
        };

        let embedded = embed_segments(embedder, &segments, self.concurrency).await;

        let boundaries = if segments.len() == 1 {
            vec![ChunkBoundary::new(0, 0)]
        } else {
            let matrix = SimilarityMatrix::build(&embedded.vectors);
            solve(&matrix, self.max_cluster).boundaries
        };

        let mut doc = ChunkedDocument::new(
            Strategy::ClusterSemantic,
            segments.len(),
            merge(&segments, &boundaries),
            Some(pool(&embedded.vectors, &boundaries)),
            self.segmenter.tokenizer().as_ref(),
        );
        doc.metadata.failed_embeddings = embedded.failed;
        Ok(doc)
    }
}
