//! Chunking output.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{CacheStats, Strategy, Tokenizer};

/// Final chunks of one document, in document order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkedDocument {
    /// Chunk texts.
    pub chunks: Vec<String>,
    /// One vector per chunk, when the strategy computed embeddings.
    pub embeddings: Option<Vec<Vec<f32>>>,
    /// How the chunks were produced.
    pub metadata: ChunkMetadata,
}

/// Summary of one chunking run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Concrete strategy that ran.
    pub strategy: Strategy,
    /// Base segments produced (0 for strategies that never segment).
    pub segments: usize,
    /// Chunks produced.
    pub chunks: usize,
    /// Mean chunk size in tokens.
    pub avg_chunk_size: f64,
    /// Wall time of the run.
    pub duration: Duration,
    /// Embedding cache state after the run, when caching is on.
    pub cache_stats: Option<CacheStats>,
    /// An embedding strategy ran without a provider and packed by tokens.
    pub fallback: bool,
    /// Provider calls replaced by zero vectors.
    pub failed_embeddings: usize,
}

impl ChunkedDocument {
    /// A document with no chunks.
    #[must_use]
    pub fn empty(strategy: Strategy) -> Self {
        Self {
            chunks: Vec::new(),
            embeddings: None,
            metadata: ChunkMetadata {
                strategy,
                ..ChunkMetadata::default()
            },
        }
    }

    /// Assemble a document, measuring chunk sizes with `tokenizer`.
    #[must_use]
    pub fn new(
        strategy: Strategy,
        segments: usize,
        chunks: Vec<String>,
        embeddings: Option<Vec<Vec<f32>>>,
        tokenizer: &dyn Tokenizer,
    ) -> Self {
        let total: usize = chunks.iter().map(|c| tokenizer.count_tokens(c)).sum();
        let avg_chunk_size = if chunks.is_empty() {
            0.0
        } else {
            total as f64 / chunks.len() as f64
        };

        Self {
            metadata: ChunkMetadata {
                strategy,
                segments,
                chunks: chunks.len(),
                avg_chunk_size,
                ..ChunkMetadata::default()
            },
            chunks,
            embeddings,
        }
    }

    /// Mark the document as produced by the no-provider fallback.
    #[must_use]
    pub fn with_fallback(mut self) -> Self {
        self.metadata.fallback = true;
        self
    }

    /// Number of chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether there are no chunks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Iterate chunk texts.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.chunks.iter().map(String::as_str)
    }
}
