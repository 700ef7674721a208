//! # tessera
//!
//! Semantic text chunking for retrieval-augmented generation (RAG) pipelines.
//!
//! ## The Problem
//!
//! Language models have context windows. Documents don't fit. You need to split
//! them into pieces ("chunks") small enough to embed and retrieve, but large
//! enough to preserve meaning.
//!
//! Splitting every N tokens is cheap and usually wrong: a chunk boundary in the
//! middle of an argument produces two chunks that each answer half a question.
//! The right boundaries are where the *topic* changes, and finding them means
//! looking at what the text says.
//!
//! ## The Optimal Path
//!
//! tessera's headline strategy treats chunking as an optimization problem:
//!
//! ```text
//! 1. Segment     paragraphs, long ones cut into sentence groups
//! 2. Embed       one vector per segment (through an LRU cache)
//! 3. Compare     S[i][j] = cosine(e_i, e_j) - mean, diagonal zeroed
//! 4. Solve       choose contiguous chunks maximizing Σ_chunks Σ_{i,j in chunk} S[i][j]
//! 5. Merge       join each chunk's segments
//! ```
//!
//! Mean-centering makes a pair that is more similar than average worth
//! positive reward and a pair that is less similar worth negative reward, so
//! the dynamic program in step 4 groups what belongs together and isolates
//! what does not. The result is the global optimum, not a greedy guess:
//!
//! ```text
//! Segments:   [rust] [rust] [bread] [bread] [rust]
//! Greedy:     [rust rust] [bread bread rust]        <- locally fine
//! Optimal:    [rust rust] [bread bread] [rust]      <- best total cohesion
//! ```
//!
//! ## Chunking Strategies
//!
//! | Strategy | Embeddings | Cost | Boundaries |
//! |----------|------------|------|------------|
//! | [`Strategy::ClusterSemantic`] | yes | O(N²) matrix, O(N × k) DP | global optimum |
//! | [`Strategy::GreedySemantic`] | yes | O(N × w × d) | local coherence window |
//! | [`Strategy::FixedSize`] | no | O(n) | token budget |
//! | [`Strategy::Narrative`] | no | O(n log n) | scene / paragraph / sentence |
//!
//! Where N = segment count, k = `max_cluster`, w = coherence window,
//! d = embedding dimension, n = document length.
//!
//! [`Strategy::Auto`] picks by document size: under 2000 words the optimal
//! path, up to 10000 words the greedy one, beyond that fixed-size packing.
//!
//! Embedding strategies run without a provider too. They then pack segments
//! by token budget and mark the result with `metadata.fallback`.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use tessera::{ChunkerConfig, Dispatcher, HashingEmbedder, Strategy, WhitespaceTokenizer};
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let dispatcher = Dispatcher::builder()
//!     .config(ChunkerConfig::new(10, 40))
//!     .tokenizer(Arc::new(WhitespaceTokenizer::new()))
//!     .embedder(Arc::new(HashingEmbedder::default()))
//!     .build()
//!     .unwrap();
//!
//! let text = "The borrow checker enforces ownership.\n\n\
//!             Ownership and borrowing make Rust memory safe.\n\n\
//!             Sourdough needs a lively starter.";
//!
//! let doc = dispatcher.chunk(text, None, None).await.unwrap();
//! assert_eq!(doc.metadata.strategy, Strategy::ClusterSemantic);
//! assert_eq!(doc.metadata.segments, 3);
//! # });
//! ```
//!
//! ## Real Embeddings (requires `semantic` feature)
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tessera::{ChunkerConfig, Dispatcher, FastEmbedProvider};
//!
//! let dispatcher = Dispatcher::builder()
//!     .config(ChunkerConfig::default())
//!     .embedder(Arc::new(FastEmbedProvider::new()?))
//!     .build()?;
//! let doc = dispatcher.chunk(long_document, None, None).await?;
//! ```
//!
//! ## Synchronous Callers
//!
//! [`BlockingDispatcher`] runs the dispatcher on one dedicated worker thread,
//! so code without a runtime can chunk without starting one itself.
//!
//! ## Performance Considerations
//!
//! Provider calls dominate. They are issued concurrently
//! (`embed_concurrency`, default 8) and memoized in an LRU cache keyed by a
//! SHA-256 of the whitespace-normalized text, so re-chunking an edited
//! document only embeds what changed. The similarity matrix is built in
//! parallel; the solver is O(N × max_cluster) with O(1) block sums.

pub mod budget;
mod blocking;
mod cache;
mod cluster;
mod config;
mod dispatcher;
mod document;
mod embedding;
mod error;
mod fixed;
mod greedy;
pub mod merge;
mod narrative;
mod segment;
mod segmenter;
mod similarity;
mod solver;
mod strategy;
mod tokenizer;

use async_trait::async_trait;

pub use blocking::BlockingDispatcher;
pub use budget::BudgetChunker;
pub use cache::{cache_key, CacheKey, CacheStats, EmbeddingCache};
pub use cluster::ClusterChunker;
pub use config::{
    AutoThresholds, ChunkerConfig, FixedMode, FixedOptions, GreedyOptions, SentenceBoundary,
};
pub use dispatcher::{ChunkerRegistry, Dispatcher, DispatcherBuilder, DispatcherStats};
pub use document::{ChunkMetadata, ChunkedDocument};
pub use embedding::{
    embed_segments, CachedEmbedder, EmbeddingProvider, FnEmbedder, HashingEmbedder,
    SegmentEmbeddings, SharedEmbeddingProvider,
};
pub use error::{Error, Result};
pub use fixed::{FixedChunker, MAX_BOUNDARY_SHIFT};
pub use greedy::GreedyChunker;
pub use merge::{merge, pool};
pub use narrative::{NarrativeChunker, PROSE_SEPARATORS};
pub use segment::{ChunkBoundary, Segment, Segmentation};
pub use segmenter::{paragraphs, split_sentences, BaseSegmenter};
pub use similarity::{cosine_similarity, SimilarityMatrix};
pub use solver::{solve, RewardTable};
pub use strategy::{word_count, Strategy};
pub use tokenizer::{BpeTokenizer, Token, Tokenizer, WhitespaceTokenizer, DEFAULT_ENCODING};

#[cfg(feature = "semantic")]
pub use embedding::FastEmbedProvider;

/// A text chunking strategy.
///
/// All chunkers implement this trait, enabling polymorphic usage:
///
/// ```rust
/// use std::sync::Arc;
/// use tessera::{Chunker, ChunkerConfig, FixedChunker, NarrativeChunker, Tokenizer, WhitespaceTokenizer};
///
/// async fn count(chunker: &dyn Chunker, text: &str) -> usize {
///     chunker.chunk(text, None).await.map(|doc| doc.len()).unwrap_or(0)
/// }
///
/// let tok: Arc<dyn Tokenizer> = Arc::new(WhitespaceTokenizer::new());
/// let cfg = ChunkerConfig::new(4, 8);
/// let fixed = FixedChunker::new(&cfg, Arc::clone(&tok));
/// let narrative = NarrativeChunker::from_config(&cfg, tok);
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let text = "Hello world. This is a test.";
/// assert_eq!(count(&fixed, text).await, 1);
/// assert_eq!(count(&narrative, text).await, 1);
/// # });
/// ```
#[async_trait]
pub trait Chunker: Send + Sync {
    /// The concrete strategy this chunker implements.
    fn strategy(&self) -> Strategy;

    /// Split `text` into chunks, in document order.
    ///
    /// `embedder` is consulted only by embedding strategies; the others
    /// ignore it. Empty or whitespace-only text yields an empty document.
    ///
    /// # Errors
    ///
    /// Only unrecoverable failures are returned, such as a token window that
    /// cannot be decoded. Provider failures are absorbed per segment.
    async fn chunk(
        &self,
        text: &str,
        embedder: Option<&dyn EmbeddingProvider>,
    ) -> Result<ChunkedDocument>;
}
