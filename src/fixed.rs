//! Fixed-size chunking.
//!
//! The fast path for large documents. No embeddings, no similarity matrix,
//! just a token budget. Two accumulation units are available:
//!
//! ## Segment Mode (default)
//!
//! Base segments are packed greedily up to `max_chunk_size` tokens (see
//! [`crate::budget`]). Chunks end on paragraph or sentence boundaries.
//!
//! ## Token Mode
//!
//! The document is encoded once and cut into windows of exactly `size`
//! tokens, each starting `size - overlap` tokens after the previous one:
//!
//! ```text
//! size = 4, overlap = 1
//!
//! tokens:   t0 t1 t2 t3 t4 t5 t6 t7 t8 t9
//!
//! Chunk 0:  t0 t1 t2 t3                      [0..4]
//! Chunk 1:           t3 t4 t5 t6             [3..7]   <- starts at 4 - 1 = 3
//! Chunk 2:                    t6 t7 t8 t9    [6..10]  <- reaches the end, stop
//! ```
//!
//! ## Why Overlap?
//!
//! Without overlap, information at chunk boundaries is lost. If a key sentence
//! spans two chunks, neither chunk captures it fully:
//!
//! ```text
//! "The answer is 42"
//!         ↓
//! No overlap:  ["The answer", "is 42"]          <- broken!
//! With overlap: ["The answer is", "is 42"]      <- both have context
//! ```
//!
//! | Overlap | Storage | Retrieval | Risk |
//! |---------|---------|-----------|------|
//! | 0% | Minimal | Poor at boundaries | Info loss |
//! | 10-20% | Low | Good | Sweet spot |
//! | 50%+ | High | Redundant | Wasted compute |
//!
//! ## Multi-byte Characters
//!
//! A BPE window can end inside a multi-byte character, and such a window does
//! not decode. The cut moves back (then forward) by up to
//! [`MAX_BOUNDARY_SHIFT`] tokens until the window decodes. Overlapped starts
//! move forward the same way.
//!
//! Each window is returned exactly as it decodes, leading newlines and
//! indentation included. Only windows that decode to pure whitespace are
//! dropped, so without overlap the chunks concatenate back to the input.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::{
    BudgetChunker, ChunkedDocument, Chunker, ChunkerConfig, EmbeddingProvider, Error, FixedMode,
    Result, Strategy, Token, Tokenizer,
};

/// Furthest a window edge moves to land on a character boundary.
///
/// A UTF-8 character is at most 4 bytes, so at most 3 byte-level tokens can
/// sit between a cut and the nearest character boundary.
pub const MAX_BOUNDARY_SHIFT: usize = 3;

/// Fixed-size chunker in segment or token mode.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
/// use tessera::{FixedChunker, WhitespaceTokenizer};
///
/// let chunker = FixedChunker::tokens(4, 1, Arc::new(WhitespaceTokenizer::new()));
/// let doc = chunker.chunk_tokens("t0 t1 t2 t3 t4 t5 t6 t7 t8 t9").unwrap();
///
/// assert_eq!(doc.chunks, ["t0 t1 t2 t3", "t3 t4 t5 t6", "t6 t7 t8 t9"]);
/// ```
#[derive(Debug, Clone)]
pub struct FixedChunker {
    mode: Mode,
}

#[derive(Debug, Clone)]
enum Mode {
    Segments(BudgetChunker),
    Tokens(TokenWindows),
}

#[derive(Clone)]
struct TokenWindows {
    size: usize,
    overlap: usize,
    tokenizer: Arc<dyn Tokenizer>,
}

impl std::fmt::Debug for TokenWindows {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenWindows")
            .field("size", &self.size)
            .field("overlap", &self.overlap)
            .finish_non_exhaustive()
    }
}

impl FixedChunker {
    /// Create a chunker in the mode `config.fixed.mode` selects.
    #[must_use]
    pub fn new(config: &ChunkerConfig, tokenizer: Arc<dyn Tokenizer>) -> Self {
        match config.fixed.mode {
            FixedMode::Segments => Self {
                mode: Mode::Segments(BudgetChunker::new(config, tokenizer)),
            },
            FixedMode::Tokens => Self::tokens(config.max_chunk_size, config.fixed.overlap, tokenizer),
        }
    }

    /// Create a token-window chunker.
    ///
    /// A zero `size` is raised to 1 and an `overlap` of `size` or more is
    /// lowered to `size - 1`, both with a warning.
    #[must_use]
    pub fn tokens(size: usize, overlap: usize, tokenizer: Arc<dyn Tokenizer>) -> Self {
        let size = if size == 0 {
            warn!("fixed chunk size is 0; using 1");
            1
        } else {
            size
        };
        let overlap = if overlap >= size {
            warn!(overlap, size, "overlap must be below chunk size; clamping");
            size - 1
        } else {
            overlap
        };
        Self {
            mode: Mode::Tokens(TokenWindows {
                size,
                overlap,
                tokenizer,
            }),
        }
    }

    /// The accumulation unit in use.
    #[must_use]
    pub fn mode(&self) -> FixedMode {
        match self.mode {
            Mode::Segments(_) => FixedMode::Segments,
            Mode::Tokens(_) => FixedMode::Tokens,
        }
    }

    /// Chunk `text` synchronously.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tokenizer`] if a token window cannot be decoded
    /// within [`MAX_BOUNDARY_SHIFT`] tokens of its nominal end.
    pub fn chunk_tokens(&self, text: &str) -> Result<ChunkedDocument> {
        match &self.mode {
            Mode::Segments(budget) => Ok(budget.chunk_sync(text)),
            Mode::Tokens(windows) => windows.chunk(text),
        }
    }
}

impl TokenWindows {
    fn step(&self) -> usize {
        self.size - self.overlap
    }

    fn chunk(&self, text: &str) -> Result<ChunkedDocument> {
        if text.trim().is_empty() {
            return Ok(ChunkedDocument::empty(Strategy::FixedSize));
        }

        let tokens = self.tokenizer.encode(text);
        let mut chunks = Vec::with_capacity(tokens.len().div_ceil(self.step()));
        let mut start = 0;

        while start < tokens.len() {
            let end = (start + self.size).min(tokens.len());
            let (window, cut) = self.decode_window(&tokens, start, end)?;

            if !window.trim().is_empty() {
                chunks.push(window);
            }

            if cut >= tokens.len() {
                break;
            }
            start = self.next_start(&tokens, start, cut);
        }

        Ok(ChunkedDocument::new(
            Strategy::FixedSize,
            0,
            chunks,
            None,
            self.tokenizer.as_ref(),
        ))
    }

    /// Decode `tokens[start..end]`, moving `end` until the window is valid text.
    fn decode_window(&self, tokens: &[Token], start: usize, end: usize) -> Result<(String, usize)> {
        let shrink = (start + 1..=end).rev().take(MAX_BOUNDARY_SHIFT + 1);
        let grow = end + 1..=(end + MAX_BOUNDARY_SHIFT).min(tokens.len());

        for cut in shrink.chain(grow) {
            if let Ok(window) = self.tokenizer.decode(&tokens[start..cut]) {
                return Ok((window, cut));
            }
        }
        Err(Error::Tokenizer(format!(
            "no decodable window near tokens {start}..{end}"
        )))
    }

    /// First token of the next window, stepped back by the overlap and moved
    /// forward onto a character boundary.
    fn next_start(&self, tokens: &[Token], start: usize, cut: usize) -> usize {
        let next = cut.saturating_sub(self.overlap);
        if next <= start {
            return cut;
        }
        (next..cut)
            .take(MAX_BOUNDARY_SHIFT + 1)
            .find(|&s| self.tokenizer.decode(&tokens[s..cut]).is_ok())
            .unwrap_or(cut)
    }
}

#[async_trait]
impl Chunker for FixedChunker {
    fn strategy(&self) -> Strategy {
        Strategy::FixedSize
    }

    async fn chunk(
        &self,
        text: &str,
        _embedder: Option<&dyn EmbeddingProvider>,
    ) -> Result<ChunkedDocument> {
        self.chunk_tokens(text)
    }
}
