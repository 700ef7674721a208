//! Narrative chunking: recursive separator splitting under a token budget.
//!
//! Fiction, transcripts and long-form prose carry their structure in
//! whitespace: scene breaks, paragraphs, lines. This strategy keeps the
//! coarsest structure that fits and needs no embeddings.
//!
//! ## The Algorithm
//!
//! Given separators `["\n\n\n", "\n\n", "\n", ". ", " "]` and `max_tokens`:
//!
//! ```text
//! 1. Split on "\n\n\n" (scene breaks)
//! 2. Re-join neighbouring pieces while they fit in max_tokens
//! 3. For each piece still > max_tokens:
//!    - Split that piece on "\n\n" (paragraphs), and so on down the list
//! 4. If a piece is still too big after " " (words):
//!    - Force split into max_tokens token windows (rare)
//! ```
//!
//! A scene break is better than a paragraph boundary, which is better than a
//! sentence boundary, which is better than a word boundary.
//!
//! Sizes are additive estimates: `tokens(a) + tokens(b)` stands in for
//! `tokens(a + b)`. With BPE the two can differ by a token at the seam.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::{
    ChunkedDocument, Chunker, ChunkerConfig, EmbeddingProvider, Result, Strategy, Tokenizer,
};

/// Separators for prose, coarsest first.
pub const PROSE_SEPARATORS: [&str; 5] = ["\n\n\n", "\n\n", "\n", ". ", " "];

/// Recursive separator splitter measured in tokens.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
/// use tessera::{NarrativeChunker, WhitespaceTokenizer};
///
/// let chunker = NarrativeChunker::prose(6, Arc::new(WhitespaceTokenizer::new()));
/// let text = "It was night.\n\nThe door creaked open slowly.\n\n\nMorning came.";
/// let doc = chunker.chunk_text(text);
///
/// assert_eq!(doc.chunks, ["It was night.", "The door creaked open slowly.", "Morning came."]);
/// ```
#[derive(Clone)]
pub struct NarrativeChunker {
    max_tokens: usize,
    separators: Vec<String>,
    tokenizer: Arc<dyn Tokenizer>,
}

impl NarrativeChunker {
    /// Create a chunker with a custom separator hierarchy, coarsest first.
    ///
    /// A zero `max_tokens` is raised to 1 with a warning.
    #[must_use]
    pub fn new(max_tokens: usize, separators: &[&str], tokenizer: Arc<dyn Tokenizer>) -> Self {
        let max_tokens = if max_tokens == 0 {
            warn!("narrative max_tokens is 0; using 1");
            1
        } else {
            max_tokens
        };
        Self {
            max_tokens,
            separators: separators
                .iter()
                .filter(|s| !s.is_empty())
                .map(|&s| s.to_string())
                .collect(),
            tokenizer,
        }
    }

    /// Create a chunker with [`PROSE_SEPARATORS`].
    #[must_use]
    pub fn prose(max_tokens: usize, tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self::new(max_tokens, &PROSE_SEPARATORS, tokenizer)
    }

    /// Create a prose chunker with `config.max_chunk_size` as the budget.
    #[must_use]
    pub fn from_config(config: &ChunkerConfig, tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self::prose(config.max_chunk_size, tokenizer)
    }

    /// Chunk `text` synchronously. Chunks are trimmed; empty ones are dropped.
    #[must_use]
    pub fn chunk_text(&self, text: &str) -> ChunkedDocument {
        if text.trim().is_empty() {
            return ChunkedDocument::empty(Strategy::Narrative);
        }

        let chunks: Vec<String> = self
            .split_recursive(text, 0)
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();

        ChunkedDocument::new(Strategy::Narrative, 0, chunks, None, self.tokenizer.as_ref())
    }

    fn fits(&self, text: &str) -> bool {
        self.tokenizer.count_tokens(text) <= self.max_tokens
    }

    /// Recursively split a piece using the remaining separators.
    fn split_recursive(&self, text: &str, sep_index: usize) -> Vec<String> {
        if self.fits(text) {
            return vec![text.to_string()];
        }
        let Some(sep) = self.separators.get(sep_index) else {
            return self.force_split(text);
        };

        let parts: Vec<&str> = text.split(sep.as_str()).collect();
        if parts.len() == 1 {
            return self.split_recursive(text, sep_index + 1);
        }

        let mut result = Vec::new();
        let mut current = String::new();
        let mut current_tokens = 0;

        for (i, part) in parts.iter().enumerate() {
            let piece = if i < parts.len() - 1 {
                format!("{part}{sep}")
            } else {
                (*part).to_string()
            };
            let piece_tokens = self.tokenizer.count_tokens(&piece);

            if current.is_empty() {
                current = piece;
                current_tokens = piece_tokens;
            } else if current_tokens + piece_tokens <= self.max_tokens {
                current.push_str(&piece);
                current_tokens += piece_tokens;
            } else {
                self.flush(&mut result, &current, current_tokens, sep_index);
                current = piece;
                current_tokens = piece_tokens;
            }
        }

        if !current.is_empty() {
            self.flush(&mut result, &current, current_tokens, sep_index);
        }

        result
    }

    fn flush(&self, result: &mut Vec<String>, piece: &str, tokens: usize, sep_index: usize) {
        if tokens <= self.max_tokens {
            result.push(piece.to_string());
        } else {
            result.extend(self.split_recursive(piece, sep_index + 1));
        }
    }

    /// Cut into `max_tokens` windows when no separator helps. Windows that do
    /// not decode (a character split across tokens) grow until they do.
    fn force_split(&self, text: &str) -> Vec<String> {
        let tokens = self.tokenizer.encode(text);
        let mut result = Vec::new();
        let mut start = 0;

        while start < tokens.len() {
            let mut end = (start + self.max_tokens).min(tokens.len());
            let piece = loop {
                match self.tokenizer.decode(&tokens[start..end]) {
                    Ok(piece) => break Some(piece),
                    Err(_) if end < tokens.len() => end += 1,
                    Err(_) => break None,
                }
            };
            let Some(piece) = piece else {
                warn!(start, "undecodable token window, keeping the piece unsplit");
                return vec![text.to_string()];
            };
            result.push(piece);
            start = end;
        }

        result
    }
}

impl std::fmt::Debug for NarrativeChunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NarrativeChunker")
            .field("max_tokens", &self.max_tokens)
            .field("separators", &self.separators)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Chunker for NarrativeChunker {
    fn strategy(&self) -> Strategy {
        Strategy::Narrative
    }

    async fn chunk(
        &self,
        text: &str,
        _embedder: Option<&dyn EmbeddingProvider>,
    ) -> Result<ChunkedDocument> {
        Ok(self.chunk_text(text))
    }
}
