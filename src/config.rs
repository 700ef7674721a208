//! Chunker configuration.
//!
//! ## Sizes
//!
//! Two numbers drive every strategy, both measured in tokens:
//!
//! - `min_chunk_size`: the target size of a base segment. Paragraphs at or
//!   under it stay whole; longer paragraphs are cut into sentence groups of at
//!   most `min_chunk_size * 1.5` tokens.
//! - `max_chunk_size`: the budget of a final chunk.
//!
//! For the optimal path their ratio becomes `max_cluster`, the most base
//! segments one chunk may hold:
//!
//! ```text
//! min = 50, max = 400  ->  max_cluster = 8
//! min = 50, max = 60   ->  max_cluster = 1
//! min = 50, max = 20   ->  max_cluster = 0, clamped to 1
//! ```
//!
//! A `max_chunk_size` below `min_chunk_size` is not rejected. It is clamped so
//! the solver always has at least one legal chunk size per step.
//!
//! ## Loading
//!
//! ```rust
//! use tessera::{ChunkerConfig, Strategy};
//!
//! let cfg = ChunkerConfig::from_toml_str(r#"
//!     strategy = "cluster_semantic"
//!     min_chunk_size = 40
//!     max_chunk_size = 320
//!
//!     [auto]
//!     small_doc_words = 1500
//! "#).unwrap();
//!
//! assert_eq!(cfg.strategy, Strategy::ClusterSemantic);
//! assert_eq!(cfg.max_cluster(), 8);
//! assert_eq!(cfg.auto.large_doc_words, 10_000);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{Result, Strategy};

/// Top-level configuration shared by the dispatcher and every strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Strategy used when a call does not name one.
    pub strategy: Strategy,
    /// Target base segment size in tokens.
    pub min_chunk_size: usize,
    /// Final chunk budget in tokens.
    pub max_chunk_size: usize,
    /// Embedding cache capacity in entries.
    pub cache_size: usize,
    /// Whether provider calls go through the embedding cache.
    pub enable_cache: bool,
    /// Encoding name (or model name) for [`crate::BpeTokenizer`].
    pub tokenizer: String,
    /// How paragraphs are cut into sentences.
    pub sentence_boundary: SentenceBoundary,
    /// Maximum number of provider calls in flight for one document.
    pub embed_concurrency: usize,
    /// Size thresholds for [`Strategy::Auto`].
    pub auto: AutoThresholds,
    /// Greedy semantic strategy knobs.
    pub greedy: GreedyOptions,
    /// Fixed-size strategy knobs.
    pub fixed: FixedOptions,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Auto,
            min_chunk_size: 50,
            max_chunk_size: 400,
            cache_size: 1000,
            enable_cache: true,
            tokenizer: "cl100k_base".to_string(),
            sentence_boundary: SentenceBoundary::default(),
            embed_concurrency: 8,
            auto: AutoThresholds::default(),
            greedy: GreedyOptions::default(),
            fixed: FixedOptions::default(),
        }
    }
}

impl ChunkerConfig {
    /// Create a configuration with the given size bounds and defaults elsewhere.
    #[must_use]
    pub fn new(min_chunk_size: usize, max_chunk_size: usize) -> Self {
        Self {
            min_chunk_size,
            max_chunk_size,
            ..Self::default()
        }
    }

    /// Parse a TOML document. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Toml`] if the document does not parse.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Read and parse a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] if the file cannot be read and
    /// [`crate::Error::Toml`] if it does not parse.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Set the default strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the embedding cache capacity.
    #[must_use]
    pub fn with_cache_size(mut self, cache_size: usize) -> Self {
        self.cache_size = cache_size;
        self
    }

    /// Turn the embedding cache off.
    #[must_use]
    pub fn without_cache(mut self) -> Self {
        self.enable_cache = false;
        self
    }

    /// Set the sentence boundary rule.
    #[must_use]
    pub fn with_sentence_boundary(mut self, boundary: SentenceBoundary) -> Self {
        self.sentence_boundary = boundary;
        self
    }

    /// The most base segments a single chunk may contain.
    ///
    /// `max(1, max_chunk_size / min_chunk_size)`. A zero `min_chunk_size` is
    /// treated as 1.
    #[must_use]
    pub fn max_cluster(&self) -> usize {
        let ratio = self.max_chunk_size / self.min_chunk_size.max(1);
        if ratio == 0 {
            warn!(
                min_chunk_size = self.min_chunk_size,
                max_chunk_size = self.max_chunk_size,
                "max_chunk_size is below min_chunk_size; clamping max_cluster to 1"
            );
        }
        ratio.max(1)
    }

    /// Token ceiling for a sentence group inside one base segment.
    #[must_use]
    pub fn overflow_limit(&self) -> usize {
        self.min_chunk_size + self.min_chunk_size / 2
    }

    /// In-flight provider call limit, never below 1.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.embed_concurrency.max(1)
    }
}

/// Rule used to find sentence ends inside a paragraph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentenceBoundary {
    /// `.`, `!` or `?` followed by whitespace.
    #[default]
    Punctuation,
    /// Unicode Standard Annex #29 sentence boundaries.
    Unicode,
}

/// Document size thresholds, in whitespace-separated words, for
/// [`Strategy::Auto`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoThresholds {
    /// Documents with fewer words use [`Strategy::ClusterSemantic`].
    pub small_doc_words: usize,
    /// Documents with more words use [`Strategy::FixedSize`]. Everything in
    /// between uses [`Strategy::GreedySemantic`].
    pub large_doc_words: usize,
}

impl Default for AutoThresholds {
    fn default() -> Self {
        Self {
            small_doc_words: 2000,
            large_doc_words: 10_000,
        }
    }
}

/// Knobs for the greedy coherence-window strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GreedyOptions {
    /// Cosine similarity below which a new chunk starts.
    pub threshold: f32,
    /// Number of trailing segments averaged when comparing the next one.
    pub window: usize,
}

impl Default for GreedyOptions {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            window: 3,
        }
    }
}

/// What the fixed-size strategy accumulates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixedMode {
    /// Whole base segments, packed up to `max_chunk_size` tokens.
    #[default]
    Segments,
    /// Raw token windows of exactly `max_chunk_size` tokens.
    Tokens,
}

/// Knobs for the fixed-size strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedOptions {
    /// Accumulation unit.
    pub mode: FixedMode,
    /// Tokens shared by adjacent windows in [`FixedMode::Tokens`].
    pub overlap: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = ChunkerConfig::default();
        assert_eq!(cfg.strategy, Strategy::Auto);
        assert_eq!(cfg.min_chunk_size, 50);
        assert_eq!(cfg.max_chunk_size, 400);
        assert_eq!(cfg.cache_size, 1000);
        assert!(cfg.enable_cache);
        assert_eq!(cfg.max_cluster(), 8);
        assert_eq!(cfg.overflow_limit(), 75);
    }

    #[test]
    fn test_max_cluster_clamped() {
        assert_eq!(ChunkerConfig::new(50, 20).max_cluster(), 1);
        assert_eq!(ChunkerConfig::new(0, 20).max_cluster(), 20);
        assert_eq!(ChunkerConfig::new(10, 20).max_cluster(), 2);
        assert_eq!(ChunkerConfig::new(10, 29).max_cluster(), 2);
    }

    #[test]
    fn test_overflow_limit() {
        assert_eq!(ChunkerConfig::new(10, 100).overflow_limit(), 15);
        assert_eq!(ChunkerConfig::new(5, 100).overflow_limit(), 7);
        assert_eq!(ChunkerConfig::new(0, 100).overflow_limit(), 0);
    }

    #[test]
    fn test_partial_toml() {
        let cfg = ChunkerConfig::from_toml_str(
            r#"
            enable_cache = false
            sentence_boundary = "unicode"

            [fixed]
            mode = "tokens"
            overlap = 8
            "#,
        )
        .unwrap();

        assert!(!cfg.enable_cache);
        assert_eq!(cfg.sentence_boundary, SentenceBoundary::Unicode);
        assert_eq!(cfg.fixed.mode, FixedMode::Tokens);
        assert_eq!(cfg.fixed.overlap, 8);
        assert_eq!(cfg.min_chunk_size, 50);
    }

    #[test]
    fn test_bad_toml() {
        let err = ChunkerConfig::from_toml_str("min_chunk_size = \"lots\"").unwrap_err();
        assert!(matches!(err, crate::Error::Toml(_)));
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tessera.toml");
        std::fs::write(&path, "max_chunk_size = 256\n").unwrap();

        let cfg = ChunkerConfig::from_path(&path).unwrap();
        assert_eq!(cfg.max_chunk_size, 256);

        let missing = ChunkerConfig::from_path(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, crate::Error::Io(_)));
    }
}
