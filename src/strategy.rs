//! Strategy tags and automatic selection.
//!
//! ## Auto Selection
//!
//! [`Strategy::Auto`] picks by approximate document size, counted as
//! whitespace-separated words (no tokenizer needed):
//!
//! ```text
//! words <  2000          -> ClusterSemantic   best quality, O(N^2) matrix
//! 2000 <= words <= 10000 -> GreedySemantic    local decisions, O(N)
//! words >  10000         -> FixedSize         no embeddings at all
//! ```
//!
//! `Auto` is always resolved before a chunker runs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{AutoThresholds, Error};

/// A chunking strategy.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Globally optimal segmentation over the similarity matrix.
    ClusterSemantic,
    /// Local coherence-window greedy segmentation.
    GreedySemantic,
    /// Token-budget packing, no embeddings.
    FixedSize,
    /// Structure-preserving splitting for prose.
    Narrative,
    /// Choose by document size.
    #[default]
    Auto,
}

impl Strategy {
    /// All concrete (non-`Auto`) strategies.
    pub const CONCRETE: [Strategy; 4] = [
        Strategy::ClusterSemantic,
        Strategy::GreedySemantic,
        Strategy::FixedSize,
        Strategy::Narrative,
    ];

    /// Stable lowercase name, matching the serde representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Strategy::ClusterSemantic => "cluster_semantic",
            Strategy::GreedySemantic => "greedy_semantic",
            Strategy::FixedSize => "fixed_size",
            Strategy::Narrative => "narrative",
            Strategy::Auto => "auto",
        }
    }

    /// Pick a concrete strategy for a document of `words` words.
    #[must_use]
    pub fn auto_select(words: usize, thresholds: &AutoThresholds) -> Strategy {
        if words < thresholds.small_doc_words {
            Strategy::ClusterSemantic
        } else if words <= thresholds.large_doc_words {
            Strategy::GreedySemantic
        } else {
            Strategy::FixedSize
        }
    }

    /// Resolve `Auto` against `text`; concrete strategies are returned as-is.
    #[must_use]
    pub fn resolve(self, text: &str, thresholds: &AutoThresholds) -> Strategy {
        match self {
            Strategy::Auto => Self::auto_select(word_count(text), thresholds),
            concrete => concrete,
        }
    }

    /// Whether this strategy consults an embedding provider.
    #[must_use]
    pub const fn uses_embeddings(&self) -> bool {
        matches!(self, Strategy::ClusterSemantic | Strategy::GreedySemantic)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "cluster_semantic" | "cluster" => Ok(Strategy::ClusterSemantic),
            "greedy_semantic" | "greedy" => Ok(Strategy::GreedySemantic),
            "fixed_size" | "fixed" => Ok(Strategy::FixedSize),
            "narrative" => Ok(Strategy::Narrative),
            "auto" => Ok(Strategy::Auto),
            other => Err(Error::Config(format!("unknown strategy: {other}"))),
        }
    }
}

/// Approximate document size: whitespace-separated words.
#[must_use]
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        vec!["w"; n].join(" ")
    }

    #[test]
    fn test_auto_boundaries() {
        let t = AutoThresholds::default();
        assert_eq!(Strategy::auto_select(0, &t), Strategy::ClusterSemantic);
        assert_eq!(Strategy::auto_select(1999, &t), Strategy::ClusterSemantic);
        assert_eq!(Strategy::auto_select(2000, &t), Strategy::GreedySemantic);
        assert_eq!(Strategy::auto_select(10_000, &t), Strategy::GreedySemantic);
        assert_eq!(Strategy::auto_select(10_001, &t), Strategy::FixedSize);
    }

    #[test]
    fn test_resolve_counts_words() {
        let t = AutoThresholds::default();
        assert_eq!(
            Strategy::Auto.resolve(&words(1999), &t),
            Strategy::ClusterSemantic
        );
        assert_eq!(
            Strategy::Auto.resolve(&words(2000), &t),
            Strategy::GreedySemantic
        );
        assert_eq!(
            Strategy::Narrative.resolve(&words(50_000), &t),
            Strategy::Narrative
        );
    }

    #[test]
    fn test_parse_roundtrip() {
        for strategy in Strategy::CONCRETE.iter().chain([Strategy::Auto].iter()) {
            assert_eq!(strategy.as_str().parse::<Strategy>().unwrap(), *strategy);
        }
        assert_eq!("Fixed-Size".parse::<Strategy>().unwrap(), Strategy::FixedSize);
        assert!("bogus".parse::<Strategy>().is_err());
    }
}
