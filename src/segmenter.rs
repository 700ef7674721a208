//! Base segmentation: paragraphs first, then sentence groups.
//!
//! ## The Algorithm
//!
//! ```text
//! text ──split on blank lines──> paragraphs
//!
//! paragraph <= min tokens        -> one segment, as is
//! paragraph >  min tokens        -> sentences, packed greedily until the
//!                                   next one would push the group past
//!                                   min * 1.5 tokens
//! ```
//!
//! The 50% overflow allowance keeps segments near-uniform without forcing a
//! cut right after a short sentence. A paragraph that is one enormous
//! sentence stays one oversized segment; nothing below sentence level is cut.
//!
//! ## Finding Sentences
//!
//! The default rule is deliberately simple: a sentence ends at `.`, `!` or
//! `?` followed by whitespace. "Dr. Smith" splits; "3.14" and "e.g.," do not.
//! [`SentenceBoundary::Unicode`] switches to UAX #29, which knows more
//! abbreviations at the cost of stricter capitalisation rules.

use std::sync::Arc;

use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

use crate::{ChunkerConfig, Segment, SentenceBoundary, Tokenizer};

/// Splits raw text into near-uniform [`Segment`]s.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
/// use tessera::{BaseSegmenter, ChunkerConfig, WhitespaceTokenizer};
///
/// let cfg = ChunkerConfig::new(6, 48);
/// let segmenter = BaseSegmenter::new(&cfg, Arc::new(WhitespaceTokenizer::new()));
///
/// let text = "Short one.\n\nThis paragraph is long. It has three sentences. Each is short.";
/// let segments = segmenter.segment(text);
///
/// assert_eq!(segments[0].text, "Short one.");
/// assert_eq!(segments[1].text, "This paragraph is long. It has three sentences.");
/// assert_eq!(segments[2].text, "Each is short.");
/// ```
#[derive(Clone)]
pub struct BaseSegmenter {
    min_chunk_size: usize,
    overflow_limit: usize,
    boundary: SentenceBoundary,
    tokenizer: Arc<dyn Tokenizer>,
}

impl BaseSegmenter {
    /// Create a segmenter from the size and boundary settings in `config`.
    #[must_use]
    pub fn new(config: &ChunkerConfig, tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self {
            min_chunk_size: config.min_chunk_size,
            overflow_limit: config.overflow_limit(),
            boundary: config.sentence_boundary,
            tokenizer,
        }
    }

    /// The tokenizer used for size decisions.
    #[must_use]
    pub fn tokenizer(&self) -> &Arc<dyn Tokenizer> {
        &self.tokenizer
    }

    /// Split `text` into segments. Empty or whitespace-only text yields none.
    #[must_use]
    pub fn segment(&self, text: &str) -> Vec<Segment> {
        let mut segments = Vec::new();

        for paragraph in paragraphs(text) {
            let tokens = self.tokenizer.count_tokens(&paragraph);
            if tokens <= self.min_chunk_size {
                segments.push(Segment::new(segments.len(), paragraph, tokens));
                continue;
            }

            let mut group: Vec<&str> = Vec::new();
            let mut group_tokens = 0;

            for sentence in split_sentences(&paragraph, self.boundary) {
                let sentence_tokens = self.tokenizer.count_tokens(sentence);
                if !group.is_empty() && group_tokens + sentence_tokens > self.overflow_limit {
                    self.push_group(&mut segments, &group);
                    group.clear();
                    group_tokens = 0;
                }
                group.push(sentence);
                group_tokens += sentence_tokens;
            }

            if !group.is_empty() {
                self.push_group(&mut segments, &group);
            }
        }

        debug!(segments = segments.len(), "base segmentation complete");
        segments
    }

    fn push_group(&self, segments: &mut Vec<Segment>, group: &[&str]) {
        let text = group.join(" ");
        let tokens = self.tokenizer.count_tokens(&text);
        segments.push(Segment::new(segments.len(), text, tokens));
    }
}

impl std::fmt::Debug for BaseSegmenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseSegmenter")
            .field("min_chunk_size", &self.min_chunk_size)
            .field("overflow_limit", &self.overflow_limit)
            .field("boundary", &self.boundary)
            .finish()
    }
}

/// Paragraphs separated by one or more blank (whitespace-only) lines.
///
/// Each paragraph is trimmed; lines inside it keep their `\n` separators.
#[must_use]
pub fn paragraphs(text: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                result.push(current.join("\n").trim().to_string());
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        result.push(current.join("\n").trim().to_string());
    }

    result
}

/// Split a paragraph into trimmed, non-empty sentences.
#[must_use]
pub fn split_sentences(text: &str, boundary: SentenceBoundary) -> Vec<&str> {
    match boundary {
        SentenceBoundary::Punctuation => punctuation_sentences(text),
        SentenceBoundary::Unicode => text
            .split_sentence_bounds()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect(),
    }
}

fn punctuation_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        if let Some(&(_, next)) = chars.peek() {
            if next.is_whitespace() {
                let end = i + c.len_utf8();
                let sentence = text[start..end].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                start = end;
            }
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}
