//! Token counting and encoding.
//!
//! Every size in tessera is measured in tokens, so every strategy holds a
//! [`Tokenizer`]. Two are provided:
//!
//! - [`BpeTokenizer`]: tiktoken byte-pair encodings (`cl100k_base` by
//!   default). Counts match what OpenAI-style embedding models see.
//! - [`WhitespaceTokenizer`]: one token per whitespace-separated word.
//!   Deterministic and dependency-free; decoding normalizes whitespace.

use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

use tiktoken_rs::CoreBPE;
use tracing::warn;

use crate::{Error, Result};

/// A token id.
pub type Token = u32;

/// Text to tokens and back.
pub trait Tokenizer: Send + Sync {
    /// Number of tokens in `text`.
    fn count_tokens(&self, text: &str) -> usize;

    /// Encode `text` into token ids.
    fn encode(&self, text: &str) -> Vec<Token>;

    /// Decode token ids back into text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tokenizer`] if the ids do not form valid text, e.g.
    /// a BPE window that ends inside a multi-byte character.
    fn decode(&self, tokens: &[Token]) -> Result<String>;
}

/// Encoding used when the requested one cannot be loaded.
pub const DEFAULT_ENCODING: &str = "cl100k_base";

/// tiktoken byte-pair encoding tokenizer.
pub struct BpeTokenizer {
    bpe: CoreBPE,
    encoding: String,
}

impl BpeTokenizer {
    /// Load an encoding by name (`cl100k_base`, `o200k_base`, `p50k_base`,
    /// `r50k_base`) or by model name (`gpt-4o`, `text-embedding-3-small`, ...).
    ///
    /// An unknown name falls back to [`DEFAULT_ENCODING`] with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tokenizer`] only if the fallback encoding also fails
    /// to load.
    pub fn new(name: &str) -> Result<Self> {
        match load_encoding(name) {
            Ok(bpe) => Ok(Self {
                bpe,
                encoding: name.to_string(),
            }),
            Err(err) => {
                warn!(
                    encoding = name,
                    error = %err,
                    fallback = DEFAULT_ENCODING,
                    "tokenizer unavailable, falling back to default encoding"
                );
                Self::cl100k()
            }
        }
    }

    /// The `cl100k_base` encoding.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tokenizer`] if the bundled encoding fails to load.
    pub fn cl100k() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base().map_err(|e| Error::Tokenizer(e.to_string()))?;
        Ok(Self {
            bpe,
            encoding: DEFAULT_ENCODING.to_string(),
        })
    }

    /// Name of the encoding actually in use.
    #[must_use]
    pub fn encoding(&self) -> &str {
        &self.encoding
    }
}

// tiktoken-rs reports `anyhow::Error`; only the message is kept.
fn load_encoding(name: &str) -> std::result::Result<CoreBPE, String> {
    let loaded = match name {
        "cl100k_base" => tiktoken_rs::cl100k_base(),
        "o200k_base" => tiktoken_rs::o200k_base(),
        "p50k_base" => tiktoken_rs::p50k_base(),
        "r50k_base" => tiktoken_rs::r50k_base(),
        model => tiktoken_rs::get_bpe_from_model(model),
    };
    loaded.map_err(|e| e.to_string())
}

impl Tokenizer for BpeTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }

    fn encode(&self, text: &str) -> Vec<Token> {
        self.bpe.encode_with_special_tokens(text)
    }

    fn decode(&self, tokens: &[Token]) -> Result<String> {
        self.bpe
            .decode(tokens.to_vec())
            .map_err(|e| Error::Tokenizer(e.to_string()))
    }
}

impl fmt::Debug for BpeTokenizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BpeTokenizer")
            .field("encoding", &self.encoding)
            .finish()
    }
}

/// One token per whitespace-separated word.
///
/// Ids are assigned on first sight, so decoding only knows words this
/// instance has encoded. The vocabulary is never pruned: a long-lived
/// instance holds every distinct word it has encoded (see
/// [`WhitespaceTokenizer::vocab_len`]). Counting tokens does not touch it;
/// only `encode`, used by fixed-size token windows and narrative force
/// splits, adds words. Use [`BpeTokenizer`] for unbounded input streams.
///
/// ```rust
/// use tessera::{Tokenizer, WhitespaceTokenizer};
///
/// let tok = WhitespaceTokenizer::new();
/// let ids = tok.encode("the  cat\nthe hat");
/// assert_eq!(ids.len(), 4);
/// assert_eq!(ids[0], ids[2]);
/// assert_eq!(tok.decode(&ids).unwrap(), "the cat the hat");
/// ```
#[derive(Debug, Default)]
pub struct WhitespaceTokenizer {
    vocab: RwLock<Vocab>,
}

#[derive(Debug, Default)]
struct Vocab {
    ids: HashMap<String, Token>,
    words: Vec<String>,
}

impl WhitespaceTokenizer {
    /// Create a tokenizer with an empty vocabulary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Distinct words interned so far.
    #[must_use]
    pub fn vocab_len(&self) -> usize {
        self.vocab
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .words
            .len()
    }
}

impl Tokenizer for WhitespaceTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }

    fn encode(&self, text: &str) -> Vec<Token> {
        let mut vocab = self.vocab.write().unwrap_or_else(PoisonError::into_inner);
        text.split_whitespace()
            .map(|word| {
                if let Some(&id) = vocab.ids.get(word) {
                    return id;
                }
                let id = vocab.words.len() as Token;
                vocab.words.push(word.to_string());
                vocab.ids.insert(word.to_string(), id);
                id
            })
            .collect()
    }

    fn decode(&self, tokens: &[Token]) -> Result<String> {
        let vocab = self.vocab.read().unwrap_or_else(PoisonError::into_inner);
        let words = tokens
            .iter()
            .map(|&id| {
                vocab
                    .words
                    .get(id as usize)
                    .map(String::as_str)
                    .ok_or_else(|| Error::Tokenizer(format!("unknown token id {id}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(words.join(" "))
    }
}
