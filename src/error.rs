//! Error types for tessera.

/// Errors that can occur during chunking.
///
/// Most failures inside a chunking run are recovered locally (a failed
/// embedding becomes a zero vector, bad size settings are clamped). What is
/// left here is what a caller can actually act on.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Tokenizer could not be built or could not decode a token window.
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    /// Embedding provider error.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Configuration could not be interpreted.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Reading a configuration file or starting a worker failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid TOML for [`crate::ChunkerConfig`].
    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    /// The blocking adapter's worker has shut down.
    #[error("chunking worker is no longer running")]
    WorkerUnavailable,
}

/// Result type for tessera operations.
pub type Result<T> = std::result::Result<T, Error>;
