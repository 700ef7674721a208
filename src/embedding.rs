//! Embedding providers.
//!
//! A provider turns text into a fixed-dimension vector. It is the only part of
//! chunking that may block on I/O or model inference, so the trait is async
//! and every call site awaits it; [`crate::BlockingDispatcher`] is the single
//! bridge for synchronous callers.
//!
//! ## Failure Model
//!
//! A failed call never aborts a document. [`embed_segments`] issues the calls
//! concurrently, keeps results in segment order, and replaces each failure
//! with a zero vector of the provider's dimension:
//!
//! ```text
//! segments:   s0     s1     s2     s3
//! results:    Ok     Err    Ok     Ok
//! vectors:    v0     0⃗      v2     v3      failed = 1
//! ```
//!
//! A zero vector has cosine 0 with everything, so the failed segment simply
//! carries no semantic signal into the similarity matrix.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::warn;

use crate::{EmbeddingCache, Error, Result, Segment};

/// Source of embedding vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one piece of text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Output dimension, if known without calling [`Self::embed`].
    fn dimension(&self) -> Option<usize> {
        None
    }

    /// Label for logs and telemetry.
    fn identify(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Shared handle to a provider.
pub type SharedEmbeddingProvider = Arc<dyn EmbeddingProvider>;

/// Adapter turning a plain function into a provider.
///
/// ```rust
/// use tessera::{EmbeddingProvider, FnEmbedder};
///
/// let provider = FnEmbedder::new(|text: &str| Ok(vec![text.len() as f32, 1.0]));
/// # tokio_test_block(async {
/// assert_eq!(provider.embed("abc").await.unwrap(), vec![3.0, 1.0]);
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f);
/// # }
/// ```
pub struct FnEmbedder<F> {
    f: F,
    dimension: Option<usize>,
}

impl<F> FnEmbedder<F>
where
    F: Fn(&str) -> Result<Vec<f32>> + Send + Sync,
{
    /// Wrap `f`.
    pub fn new(f: F) -> Self {
        Self { f, dimension: None }
    }

    /// Declare the output dimension up front.
    #[must_use]
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }
}

#[async_trait]
impl<F> EmbeddingProvider for FnEmbedder<F>
where
    F: Fn(&str) -> Result<Vec<f32>> + Send + Sync,
{
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        (self.f)(text)
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    fn identify(&self) -> &'static str {
        "fn"
    }
}

/// Deterministic bag-of-words embeddings.
///
/// Each lowercase alphanumeric word is hashed into one of `dim` buckets.
/// Texts sharing vocabulary get high cosine similarity, texts with disjoint
/// vocabulary get (nearly) zero. Useful offline and in tests; not a
/// substitute for a real model.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    /// Create an embedder with `dim` buckets (at least 1).
    #[must_use]
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    /// Embed synchronously.
    #[must_use]
    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0; self.dim];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            let bucket = (hasher.finish() % self.dim as u64) as usize;
            v[bucket] += 1.0;
        }
        v
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vector(text))
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.dim)
    }

    fn identify(&self) -> &'static str {
        "hashing"
    }
}

/// Provider decorator that memoizes vectors in a shared [`EmbeddingCache`].
///
/// Only successful calls are cached. Two concurrent misses on the same text
/// both reach the inner provider.
#[derive(Clone)]
pub struct CachedEmbedder {
    inner: SharedEmbeddingProvider,
    cache: Arc<Mutex<EmbeddingCache>>,
}

impl CachedEmbedder {
    /// Wrap `inner` with `cache`.
    pub fn new(inner: SharedEmbeddingProvider, cache: Arc<Mutex<EmbeddingCache>>) -> Self {
        Self { inner, cache }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, EmbeddingCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl EmbeddingProvider for CachedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let cached = self.lock().get(text);
        if let Some(vector) = cached {
            return Ok(vector);
        }

        let vector = self.inner.embed(text).await?;
        self.lock().put(text, vector.clone());
        Ok(vector)
    }

    fn dimension(&self) -> Option<usize> {
        self.inner.dimension()
    }

    fn identify(&self) -> &'static str {
        self.inner.identify()
    }
}

/// Segment vectors in segment order, with failures already replaced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentEmbeddings {
    /// One vector per segment.
    pub vectors: Vec<Vec<f32>>,
    /// Dimension shared by every vector.
    pub dimension: usize,
    /// Segments whose call failed (or returned the wrong dimension).
    pub failed: usize,
}

/// Embed every segment with at most `concurrency` calls in flight.
///
/// The dimension is taken from the first successful vector, else from
/// [`EmbeddingProvider::dimension`], else 0.
pub async fn embed_segments(
    provider: &dyn EmbeddingProvider,
    segments: &[Segment],
    concurrency: usize,
) -> SegmentEmbeddings {
    let calls: Vec<_> = segments.iter().map(|s| provider.embed(&s.text)).collect();
    let results: Vec<Result<Vec<f32>>> = stream::iter(calls)
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let dimension = results
        .iter()
        .find_map(|r| r.as_ref().ok().map(Vec::len))
        .or_else(|| provider.dimension())
        .unwrap_or(0);

    let mut failed = 0;
    let vectors = results
        .into_iter()
        .enumerate()
        .map(|(segment, result)| match result {
            Ok(v) if v.len() == dimension => v,
            Ok(v) => {
                warn!(
                    segment,
                    expected = dimension,
                    got = v.len(),
                    provider = provider.identify(),
                    "embedding dimension mismatch, substituting zero vector"
                );
                failed += 1;
                vec![0.0; dimension]
            }
            Err(err) => {
                warn!(
                    segment,
                    error = %err,
                    provider = provider.identify(),
                    "embedding failed, substituting zero vector"
                );
                failed += 1;
                vec![0.0; dimension]
            }
        })
        .collect();

    SegmentEmbeddings {
        vectors,
        dimension,
        failed,
    }
}

/// Local ONNX embedding model via fastembed (BGE-small-en by default).
///
/// Inference is CPU-bound, so each call runs on tokio's blocking pool.
#[cfg(feature = "semantic")]
pub struct FastEmbedProvider {
    model: Arc<fastembed::TextEmbedding>,
}

#[cfg(feature = "semantic")]
impl FastEmbedProvider {
    /// Load fastembed's default model.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Embedding`] if the model fails to load.
    pub fn new() -> Result<Self> {
        let model = fastembed::TextEmbedding::try_new(Default::default())
            .map_err(|e| Error::Embedding(e.to_string()))?;
        Ok(Self {
            model: Arc::new(model),
        })
    }
}

#[cfg(feature = "semantic")]
#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let model = Arc::clone(&self.model);
        let owned = text.to_string();
        let mut vectors = tokio::task::spawn_blocking(move || model.embed(vec![owned], None))
            .await
            .map_err(|e| Error::Embedding(format!("join error: {e}")))?
            .map_err(|e| Error::Embedding(e.to_string()))?;
        vectors
            .pop()
            .ok_or_else(|| Error::Embedding("empty embedding result".to_string()))
    }

    fn identify(&self) -> &'static str {
        "fastembed"
    }
}

#[cfg(feature = "semantic")]
impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider").finish_non_exhaustive()
    }
}
