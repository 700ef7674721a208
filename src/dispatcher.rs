//! Strategy dispatch, provider wiring, and run statistics.
//!
//! ## Flow of One Call
//!
//! ```text
//! chunk(text, embedder?, strategy?)
//!   │
//!   ├─ strategy?  or config.strategy
//!   ├─ Auto ──word count──> ClusterSemantic | GreedySemantic | FixedSize
//!   ├─ embedder?  or the dispatcher's default provider
//!   ├─ wrap provider in CachedEmbedder (when caching is on)
//!   ├─ registry: strategy -> Arc<dyn Chunker>   (built on first use)
//!   ├─ chunker.chunk(text, provider)            inside an info span
//!   └─ fill duration + cache stats, update dispatcher stats
//! ```
//!
//! ## Sharing
//!
//! A `Dispatcher` is `Send + Sync` and meant to live in an `Arc`. Concurrent
//! calls share one embedding cache; every cache access takes the cache mutex
//! for a single get or put and never holds it across an await. The registry
//! and statistics are guarded the same way.
//!
//! Statistics are observational only. They never influence chunking output.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{field, info, info_span, Instrument, Span};

use crate::{
    word_count, BpeTokenizer, CacheStats, CachedEmbedder, ChunkedDocument, Chunker, ChunkerConfig,
    ClusterChunker, EmbeddingCache, Error, FixedChunker, GreedyChunker, NarrativeChunker, Result,
    SharedEmbeddingProvider, Strategy, Tokenizer,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Running totals across every call on one dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DispatcherStats {
    /// Documents chunked, including empty ones.
    pub total_documents: usize,
    /// Chunks produced.
    pub total_chunks: usize,
    /// Wall time spent inside [`Dispatcher::chunk`].
    pub total_duration: Duration,
    /// Calls per concrete strategy.
    pub strategy_usage: BTreeMap<Strategy, usize>,
}

impl DispatcherStats {
    /// Mean chunks per document, 0 before the first call.
    #[must_use]
    pub fn avg_chunks_per_document(&self) -> f64 {
        if self.total_documents == 0 {
            return 0.0;
        }
        self.total_chunks as f64 / self.total_documents as f64
    }

    /// Mean wall time per document.
    #[must_use]
    pub fn avg_duration(&self) -> Duration {
        match u32::try_from(self.total_documents) {
            Ok(0) => Duration::ZERO,
            Ok(n) => self.total_duration / n,
            Err(_) => Duration::ZERO,
        }
    }

    fn record(&mut self, doc: &ChunkedDocument) {
        self.total_documents += 1;
        self.total_chunks += doc.len();
        self.total_duration += doc.metadata.duration;
        *self.strategy_usage.entry(doc.metadata.strategy).or_insert(0) += 1;
    }
}

/// Maps concrete strategies to chunker instances, building each on first use.
pub struct ChunkerRegistry {
    config: ChunkerConfig,
    tokenizer: Arc<dyn Tokenizer>,
    instances: Mutex<HashMap<Strategy, Arc<dyn Chunker>>>,
}

impl ChunkerRegistry {
    /// Create an empty registry. Chunkers are configured from `config`.
    #[must_use]
    pub fn new(config: ChunkerConfig, tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self {
            config,
            tokenizer,
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// The chunker for `strategy`. `None` for [`Strategy::Auto`], which has
    /// no implementation of its own.
    pub fn get(&self, strategy: Strategy) -> Option<Arc<dyn Chunker>> {
        let mut instances = lock(&self.instances);
        if let Some(chunker) = instances.get(&strategy) {
            return Some(Arc::clone(chunker));
        }
        let chunker = self.build(strategy)?;
        instances.insert(strategy, Arc::clone(&chunker));
        Some(chunker)
    }

    /// Strategies instantiated so far.
    #[must_use]
    pub fn loaded(&self) -> Vec<Strategy> {
        let mut loaded: Vec<Strategy> = lock(&self.instances).keys().copied().collect();
        loaded.sort();
        loaded
    }

    fn build(&self, strategy: Strategy) -> Option<Arc<dyn Chunker>> {
        let tokenizer = Arc::clone(&self.tokenizer);
        let chunker: Arc<dyn Chunker> = match strategy {
            Strategy::ClusterSemantic => Arc::new(ClusterChunker::new(&self.config, tokenizer)),
            Strategy::GreedySemantic => Arc::new(GreedyChunker::new(&self.config, tokenizer)),
            Strategy::FixedSize => Arc::new(FixedChunker::new(&self.config, tokenizer)),
            Strategy::Narrative => Arc::new(NarrativeChunker::from_config(&self.config, tokenizer)),
            Strategy::Auto => return None,
        };
        Some(chunker)
    }
}

impl std::fmt::Debug for ChunkerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkerRegistry")
            .field("loaded", &self.loaded())
            .finish_non_exhaustive()
    }
}

/// Entry point: picks a strategy, wires the cache around the provider, and
/// keeps statistics.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
/// use tessera::{ChunkerConfig, Dispatcher, HashingEmbedder, Strategy, WhitespaceTokenizer};
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let dispatcher = Dispatcher::builder()
///     .config(ChunkerConfig::new(10, 40))
///     .tokenizer(Arc::new(WhitespaceTokenizer::new()))
///     .embedder(Arc::new(HashingEmbedder::default()))
///     .build()
///     .unwrap();
///
/// let doc = dispatcher
///     .chunk("First topic here.\n\nSecond topic there.", None, None)
///     .await
///     .unwrap();
///
/// assert_eq!(doc.metadata.strategy, Strategy::ClusterSemantic);
/// assert_eq!(dispatcher.stats().total_documents, 1);
/// # });
/// ```
pub struct Dispatcher {
    config: ChunkerConfig,
    tokenizer: Arc<dyn Tokenizer>,
    embedder: Option<SharedEmbeddingProvider>,
    cache: Option<Arc<Mutex<EmbeddingCache>>>,
    registry: ChunkerRegistry,
    stats: Mutex<DispatcherStats>,
}

impl Dispatcher {
    /// Start building a dispatcher.
    #[must_use]
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    /// A dispatcher with `config`, a [`BpeTokenizer`] for `config.tokenizer`,
    /// and no default provider.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tokenizer`] if no tokenizer can be loaded at all.
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// The tokenizer every strategy measures with.
    #[must_use]
    pub fn tokenizer(&self) -> &Arc<dyn Tokenizer> {
        &self.tokenizer
    }

    /// The strategy registry.
    #[must_use]
    pub fn registry(&self) -> &ChunkerRegistry {
        &self.registry
    }

    /// Chunk `text`.
    ///
    /// `embedder` overrides the default provider for this call; `strategy`
    /// overrides `config.strategy`. Empty or whitespace-only text returns an
    /// empty document without touching any chunker.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tokenizer`] if a fixed-size token window cannot be
    /// decoded. Provider failures never surface here; see
    /// [`crate::embed_segments`].
    pub async fn chunk(
        &self,
        text: &str,
        embedder: Option<SharedEmbeddingProvider>,
        strategy: Option<Strategy>,
    ) -> Result<ChunkedDocument> {
        let requested = strategy.unwrap_or(self.config.strategy);
        let resolved = requested.resolve(text, &self.config.auto);
        let words = word_count(text);

        let span = info_span!(
            "chunk",
            requested = %requested,
            strategy = %resolved,
            words,
            embedder = field::Empty,
            segments = field::Empty,
            chunks = field::Empty,
            fallback = field::Empty,
            cache_hits = field::Empty,
            cache_misses = field::Empty,
            duration_ms = field::Empty,
        );

        self.run(text, embedder, resolved).instrument(span).await
    }

    async fn run(
        &self,
        text: &str,
        embedder: Option<SharedEmbeddingProvider>,
        strategy: Strategy,
    ) -> Result<ChunkedDocument> {
        let start = Instant::now();
        let span = Span::current();
        let before = self.cache_stats();

        let mut doc = if text.trim().is_empty() {
            ChunkedDocument::empty(strategy)
        } else {
            let chunker = self
                .registry
                .get(strategy)
                .ok_or_else(|| Error::Config(format!("no chunker for strategy {strategy}")))?;

            let provider = if strategy.uses_embeddings() {
                self.provider(embedder)
            } else {
                None
            };
            if let Some(provider) = &provider {
                span.record("embedder", provider.identify());
            }

            chunker.chunk(text, provider.as_deref()).await?
        };

        doc.metadata.duration = start.elapsed();
        doc.metadata.cache_stats = self.cache_stats();

        let (hits, misses) = match (&before, &doc.metadata.cache_stats) {
            (Some(b), Some(a)) => (
                a.hits.saturating_sub(b.hits),
                a.misses.saturating_sub(b.misses),
            ),
            _ => (0, 0),
        };
        span.record("segments", doc.metadata.segments);
        span.record("chunks", doc.len());
        span.record("fallback", doc.metadata.fallback);
        span.record("cache_hits", hits);
        span.record("cache_misses", misses);
        span.record(
            "duration_ms",
            u64::try_from(doc.metadata.duration.as_millis()).unwrap_or(u64::MAX),
        );
        info!(
            chunks = doc.len(),
            avg_chunk_size = doc.metadata.avg_chunk_size,
            failed_embeddings = doc.metadata.failed_embeddings,
            "document chunked"
        );

        lock(&self.stats).record(&doc);
        Ok(doc)
    }

    /// Per-call provider if given, else the default, wrapped in the cache.
    fn provider(&self, embedder: Option<SharedEmbeddingProvider>) -> Option<SharedEmbeddingProvider> {
        let inner = embedder.or_else(|| self.embedder.clone())?;
        Some(match &self.cache {
            Some(cache) => Arc::new(CachedEmbedder::new(inner, Arc::clone(cache))),
            None => inner,
        })
    }

    /// Snapshot of the running statistics.
    #[must_use]
    pub fn stats(&self) -> DispatcherStats {
        lock(&self.stats).clone()
    }

    /// Zero the running statistics.
    pub fn reset_stats(&self) {
        *lock(&self.stats) = DispatcherStats::default();
    }

    /// Embedding cache state, `None` when caching is off.
    #[must_use]
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|cache| lock(cache).stats())
    }

    /// Drop every cached embedding and reset the hit/miss counters.
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            lock(cache).clear();
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("embedder", &self.embedder.as_ref().map(|e| e.identify()))
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Dispatcher`].
#[derive(Default)]
pub struct DispatcherBuilder {
    config: ChunkerConfig,
    tokenizer: Option<Arc<dyn Tokenizer>>,
    embedder: Option<SharedEmbeddingProvider>,
}

impl DispatcherBuilder {
    /// Use `config` instead of the defaults.
    #[must_use]
    pub fn config(mut self, config: ChunkerConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `tokenizer` instead of loading `config.tokenizer`.
    #[must_use]
    pub fn tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = Some(tokenizer);
        self
    }

    /// Default provider for calls that do not pass one.
    #[must_use]
    pub fn embedder(mut self, embedder: SharedEmbeddingProvider) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Build the dispatcher.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tokenizer`] if no tokenizer was given and neither
    /// `config.tokenizer` nor the default encoding can be loaded.
    pub fn build(self) -> Result<Dispatcher> {
        let tokenizer = match self.tokenizer {
            Some(tokenizer) => tokenizer,
            None => Arc::new(BpeTokenizer::new(&self.config.tokenizer)?),
        };
        let cache = self
            .config
            .enable_cache
            .then(|| Arc::new(Mutex::new(EmbeddingCache::new(self.config.cache_size))));

        Ok(Dispatcher {
            registry: ChunkerRegistry::new(self.config.clone(), Arc::clone(&tokenizer)),
            config: self.config,
            tokenizer,
            embedder: self.embedder,
            cache,
            stats: Mutex::new(DispatcherStats::default()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FnEmbedder, HashingEmbedder, WhitespaceTokenizer};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn dispatcher(config: ChunkerConfig) -> Dispatcher {
        Dispatcher::builder()
            .config(config)
            .tokenizer(Arc::new(WhitespaceTokenizer::new()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_registry_builds_once() {
        let registry = ChunkerRegistry::new(
            ChunkerConfig::default(),
            Arc::new(WhitespaceTokenizer::new()),
        );
        assert!(registry.loaded().is_empty());

        let a = registry.get(Strategy::Narrative).unwrap();
        let b = registry.get(Strategy::Narrative).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.strategy(), Strategy::Narrative);
        assert!(registry.get(Strategy::Auto).is_none());
        assert_eq!(registry.loaded(), [Strategy::Narrative]);
    }

    #[tokio::test]
    async fn test_explicit_strategy_overrides_config() {
        let d = dispatcher(ChunkerConfig::new(5, 20).with_strategy(Strategy::Narrative));
        let doc = d.chunk("one two three", None, Some(Strategy::FixedSize)).await.unwrap();
        assert_eq!(doc.metadata.strategy, Strategy::FixedSize);

        let doc = d.chunk("one two three", None, None).await.unwrap();
        assert_eq!(doc.metadata.strategy, Strategy::Narrative);
    }

    #[tokio::test]
    async fn test_per_call_embedder_overrides_default() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let counting: SharedEmbeddingProvider = Arc::new(FnEmbedder::new(move |_: &str| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(vec![1.0, 0.0])
        }));

        let d = Dispatcher::builder()
            .config(ChunkerConfig::new(2, 8).without_cache())
            .tokenizer(Arc::new(WhitespaceTokenizer::new()))
            .embedder(Arc::new(HashingEmbedder::default()))
            .build()
            .unwrap();

        let text = "a b.\n\nc d.\n\ne f.";
        let doc = d
            .chunk(text, Some(counting), Some(Strategy::ClusterSemantic))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(!doc.metadata.fallback);
        assert!(doc.metadata.cache_stats.is_none());
    }

    #[tokio::test]
    async fn test_no_provider_anywhere_falls_back() {
        let d = dispatcher(ChunkerConfig::new(2, 8));
        let doc = d
            .chunk("a b.\n\nc d.", None, Some(Strategy::GreedySemantic))
            .await
            .unwrap();
        assert!(doc.metadata.fallback);
        assert_eq!(doc.chunks, ["a b. c d."]);
    }

    #[tokio::test]
    async fn test_stats_accumulate_and_reset() {
        let d = dispatcher(ChunkerConfig::new(2, 4));
        d.chunk("a b.\n\nc d.\n\ne f.", None, Some(Strategy::FixedSize))
            .await
            .unwrap();
        d.chunk("x y.", None, Some(Strategy::Narrative)).await.unwrap();
        d.chunk("", None, Some(Strategy::Narrative)).await.unwrap();

        let stats = d.stats();
        assert_eq!(stats.total_documents, 3);
        assert_eq!(stats.total_chunks, 3);
        assert_eq!(stats.strategy_usage[&Strategy::FixedSize], 1);
        assert_eq!(stats.strategy_usage[&Strategy::Narrative], 2);
        assert!((stats.avg_chunks_per_document() - 1.0).abs() < 1e-12);

        d.reset_stats();
        assert_eq!(d.stats(), DispatcherStats::default());
    }

    #[tokio::test]
    async fn test_cache_reported_and_cleared() {
        let d = Dispatcher::builder()
            .config(ChunkerConfig::new(2, 8))
            .tokenizer(Arc::new(WhitespaceTokenizer::new()))
            .embedder(Arc::new(HashingEmbedder::default()))
            .build()
            .unwrap();
        let text = "a b.\n\nc d.\n\ne f.";

        let first = d.chunk(text, None, Some(Strategy::ClusterSemantic)).await.unwrap();
        let stats = first.metadata.cache_stats.unwrap();
        assert_eq!((stats.hits, stats.misses, stats.size), (0, 3, 3));

        let second = d.chunk(text, None, Some(Strategy::ClusterSemantic)).await.unwrap();
        assert_eq!(second.metadata.cache_stats.unwrap().hits, 3);
        assert_eq!(first.chunks, second.chunks);

        d.clear_cache();
        let cleared = d.cache_stats().unwrap();
        assert_eq!((cleared.size, cleared.hits, cleared.misses), (0, 0, 0));
    }

    #[tokio::test]
    async fn test_auto_resolved_before_dispatch() {
        let mut config = ChunkerConfig::new(5, 20);
        config.auto.small_doc_words = 3;
        let d = dispatcher(config);

        let doc = d.chunk("one two", None, None).await.unwrap();
        assert_eq!(doc.metadata.strategy, Strategy::ClusterSemantic);
        let doc = d.chunk("one two three", None, Some(Strategy::Auto)).await.unwrap();
        assert_eq!(doc.metadata.strategy, Strategy::GreedySemantic);
        assert!(!d.registry().loaded().contains(&Strategy::Auto));
    }

    #[test]
    fn test_default_tokenizer_loads() {
        let d = Dispatcher::new(ChunkerConfig::default()).unwrap();
        assert!(d.tokenizer().count_tokens("hello world") >= 2);
    }
}
