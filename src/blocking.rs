//! Synchronous entry point.
//!
//! [`Dispatcher::chunk`] is async. Synchronous callers go through
//! [`BlockingDispatcher`], which owns exactly one worker thread running a
//! current-thread tokio runtime:
//!
//! ```text
//! caller thread                     worker thread (current-thread runtime)
//! ─────────────                     ───────────────────────────────────────
//! chunk(text) ──Job──mpsc──────────> recv job
//!     │                               spawn task: dispatcher.chunk(..).await
//!     │ blocking_recv                      │
//!     ◀────────────oneshot reply───────────┘
//! ```
//!
//! Jobs from different caller threads run as separate tasks on the worker,
//! so a slow provider call for one document does not hold up another.
//! Nothing here ever starts a runtime on the caller's thread.

use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::{ChunkedDocument, Dispatcher, Error, Result, SharedEmbeddingProvider, Strategy};

struct Job {
    text: String,
    embedder: Option<SharedEmbeddingProvider>,
    strategy: Option<Strategy>,
    reply: oneshot::Sender<Result<ChunkedDocument>>,
}

/// Blocking wrapper around a shared [`Dispatcher`].
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
/// use tessera::{BlockingDispatcher, ChunkerConfig, Dispatcher, Strategy, WhitespaceTokenizer};
///
/// let dispatcher = Dispatcher::builder()
///     .config(ChunkerConfig::new(4, 16))
///     .tokenizer(Arc::new(WhitespaceTokenizer::new()))
///     .build()
///     .unwrap();
/// let blocking = BlockingDispatcher::new(Arc::new(dispatcher)).unwrap();
///
/// let doc = blocking
///     .chunk("No runtime needed here.", None, Some(Strategy::FixedSize))
///     .unwrap();
/// assert_eq!(doc.chunks, ["No runtime needed here."]);
/// ```
pub struct BlockingDispatcher {
    dispatcher: Arc<Dispatcher>,
    sender: Option<mpsc::UnboundedSender<Job>>,
    worker: Option<JoinHandle<()>>,
}

impl BlockingDispatcher {
    /// Start the worker thread.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the runtime or the thread cannot be created.
    pub fn new(dispatcher: Arc<Dispatcher>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread().build()?;
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        let shared = Arc::clone(&dispatcher);

        let worker = std::thread::Builder::new()
            .name("tessera-chunker".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    while let Some(job) = receiver.recv().await {
                        let dispatcher = Arc::clone(&shared);
                        tokio::spawn(async move {
                            let result = dispatcher
                                .chunk(&job.text, job.embedder, job.strategy)
                                .await;
                            // The caller may have given up; nothing to do then.
                            let _ = job.reply.send(result);
                        });
                    }
                    debug!("chunking worker shutting down");
                });
            })?;

        Ok(Self {
            dispatcher,
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    /// Chunk `text`, blocking the calling thread until the worker replies.
    ///
    /// Arguments mean the same as for [`Dispatcher::chunk`].
    ///
    /// # Errors
    ///
    /// Returns whatever [`Dispatcher::chunk`] returns, or
    /// [`Error::WorkerUnavailable`] if the worker has stopped.
    ///
    /// # Panics
    ///
    /// Panics if called from inside an async runtime. Async code should call
    /// [`Dispatcher::chunk`] directly.
    pub fn chunk(
        &self,
        text: &str,
        embedder: Option<SharedEmbeddingProvider>,
        strategy: Option<Strategy>,
    ) -> Result<ChunkedDocument> {
        let sender = self.sender.as_ref().ok_or(Error::WorkerUnavailable)?;
        let (reply, response) = oneshot::channel();
        sender
            .send(Job {
                text: text.to_string(),
                embedder,
                strategy,
                reply,
            })
            .map_err(|_| Error::WorkerUnavailable)?;

        response.blocking_recv().map_err(|_| Error::WorkerUnavailable)?
    }

    /// The wrapped dispatcher, for stats and cache control.
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }
}

impl Drop for BlockingDispatcher {
    fn drop(&mut self) {
        // Closing the channel ends the worker's receive loop.
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("chunking worker panicked");
            }
        }
    }
}

impl std::fmt::Debug for BlockingDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingDispatcher")
            .field("dispatcher", &self.dispatcher)
            .field("running", &self.sender.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChunkerConfig, HashingEmbedder, WhitespaceTokenizer};

    fn blocking() -> BlockingDispatcher {
        let dispatcher = Dispatcher::builder()
            .config(ChunkerConfig::new(2, 8))
            .tokenizer(Arc::new(WhitespaceTokenizer::new()))
            .embedder(Arc::new(HashingEmbedder::default()))
            .build()
            .unwrap();
        BlockingDispatcher::new(Arc::new(dispatcher)).unwrap()
    }

    #[test]
    fn test_chunks_without_a_runtime() {
        let b = blocking();
        let doc = b
            .chunk("a b.\n\nc d.", None, Some(Strategy::ClusterSemantic))
            .unwrap();
        assert_eq!(doc.metadata.segments, 2);
        assert!(!doc.metadata.fallback);
        assert_eq!(b.dispatcher().stats().total_documents, 1);
    }

    #[test]
    fn test_many_caller_threads() {
        let b = Arc::new(blocking());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let b = Arc::clone(&b);
                std::thread::spawn(move || {
                    let text = format!("thread {i} says hi.\n\nand bye.");
                    b.chunk(&text, None, Some(Strategy::GreedySemantic)).unwrap()
                })
            })
            .collect();

        for handle in handles {
            let doc = handle.join().unwrap();
            assert_eq!(doc.metadata.segments, 2);
        }
        assert_eq!(b.dispatcher().stats().total_documents, 4);
    }

    #[test]
    fn test_drop_joins_worker() {
        let b = blocking();
        b.chunk("", None, None).unwrap();
        drop(b);
    }
}
