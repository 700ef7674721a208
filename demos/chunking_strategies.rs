//! Chunking Strategies Comparison
//!
//! Runs the same document through every strategy and prints the trade-offs.
//!
//! ```bash
//! cargo run --example chunking_strategies
//! ```

use std::sync::Arc;

use tessera::{
    ChunkedDocument, ChunkerConfig, Dispatcher, FixedChunker, FixedMode, HashingEmbedder,
    Strategy, Tokenizer,
};

const DOCUMENT: &str = r"Machine learning models learn patterns from data. They generalize these patterns to make predictions on new, unseen examples. This is fundamentally different from traditional programming, where humans write explicit rules.

The training process involves three key steps:

1. Forward pass: Input flows through the network, producing predictions.
2. Loss computation: Predictions are compared against ground truth.
3. Backpropagation: Gradients flow backward, updating weights.

Deep learning extends this with multiple hidden layers. Each layer learns increasingly abstract representations. Early layers detect edges; later layers recognize objects.


The old lighthouse keeper climbed the stairs every evening. The lamp had to be lit before the fishing boats returned, and the wind off the sea was cold.

Dr. Geoffrey Hinton pioneered backpropagation in the 1980s. His work at the University of Toronto laid the foundation for modern AI.";

fn report(title: &str, doc: &ChunkedDocument) {
    println!("{title}");
    println!("{}", "-".repeat(title.len()));
    println!(
        "   chunks: {}, segments: {}, avg tokens: {:.1}, fallback: {}, {:?}\n",
        doc.metadata.chunks,
        doc.metadata.segments,
        doc.metadata.avg_chunk_size,
        doc.metadata.fallback,
        doc.metadata.duration,
    );
    for (i, chunk) in doc.iter().enumerate() {
        let preview: String = chunk.chars().take(70).collect();
        println!("   [{i}] \"{preview}...\"");
    }
    println!();
}

#[tokio::main]
async fn main() -> tessera::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("Text Chunking Strategies");
    println!("========================\n");

    let config = ChunkerConfig::new(20, 80);
    let dispatcher = Dispatcher::builder()
        .config(config.clone())
        .embedder(Arc::new(HashingEmbedder::default()))
        .build()?;

    println!("Document length: {} tokens\n", dispatcher.tokenizer().count_tokens(DOCUMENT));

    for strategy in Strategy::CONCRETE {
        let doc = dispatcher.chunk(DOCUMENT, None, Some(strategy)).await?;
        report(&format!("{strategy}"), &doc);
    }

    // Embedding strategies without any provider degrade to token packing.
    let bare = Dispatcher::builder().config(config).build()?;
    let doc = bare
        .chunk(DOCUMENT, None, Some(Strategy::GreedySemantic))
        .await?;
    report("greedy_semantic without a provider", &doc);

    // Raw token windows cut mid-sentence; overlap keeps boundary context.
    let windows = FixedChunker::tokens(40, 8, Arc::clone(dispatcher.tokenizer()));
    assert_eq!(windows.mode(), FixedMode::Tokens);
    report("fixed_size token windows (40 / 8)", &windows.chunk_tokens(DOCUMENT)?);

    let auto = dispatcher.chunk(DOCUMENT, None, Some(Strategy::Auto)).await?;
    println!("Auto picked {} for a short document.", auto.metadata.strategy);

    let stats = dispatcher.stats();
    println!(
        "Dispatcher: {} documents, {:.1} chunks each, cache {:?}",
        stats.total_documents,
        stats.avg_chunks_per_document(),
        dispatcher.cache_stats(),
    );

    Ok(())
}
