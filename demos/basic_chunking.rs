//! Basic Text Chunking
//!
//! The minimal example: chunk a document along topic changes.
//!
//! ```bash
//! cargo run --example basic_chunking
//! RUST_LOG=tessera=debug cargo run --example basic_chunking
//! ```

use std::sync::Arc;

use tessera::{ChunkerConfig, Dispatcher, HashingEmbedder, Strategy};

#[tokio::main]
async fn main() -> tessera::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let document = "Machine learning models learn patterns from data. \
        They generalize these patterns to make predictions.

        Deep learning models stack many layers. Each layer learns \
        more abstract patterns from the data below it.

        Sourdough bread needs a lively starter. Feed the starter \
        flour and water for a week before baking.

        Bake the loaf hot and let it cool before slicing the bread.";

    // The hashing embedder stands in for a real model; see the `semantic` feature.
    let dispatcher = Dispatcher::builder()
        .config(ChunkerConfig::new(10, 60))
        .embedder(Arc::new(HashingEmbedder::default()))
        .build()?;

    let doc = dispatcher
        .chunk(document, None, Some(Strategy::ClusterSemantic))
        .await?;

    println!("Document: {} chars", document.len());
    println!(
        "Segments: {}, chunks: {}\n",
        doc.metadata.segments, doc.metadata.chunks
    );

    for (i, chunk) in doc.iter().enumerate() {
        println!("[{i}] {chunk}\n");
    }

    // Topic shifts become chunk boundaries; related paragraphs stay together.
    Ok(())
}
