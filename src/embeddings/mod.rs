// Embeddings module
// Text chunking and the embedding model interface

pub mod chunking;
pub mod ollama;

pub use chunking::{ChunkingConfig, ContentChunk, chunk_document, chunk_spans, chunk_text};
pub use ollama::OllamaClient;

use crate::Result;

/// Maps text to fixed-dimension vectors.
///
/// Documents and queries go through the same call so their vectors are comparable.
pub trait Embedder: Send + Sync {
    /// One vector per input, in input order. An empty input returns an empty output.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Length of every vector returned by [`Embedder::embed`]
    fn dimension(&self) -> usize;
}
