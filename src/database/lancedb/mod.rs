// LanceDB vector database module
// Handles vector storage and similarity search for embedded documents


pub mod vector_store;

pub use vector_store::VectorStore;

use serde::{Deserialize, Serialize};

use crate::documents::DocumentMetadata;

/// A record waiting to be written to the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRecord {
    /// Text that was embedded, returned verbatim on retrieval
    pub content: String,
    pub metadata: DocumentMetadata,
    /// Position within the parent document when the content is a chunk
    pub chunk_index: Option<u32>,
    pub vector: Vec<f32>,
}

/// A record returned by similarity search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub content: String,
    pub metadata: DocumentMetadata,
    pub chunk_index: Option<u32>,
    /// Cosine distance to the query (0 is identical direction)
    pub distance: f32,
}

impl SearchResult {
    /// Cosine similarity, higher is closer
    #[inline]
    pub fn similarity(&self) -> f32 {
        1.0 - self.distance
    }
}
