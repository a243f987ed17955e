// Database module
// Persistent vector index backed by LanceDB

pub mod lancedb;

pub use self::lancedb::{NewRecord, SearchResult, VectorStore};
