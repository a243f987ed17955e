// Indexer module
// Turns the documents directory into records in the vector index


use tracing::{debug, info, warn};

use crate::database::lancedb::{NewRecord, VectorStore};
use crate::documents::{Document, DocumentLoader, DocumentMetadata};
use crate::embeddings::Embedder;
use crate::embeddings::chunking::{ChunkingConfig, chunk_document};
use crate::{RagError, Result};

/// Statistics about one ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexingStats {
    pub documents_loaded: usize,
    /// Chunks produced when chunked ingestion is enabled, 0 otherwise
    pub chunks_created: usize,
    pub records_indexed: usize,
}

/// What `ensure_indexed` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexingOutcome {
    /// The index already held records; nothing was loaded
    AlreadyIndexed { records: usize },
    Indexed(IndexingStats),
}

impl IndexingOutcome {
    /// Records in the index after the run
    #[inline]
    pub fn records(&self) -> usize {
        match self {
            Self::AlreadyIndexed { records } => *records,
            Self::Indexed(stats) => stats.records_indexed,
        }
    }
}

/// Loads, embeds and stores documents
#[derive(Debug)]
pub struct Indexer<'a, E> {
    loader: &'a DocumentLoader,
    embedder: &'a E,
    vector_store: &'a VectorStore,
    chunking: &'a ChunkingConfig,
}

/// Text waiting to be embedded, with where it came from
struct PendingRecord {
    content: String,
    metadata: DocumentMetadata,
    chunk_index: Option<u32>,
}

/// Embedded records ready to be written
struct PreparedBatch {
    documents_loaded: usize,
    chunks_created: usize,
    records: Vec<NewRecord>,
}

impl<'a, E: Embedder> Indexer<'a, E> {
    #[inline]
    pub fn new(
        loader: &'a DocumentLoader,
        embedder: &'a E,
        vector_store: &'a VectorStore,
        chunking: &'a ChunkingConfig,
    ) -> Self {
        Self {
            loader,
            embedder,
            vector_store,
            chunking,
        }
    }

    /// Ingest the documents directory unless the index already holds records
    #[inline]
    pub async fn ensure_indexed(&self) -> Result<IndexingOutcome> {
        let records = self.vector_store.count().await?;
        if records > 0 {
            info!("Vector index already holds {} records, skipping ingestion", records);
            return Ok(IndexingOutcome::AlreadyIndexed { records });
        }

        self.ingest().await.map(IndexingOutcome::Indexed)
    }

    /// Rebuild the index from the documents directory. The existing records are only
    /// cleared once the new ones are embedded, so a failed rebuild leaves them in place.
    #[inline]
    pub async fn reindex(&self) -> Result<IndexingStats> {
        let prepared = self.prepare().await?;
        self.vector_store.clear().await?;
        self.commit(prepared).await
    }

    async fn ingest(&self) -> Result<IndexingStats> {
        let prepared = self.prepare().await?;
        self.commit(prepared).await
    }

    /// Load, build and embed records without touching the index
    async fn prepare(&self) -> Result<PreparedBatch> {
        let documents = self.loader.load().await?;
        if documents.is_empty() {
            warn!(
                "No documents to index in {}",
                self.loader.directory().display()
            );
            return Err(RagError::NoDocuments(
                self.loader.directory().display().to_string(),
            ));
        }
        info!("Loaded {} documents", documents.len());

        let pending = self.build_records(&documents);
        let chunks_created = if self.chunking.enabled {
            pending.len()
        } else {
            0
        };

        let texts: Vec<String> = pending.iter().map(|p| p.content.clone()).collect();
        debug!("Embedding {} texts", texts.len());
        let vectors = self.embedder.embed(&texts)?;
        if vectors.len() != pending.len() {
            return Err(RagError::EmbeddingCountMismatch {
                expected: pending.len(),
                actual: vectors.len(),
            });
        }

        let records = pending
            .into_iter()
            .zip(vectors)
            .map(|(p, vector)| NewRecord {
                content: p.content,
                metadata: p.metadata,
                chunk_index: p.chunk_index,
                vector,
            })
            .collect();

        Ok(PreparedBatch {
            documents_loaded: documents.len(),
            chunks_created,
            records,
        })
    }

    async fn commit(&self, prepared: PreparedBatch) -> Result<IndexingStats> {
        let records_indexed = self.vector_store.upsert(prepared.records).await?;
        info!(
            "Indexed {} records from {} documents",
            records_indexed, prepared.documents_loaded
        );

        Ok(IndexingStats {
            documents_loaded: prepared.documents_loaded,
            chunks_created: prepared.chunks_created,
            records_indexed,
        })
    }

    /// One record per document, or one per chunk when chunking is enabled
    fn build_records(&self, documents: &[Document]) -> Vec<PendingRecord> {
        if !self.chunking.enabled {
            return documents
                .iter()
                .map(|document| PendingRecord {
                    content: document.content.clone(),
                    metadata: document.metadata.clone(),
                    chunk_index: None,
                })
                .collect();
        }

        documents
            .iter()
            .flat_map(|document| {
                chunk_document(document, self.chunking)
                    .into_iter()
                    .map(|chunk| PendingRecord {
                        content: chunk.content,
                        metadata: document.metadata.clone(),
                        chunk_index: u32::try_from(chunk.chunk_index).ok(),
                    })
            })
            .collect()
    }
}
