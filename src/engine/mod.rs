// Query engine
// Wires the loader, embedder, vector index and answer generator together

#[cfg(test)]
mod tests;

use tracing::{debug, error, info};

use crate::config::Config;
use crate::database::lancedb::{SearchResult, VectorStore};
use crate::documents::DocumentLoader;
use crate::embeddings::{Embedder, OllamaClient};
use crate::generation::{AnswerGenerator, GenerationOptions, TextGenerator};
use crate::indexer::{Indexer, IndexingOutcome, IndexingStats};
use crate::{RagError, Result};

pub const DEFAULT_TOP_K: usize = 5;

pub const EMPTY_QUERY_MESSAGE: &str = "Please ask a question about your documents.";
pub const NO_RELEVANT_DOCUMENTS_MESSAGE: &str =
    "I couldn't find any relevant documents to answer your question.";
pub const PROCESSING_ERROR_MESSAGE: &str =
    "I apologize, but I encountered an error while processing your query.";
pub const INDEX_UNAVAILABLE_MESSAGE: &str =
    "I apologize, but the document index is currently unavailable.";
pub const GENERATION_ERROR_MESSAGE: &str =
    "I apologize, but I encountered an error while generating the response.";

/// Retrieval-augmented question answering over a directory of PDFs
#[derive(Debug)]
pub struct ContentEngine<E, G> {
    config: Config,
    loader: DocumentLoader,
    embedder: E,
    vector_store: VectorStore,
    answer_generator: AnswerGenerator<G>,
}

impl ContentEngine<OllamaClient, OllamaClient> {
    /// Build an engine that uses Ollama for both embeddings and generation
    #[inline]
    pub async fn open(config: Config) -> Result<Self> {
        let client = OllamaClient::new(&config)?;
        let vector_store =
            VectorStore::open(&config.vector_database_path(), client.dimension()).await?;
        let loader = DocumentLoader::new(config.documents_path());

        info!(
            "Content engine ready (embedding model {}, generation model {})",
            client.embedding_model(),
            client.generation_model()
        );

        Ok(Self::with_components(
            config,
            loader,
            client.clone(),
            vector_store,
            client,
        ))
    }
}

impl<E: Embedder, G: TextGenerator> ContentEngine<E, G> {
    #[inline]
    pub fn with_components(
        config: Config,
        loader: DocumentLoader,
        embedder: E,
        vector_store: VectorStore,
        generator: G,
    ) -> Self {
        let options = GenerationOptions::from(&config.generation);
        Self {
            config,
            loader,
            embedder,
            vector_store,
            answer_generator: AnswerGenerator::new(generator, options),
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    #[inline]
    pub fn vector_store(&self) -> &VectorStore {
        &self.vector_store
    }

    /// `retrieval.top_k` from the configuration
    #[inline]
    pub fn default_top_k(&self) -> usize {
        self.config.retrieval.top_k
    }

    /// Sorted names of the PDFs in the documents directory
    #[inline]
    pub fn available_documents(&self) -> Result<Vec<String>> {
        self.loader.list_documents()
    }

    fn indexer(&self) -> Indexer<'_, E> {
        Indexer::new(
            &self.loader,
            &self.embedder,
            &self.vector_store,
            &self.config.chunking,
        )
    }

    /// Index the documents directory unless the index already holds records
    #[inline]
    pub async fn ensure_indexed(&self) -> Result<IndexingOutcome> {
        self.indexer().ensure_indexed().await
    }

    /// Rebuild the index from the documents directory
    #[inline]
    pub async fn reindex(&self) -> Result<IndexingStats> {
        self.indexer().reindex().await
    }

    /// The `top_k` records closest to `query`
    #[inline]
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        let vector = self
            .embedder
            .embed(&[query.to_string()])?
            .into_iter()
            .next()
            .ok_or(RagError::EmbeddingCountMismatch {
                expected: 1,
                actual: 0,
            })?;

        self.vector_store.search(&vector, top_k).await
    }

    /// Answer `query` from the `top_k` most relevant documents
    #[inline]
    pub async fn try_process_query(&self, query: &str, top_k: usize) -> Result<String> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RagError::InvalidQuery("query is empty".to_string()));
        }

        let context = self.retrieve(query, top_k).await?;
        if context.is_empty() {
            return Err(RagError::NoRelevantDocuments);
        }
        debug!(
            "Retrieved {} documents, closest {} (distance {:.4})",
            context.len(),
            context[0].metadata.source,
            context[0].distance
        );

        self.answer_generator.generate(query, &context)
    }

    /// Like [`ContentEngine::try_process_query`], but failures become a message
    /// for the user instead of an error
    #[inline]
    pub async fn process_query(&self, query: &str, top_k: usize) -> String {
        match self.try_process_query(query, top_k).await {
            Ok(answer) => answer,
            Err(e) => {
                error!("Error processing query: {}", e);
                user_message(&e).to_string()
            }
        }
    }
}

/// The message shown to the user when a query fails with `error`
#[inline]
pub fn user_message(error: &RagError) -> &'static str {
    match error {
        RagError::InvalidQuery(_) => EMPTY_QUERY_MESSAGE,
        RagError::NoRelevantDocuments => NO_RELEVANT_DOCUMENTS_MESSAGE,
        RagError::Database(_) => INDEX_UNAVAILABLE_MESSAGE,
        RagError::Generation(_) => GENERATION_ERROR_MESSAGE,
        _ => PROCESSING_ERROR_MESSAGE,
    }
}
