use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::fs;

use super::*;
use crate::documents::TextExtractor;
use tempfile::TempDir;

const VOCABULARY: [&str; 8] = [
    "paris", "france", "tokyo", "japan", "capital", "berlin", "germany", "city",
];

/// Treats file bytes as the extracted text of a single page
struct RawTextExtractor;

impl TextExtractor for RawTextExtractor {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>> {
        Ok(vec![String::from_utf8_lossy(bytes).into_owned()])
    }
}

/// Bag-of-words embedder over a fixed vocabulary
#[derive(Default)]
struct BagOfWordsEmbedder {
    fail: AtomicBool,
}

impl Embedder for BagOfWordsEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RagError::Embedding("model unavailable".to_string()));
        }

        Ok(texts
            .iter()
            .map(|text| {
                let words: Vec<String> = text
                    .split(|c: char| !c.is_alphanumeric())
                    .map(str::to_lowercase)
                    .collect();
                VOCABULARY
                    .iter()
                    .map(|term| words.iter().filter(|w| w == term).count() as f32 + 0.01)
                    .collect()
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        VOCABULARY.len()
    }
}

/// Answers with a fixed sentence, remembering the prompt it was given
#[derive(Default)]
struct RecordingGenerator {
    fail: bool,
    prompts: Mutex<Vec<String>>,
}

impl TextGenerator for RecordingGenerator {
    fn generate_text(&self, prompt: &str, _options: &GenerationOptions) -> Result<String> {
        self.prompts.lock().expect("lock poisoned").push(prompt.to_string());
        if self.fail {
            return Err(RagError::Generation("model crashed".to_string()));
        }
        Ok(format!("{prompt} The capital of France is Paris."))
    }
}

fn config_for(temp_dir: &TempDir) -> Config {
    Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    }
}

fn write_documents(config: &Config) {
    let documents = config.documents_path();
    fs::create_dir_all(&documents).expect("should create documents dir");
    fs::write(
        documents.join("france.pdf"),
        "Paris is the capital of France. Paris is a city.",
    )
    .expect("should write test file");
    fs::write(
        documents.join("japan.pdf"),
        "Tokyo is the capital of Japan. Tokyo is a city.",
    )
    .expect("should write test file");
}

async fn engine_with(
    config: Config,
    generator: RecordingGenerator,
) -> ContentEngine<BagOfWordsEmbedder, RecordingGenerator> {
    let embedder = BagOfWordsEmbedder::default();
    let vector_store = VectorStore::open(&config.vector_database_path(), embedder.dimension())
        .await
        .expect("should create vector store");
    let loader = DocumentLoader::with_extractor(config.documents_path(), RawTextExtractor);

    ContentEngine::with_components(config, loader, embedder, vector_store, generator)
}

#[tokio::test]
async fn answers_from_most_relevant_document() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = config_for(&temp_dir);
    write_documents(&config);
    let engine = engine_with(config, RecordingGenerator::default()).await;
    engine.ensure_indexed().await.expect("should index");

    let answer = engine
        .process_query("What is the capital of France?", 1)
        .await;

    assert_eq!(answer, "The capital of France is Paris.");
    let prompts = engine.answer_generator.backend().prompts.lock().expect("lock poisoned");
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Document 1 (france.pdf):"));
    assert!(!prompts[0].contains("japan.pdf"));
    assert!(prompts[0].contains("please answer this question: What is the capital of France?"));
}

#[tokio::test]
async fn retrieve_orders_by_relevance() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = config_for(&temp_dir);
    write_documents(&config);
    let engine = engine_with(config, RecordingGenerator::default()).await;
    engine.ensure_indexed().await.expect("should index");

    let results = engine
        .retrieve("Tell me about Tokyo", DEFAULT_TOP_K)
        .await
        .expect("retrieval should succeed");

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].metadata.source, "japan.pdf");
    assert!(results[0].distance <= results[1].distance);
}

#[tokio::test]
async fn empty_directory_reports_no_documents() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = config_for(&temp_dir);
    fs::create_dir_all(config.documents_path()).expect("should create documents dir");
    let engine = engine_with(config, RecordingGenerator::default()).await;

    let result = engine.ensure_indexed().await;

    assert!(matches!(result, Err(RagError::NoDocuments(_))));
    assert!(engine.available_documents().expect("should list").is_empty());
}

#[tokio::test]
async fn ensure_indexed_is_idempotent_across_reopen() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = config_for(&temp_dir);
    write_documents(&config);

    {
        let engine = engine_with(config.clone(), RecordingGenerator::default()).await;
        let outcome = engine.ensure_indexed().await.expect("should index");
        assert!(matches!(outcome, IndexingOutcome::Indexed(_)));
    }

    let engine = engine_with(config, RecordingGenerator::default()).await;
    let outcome = engine.ensure_indexed().await.expect("should skip");

    assert_eq!(outcome, IndexingOutcome::AlreadyIndexed { records: 2 });
}

#[tokio::test]
async fn reindex_counts_current_documents() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = config_for(&temp_dir);
    write_documents(&config);
    let engine = engine_with(config, RecordingGenerator::default()).await;
    engine.ensure_indexed().await.expect("should index");

    let stats = engine.reindex().await.expect("should reindex");

    assert_eq!(stats.records_indexed, 2);
    assert_eq!(engine.vector_store().count().await.expect("count"), 2);
}

#[tokio::test]
async fn embedding_failure_becomes_apology() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = config_for(&temp_dir);
    write_documents(&config);
    let engine = engine_with(config, RecordingGenerator::default()).await;
    engine.ensure_indexed().await.expect("should index");
    engine.embedder().fail.store(true, Ordering::SeqCst);

    let answer = engine.process_query("What is the capital of France?", 5).await;

    assert_eq!(answer, PROCESSING_ERROR_MESSAGE);
    assert!(engine.answer_generator.backend().prompts.lock().expect("lock poisoned").is_empty());
}

#[tokio::test]
async fn generation_failure_becomes_apology() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = config_for(&temp_dir);
    write_documents(&config);
    let generator = RecordingGenerator {
        fail: true,
        ..RecordingGenerator::default()
    };
    let engine = engine_with(config, generator).await;
    engine.ensure_indexed().await.expect("should index");

    let answer = engine.process_query("What is the capital of France?", 5).await;
    let error = engine
        .try_process_query("What is the capital of France?", 5)
        .await;

    assert_eq!(answer, GENERATION_ERROR_MESSAGE);
    assert!(matches!(error, Err(RagError::Generation(_))));
}

#[tokio::test]
async fn empty_index_has_no_relevant_documents() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let engine = engine_with(config_for(&temp_dir), RecordingGenerator::default()).await;

    let error = engine.try_process_query("Anything?", 5).await;
    let answer = engine.process_query("Anything?", 5).await;

    assert!(matches!(error, Err(RagError::NoRelevantDocuments)));
    assert_eq!(answer, NO_RELEVANT_DOCUMENTS_MESSAGE);
}

#[tokio::test]
async fn blank_query_asks_for_a_question() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let engine = engine_with(config_for(&temp_dir), RecordingGenerator::default()).await;

    let error = engine.try_process_query("   ", 5).await;
    let answer = engine.process_query("", 5).await;

    assert!(matches!(error, Err(RagError::InvalidQuery(_))));
    assert_eq!(answer, EMPTY_QUERY_MESSAGE);
}

#[tokio::test]
async fn lists_available_documents() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = config_for(&temp_dir);
    write_documents(&config);
    let engine = engine_with(config, RecordingGenerator::default()).await;

    let documents = engine.available_documents().expect("should list");

    assert_eq!(documents, vec!["france.pdf", "japan.pdf"]);
    assert_eq!(engine.default_top_k(), DEFAULT_TOP_K);
}

#[test]
fn each_error_kind_has_its_own_message() {
    assert_eq!(
        user_message(&RagError::Database("gone".to_string())),
        INDEX_UNAVAILABLE_MESSAGE
    );
    assert_eq!(
        user_message(&RagError::Embedding("down".to_string())),
        PROCESSING_ERROR_MESSAGE
    );
    assert_eq!(
        user_message(&RagError::Generation("down".to_string())),
        GENERATION_ERROR_MESSAGE
    );
    assert_eq!(user_message(&RagError::NoRelevantDocuments), NO_RELEVANT_DOCUMENTS_MESSAGE);
    assert_eq!(
        user_message(&RagError::InvalidQuery("empty".to_string())),
        EMPTY_QUERY_MESSAGE
    );
}
