#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// End-to-end pipeline tests: real PDFs and LanceDB, deterministic embedder and generator

use std::fs;
use std::sync::Mutex;

use content_engine::config::Config;
use content_engine::database::VectorStore;
use content_engine::documents::DocumentLoader;
use content_engine::embeddings::Embedder;
use content_engine::engine::{ContentEngine, NO_RELEVANT_DOCUMENTS_MESSAGE};
use content_engine::generation::{GenerationOptions, TextGenerator};
use content_engine::indexer::IndexingOutcome;
use content_engine::{RagError, Result};
use tempfile::TempDir;

const VOCABULARY: [&str; 6] = ["paris", "france", "tokyo", "japan", "capital", "river"];

struct BagOfWordsEmbedder;

impl Embedder for BagOfWordsEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let text = text.to_lowercase();
                VOCABULARY
                    .iter()
                    .map(|term| text.matches(term).count() as f32 + 0.01)
                    .collect()
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        VOCABULARY.len()
    }
}

/// Answers with the source of the first document in the prompt
#[derive(Default)]
struct SourceQuotingGenerator {
    prompts: Mutex<Vec<String>>,
}

impl TextGenerator for SourceQuotingGenerator {
    fn generate_text(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        if options.max_tokens == 0 {
            return Err(RagError::Generation("no tokens to generate".to_string()));
        }
        self.prompts
            .lock()
            .expect("lock poisoned")
            .push(prompt.to_string());

        let source = prompt
            .split("Document 1 (")
            .nth(1)
            .and_then(|rest| rest.split(')').next())
            .unwrap_or("nothing");
        Ok(format!("{prompt}According to {source}."))
    }
}

/// Minimal single-page PDF using the built-in Helvetica font
fn minimal_pdf(text: &str) -> Vec<u8> {
    let stream = format!("BT /F1 12 Tf 72 720 Td ({text}) Tj ET");
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R \
         /Resources << /Font << /F1 5 0 R >> >> >>"
            .to_string(),
        format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            stream.len(),
            stream
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];

    let mut pdf = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, object) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.push_str(&format!("{} 0 obj\n{}\nendobj\n", i + 1, object));
    }

    let xref_offset = pdf.len();
    pdf.push_str(&format!("xref\n0 {}\n", objects.len() + 1));
    pdf.push_str("0000000000 65535 f \n");
    for offset in offsets {
        pdf.push_str(&format!("{:010} 00000 n \n", offset));
    }
    pdf.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_offset
    ));

    pdf.into_bytes()
}

fn setup_corpus(temp_dir: &TempDir) -> Config {
    let config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };
    let documents = config.documents_path();
    fs::create_dir_all(&documents).expect("should create documents dir");
    fs::write(
        documents.join("france.pdf"),
        minimal_pdf("Paris is the capital of France. The Seine river flows through Paris."),
    )
    .expect("should write pdf");
    fs::write(
        documents.join("japan.pdf"),
        minimal_pdf("Tokyo is the capital of Japan."),
    )
    .expect("should write pdf");
    fs::write(documents.join("notes.txt"), "Paris Paris Paris").expect("should write notes");
    config
}

async fn open_engine(config: Config) -> ContentEngine<BagOfWordsEmbedder, SourceQuotingGenerator> {
    let vector_store = VectorStore::open(&config.vector_database_path(), BagOfWordsEmbedder.dimension())
        .await
        .expect("should open vector store");
    let loader = DocumentLoader::new(config.documents_path());

    ContentEngine::with_components(
        config,
        loader,
        BagOfWordsEmbedder,
        vector_store,
        SourceQuotingGenerator::default(),
    )
}

#[tokio::test]
async fn answers_questions_from_pdf_corpus() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let engine = open_engine(setup_corpus(&temp_dir)).await;

    let outcome = engine.ensure_indexed().await.expect("should index corpus");
    assert_eq!(outcome.records(), 2);

    let france = engine
        .process_query("What is the capital of France?", 1)
        .await;
    assert_eq!(france, "According to france.pdf.");

    let japan = engine.process_query("Tell me about Tokyo and Japan", 1).await;
    assert_eq!(japan, "According to japan.pdf.");
}

#[tokio::test]
async fn context_contains_retrieved_pdf_text() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let engine = open_engine(setup_corpus(&temp_dir)).await;
    engine.ensure_indexed().await.expect("should index corpus");

    let results = engine
        .retrieve("Which river flows through Paris?", 2)
        .await
        .expect("retrieval should succeed");

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].metadata.source, "france.pdf");
    assert_eq!(results[0].metadata.doc_type, "pdf");
    assert!(results[0].content.contains("Seine"));
    assert!(results[0].similarity() > results[1].similarity());
}

#[tokio::test]
async fn index_survives_restart() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = setup_corpus(&temp_dir);

    {
        let engine = open_engine(config.clone()).await;
        engine.ensure_indexed().await.expect("should index corpus");
    }

    let engine = open_engine(config).await;
    let outcome = engine.ensure_indexed().await.expect("should reuse index");
    assert_eq!(outcome, IndexingOutcome::AlreadyIndexed { records: 2 });

    let answer = engine
        .process_query("What is the capital of France?", 1)
        .await;
    assert_eq!(answer, "According to france.pdf.");
}

#[tokio::test]
async fn chunked_corpus_indexes_every_chunk() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = setup_corpus(&temp_dir);
    config.chunking.enabled = true;
    config.chunking.chunk_size = 100;
    config.chunking.overlap = 20;
    let engine = open_engine(config).await;

    let outcome = engine.ensure_indexed().await.expect("should index corpus");

    match outcome {
        IndexingOutcome::Indexed(stats) => {
            assert_eq!(stats.documents_loaded, 2);
            assert!(stats.records_indexed >= 2);
            assert_eq!(stats.records_indexed, stats.chunks_created);
        }
        other => panic!("expected a fresh ingestion, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_corpus_is_reported() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };
    fs::create_dir_all(config.documents_path()).expect("should create documents dir");
    let engine = open_engine(config).await;

    let result = engine.ensure_indexed().await;
    assert!(matches!(result, Err(RagError::NoDocuments(_))));

    let answer = engine.process_query("Anything?", 5).await;
    assert_eq!(answer, NO_RELEVANT_DOCUMENTS_MESSAGE);
}
