use anyhow::{Context, Result, bail};
use console::style;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::RagError;
use crate::config::Config;
use crate::database::lancedb::VectorStore;
use crate::documents::DocumentLoader;
use crate::embeddings::{Embedder, OllamaClient};
use crate::engine::ContentEngine;
use crate::generation::TextGenerator;
use crate::indexer::IndexingOutcome;

const EXIT_COMMANDS: [&str; 2] = ["exit", "quit"];

/// Create the data directories and write a default configuration if none exists
#[inline]
pub fn setup(data_dir: &Path) -> Result<()> {
    let config = Config::load(data_dir).context("Failed to load configuration")?;

    for dir in [config.documents_path(), config.vector_database_path()] {
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        println!("📁 {}", dir.display());
    }

    let config_path = config.config_file_path();
    if config_path.exists() {
        println!("⚙️  Keeping existing configuration: {}", config_path.display());
    } else {
        config.save().context("Failed to save default configuration")?;
        println!("⚙️  Wrote default configuration: {}", config_path.display());
    }

    println!();
    println!("💡 Next Steps:");
    println!(
        "   • Copy PDF files into {}",
        style(config.documents_path().display()).cyan()
    );
    println!(
        "   • Pull the models: ollama pull {} && ollama pull {}",
        config.ollama.model, config.generation.model
    );
    println!("   • Run 'content-engine ingest' to build the index");

    Ok(())
}

/// Index the documents directory; `force` rebuilds an existing index
#[inline]
pub async fn ingest(data_dir: &Path, force: bool) -> Result<()> {
    let config = Config::load(data_dir).context("Failed to load configuration")?;
    let engine = ContentEngine::open(config)
        .await
        .context("Failed to initialize content engine")?;

    let bar = spinner("Indexing documents...");
    let result = if force {
        engine.reindex().await.map(IndexingOutcome::Indexed)
    } else {
        engine.ensure_indexed().await
    };
    bar.finish_and_clear();

    match result {
        Ok(IndexingOutcome::AlreadyIndexed { records }) => {
            println!(
                "✅ Index already holds {} records. Use --force to rebuild it.",
                records
            );
        }
        Ok(IndexingOutcome::Indexed(stats)) => {
            println!("✅ Indexing complete!");
            println!("   📄 Documents loaded: {}", stats.documents_loaded);
            if stats.chunks_created > 0 {
                println!("   ✂️  Chunks created: {}", stats.chunks_created);
            }
            println!("   🔢 Records indexed: {}", stats.records_indexed);
        }
        Err(RagError::NoDocuments(dir)) => {
            bail!(
                "No PDF files found! Please add PDF files to the {} directory.",
                dir
            );
        }
        Err(e) => return Err(e).context("Indexing failed"),
    }

    Ok(())
}

/// Print the PDFs available in the documents directory
#[inline]
pub fn list_documents(data_dir: &Path) -> Result<()> {
    let config = Config::load(data_dir).context("Failed to load configuration")?;
    let documents_dir = config.documents_path();
    let documents = DocumentLoader::new(&documents_dir)
        .list_documents()
        .context("Failed to list documents")?;

    if documents.is_empty() {
        println!("No PDF files found in {}.", documents_dir.display());
        println!("Add PDF files there, then run 'content-engine ingest'.");
        return Ok(());
    }

    print_document_listing(&documents);
    Ok(())
}

/// Answer a single question and print the answer
#[inline]
pub async fn ask(data_dir: &Path, question: &str, top_k: Option<usize>) -> Result<()> {
    let engine = open_indexed_engine(data_dir).await?;
    let top_k = top_k.unwrap_or_else(|| engine.default_top_k());

    let bar = spinner("Thinking...");
    let answer = engine.process_query(question, top_k).await;
    bar.finish_and_clear();

    println!("{}", answer);
    Ok(())
}

/// Interactive question loop; `exit` or `quit` leaves it
#[inline]
pub async fn chat(data_dir: &Path, top_k: Option<usize>) -> Result<()> {
    let engine = open_indexed_engine(data_dir).await?;
    let top_k = top_k.unwrap_or_else(|| engine.default_top_k());

    println!("{}", style("📚 Content Engine - Document Analysis").bold().cyan());
    print_document_listing(&engine.available_documents()?);
    println!();
    println!("Ask a question about the documents. Type 'exit' to leave.");

    loop {
        let question: String = Input::new()
            .with_prompt(style("You").bold().to_string())
            .allow_empty(true)
            .interact_text()
            .context("Failed to read question")?;
        let question = question.trim();

        if question.is_empty() {
            continue;
        }
        if EXIT_COMMANDS
            .iter()
            .any(|command| question.eq_ignore_ascii_case(command))
        {
            break;
        }

        let bar = spinner("Thinking...");
        let answer = engine.process_query(question, top_k).await;
        bar.finish_and_clear();

        println!("{} {}", style("Assistant:").bold().green(), answer);
        println!();
    }

    Ok(())
}

/// Show Ollama health, index size and available documents
#[inline]
pub async fn show_status(data_dir: &Path) -> Result<()> {
    let config = Config::load(data_dir).context("Failed to load configuration")?;

    println!("📊 Content Engine Status");
    println!("   📁 Data directory: {}", config.get_base_dir().display());
    println!();

    println!("🤖 Ollama Status:");
    let client = OllamaClient::new(&config)?;
    match client.health_check() {
        Ok(()) => {
            println!(
                "   ✅ Ollama: Connected ({}:{})",
                config.ollama.host, config.ollama.port
            );
        }
        Err(e) => {
            println!("   ⚠️  Ollama: Unavailable or missing models - {:#}", e);
        }
    }
    println!(
        "   📋 Embedding model: {} ({} dimensions)",
        client.embedding_model(),
        client.dimension()
    );
    println!("   💬 Generation model: {}", client.generation_model());
    println!("   🖥️  Device: {}", config.generation.device);

    println!();
    println!("🔍 Vector Index Status:");
    let vectors_path = config.vector_database_path();
    if vectors_path.exists() {
        match VectorStore::open(&vectors_path, client.dimension()).await {
            Ok(store) => {
                if store.validate_integrity().await? {
                    println!("   ✅ LanceDB: {} records", store.count().await?);
                } else {
                    println!("   ⚠️  LanceDB: integrity check failed, run 'ingest --force'");
                }
            }
            Err(e) => {
                println!("   ❌ LanceDB: Failed to open - {}", e);
            }
        }
    } else {
        println!("   📭 Not created yet");
    }

    println!();
    println!("📚 Documents:");
    let documents = DocumentLoader::new(config.documents_path()).list_documents()?;
    if documents.is_empty() {
        println!("   📭 No PDF files in {}", config.documents_path().display());
    } else {
        for name in &documents {
            println!("   📄 {}", name);
        }
    }

    println!();
    println!("💡 Next Steps:");
    println!("   • Use 'content-engine ingest' to (re)build the index");
    println!("   • Use 'content-engine chat' to ask questions");

    Ok(())
}

/// Open the Ollama-backed engine, refusing to start without PDFs, and make sure
/// the index is populated
async fn open_indexed_engine(data_dir: &Path) -> Result<ContentEngine<OllamaClient, OllamaClient>> {
    let config = Config::load(data_dir).context("Failed to load configuration")?;
    let documents_dir = config.documents_path();

    let documents = DocumentLoader::new(&documents_dir).list_documents()?;
    if documents.is_empty() {
        bail!(
            "No PDF files found! Please add PDF files to the {} directory.",
            documents_dir.display()
        );
    }
    debug!("Found {} PDF files", documents.len());

    let engine = ContentEngine::open(config)
        .await
        .context("Failed to initialize content engine")?;
    ensure_indexed_with_progress(&engine).await?;

    Ok(engine)
}

async fn ensure_indexed_with_progress<E: Embedder, G: TextGenerator>(
    engine: &ContentEngine<E, G>,
) -> Result<()> {
    let bar = spinner("Indexing documents...");
    let outcome = engine.ensure_indexed().await;
    bar.finish_and_clear();

    match outcome.context("Failed to index documents")? {
        IndexingOutcome::AlreadyIndexed { records } => {
            debug!("Using existing index with {} records", records);
        }
        IndexingOutcome::Indexed(stats) => {
            info!(
                "Indexed {} records from {} documents",
                stats.records_indexed, stats.documents_loaded
            );
        }
    }

    Ok(())
}

fn print_document_listing(documents: &[String]) {
    println!("Available documents ({}):", documents.len());
    for name in documents {
        println!("   📄 {}", name);
    }
}

fn spinner(message: &'static str) -> ProgressBar {
    if !console::user_attended_stderr() {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new_spinner()
        .with_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        )
        .with_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}
