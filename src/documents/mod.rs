// Document loading
// Reads PDF files from the documents directory and extracts their text


use std::fs as std_fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, error, info, warn};

use crate::{RagError, Result};

/// Document type recorded for PDF sources
pub const PDF_DOCUMENT_TYPE: &str = "pdf";

/// A source file's extracted text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// File name the document was read from
    pub source: String,
    #[serde(rename = "type")]
    pub doc_type: String,
}

impl DocumentMetadata {
    #[inline]
    pub fn pdf(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            doc_type: PDF_DOCUMENT_TYPE.to_string(),
        }
    }
}

/// Extracts per-page text from raw file bytes
pub trait TextExtractor: Send + Sync {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>>;
}

/// PDF text extraction backed by `pdf-extract`
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfTextExtractor;

impl TextExtractor for PdfTextExtractor {
    #[inline]
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>> {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
            .map_err(|e| RagError::Extraction(format!("PDF extraction error: {:?}", e)))
    }
}

/// Loads every PDF in a directory as a [`Document`]
#[derive(Clone)]
pub struct DocumentLoader {
    directory: PathBuf,
    extractor: Arc<dyn TextExtractor>,
}

impl std::fmt::Debug for DocumentLoader {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentLoader")
            .field("directory", &self.directory)
            .finish_non_exhaustive()
    }
}

impl DocumentLoader {
    #[inline]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self::with_extractor(directory, PdfTextExtractor)
    }

    #[inline]
    pub fn with_extractor(
        directory: impl Into<PathBuf>,
        extractor: impl TextExtractor + 'static,
    ) -> Self {
        Self {
            directory: directory.into(),
            extractor: Arc::new(extractor),
        }
    }

    #[inline]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Load all PDF documents in the directory.
    ///
    /// Files that fail to extract, or yield no text, are logged and skipped. Only a
    /// missing or unreadable directory fails the whole load. Documents come back in
    /// directory listing order.
    #[inline]
    pub async fn load(&self) -> Result<Vec<Document>> {
        debug!("Loading documents from {}", self.directory.display());

        let mut entries = fs::read_dir(&self.directory).await.map_err(|e| {
            error!(
                "Failed to read documents directory {}: {}",
                self.directory.display(),
                e
            );
            e
        })?;

        let mut documents = Vec::new();
        let mut skipped = 0usize;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !is_pdf_path(&path) {
                continue;
            }

            match entry.file_type().await {
                Ok(file_type) if file_type.is_file() => {}
                Ok(_) => continue,
                Err(e) => {
                    warn!("Could not stat {}: {}", path.display(), e);
                    continue;
                }
            }

            match self.load_file(&path).await {
                Ok(Some(document)) => documents.push(document),
                Ok(None) => {
                    warn!("No text extracted from {}, skipping", path.display());
                    skipped += 1;
                }
                Err(e) => {
                    error!("Error reading PDF {}: {}", path.display(), e);
                    skipped += 1;
                }
            }
        }

        info!(
            "Loaded {} documents from {} ({} skipped)",
            documents.len(),
            self.directory.display(),
            skipped
        );

        Ok(documents)
    }

    async fn load_file(&self, path: &Path) -> Result<Option<Document>> {
        let bytes = fs::read(path).await?;
        let extractor = Arc::clone(&self.extractor);

        // pdf-extract can panic on malformed input; the join error keeps that per-file
        let pages = tokio::task::spawn_blocking(move || extractor.extract_pages(&bytes))
            .await
            .map_err(|e| RagError::Extraction(format!("Extraction task failed: {}", e)))??;

        let content = join_pages(&pages);
        if content.trim().is_empty() {
            return Ok(None);
        }

        let source = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        debug!(
            "Extracted {} pages ({} chars) from {}",
            pages.len(),
            content.len(),
            source
        );

        Ok(Some(Document {
            content,
            metadata: DocumentMetadata::pdf(source),
        }))
    }

    /// Sorted file names of the PDFs in the directory; empty if it does not exist
    #[inline]
    pub fn list_documents(&self) -> Result<Vec<String>> {
        if !self.directory.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in std_fs::read_dir(&self.directory)? {
            let entry = entry?;
            let path = entry.path();
            if is_pdf_path(&path) && entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();

        Ok(names)
    }
}

/// Concatenate page texts, each followed by a newline
#[inline]
pub fn join_pages<S: AsRef<str>>(pages: &[S]) -> String {
    let mut text = String::with_capacity(pages.iter().map(|p| p.as_ref().len() + 1).sum());
    for page in pages {
        text.push_str(page.as_ref());
        text.push('\n');
    }
    text
}

fn is_pdf_path(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(PDF_DOCUMENT_TYPE))
}
