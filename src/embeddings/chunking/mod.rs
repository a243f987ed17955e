
use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::documents::Document;

/// Configuration for content chunking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Index chunks instead of whole documents
    pub enabled: bool,
    /// Window size in characters
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            enabled: false,
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

/// A chunk of a document, ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentChunk {
    pub content: String,
    /// Index of this chunk within its document
    pub chunk_index: usize,
    /// Character range of the untrimmed window in the source text
    pub span: Range<usize>,
}

/// Split `text` into overlapping chunks that end on a sentence or line boundary
/// where possible.
///
/// Offsets are in characters. Text that fits in one window is returned as a single
/// trimmed chunk, even when that chunk is blank; blank windows of longer text are
/// dropped.
#[inline]
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();

    trimmed_windows(&chars, chunk_spans(text, chunk_size, overlap))
        .map(|(content, _)| content)
        .collect()
}

/// Character ranges covered by each chunk window, before trimming
#[inline]
pub fn chunk_spans(text: &str, chunk_size: usize, overlap: usize) -> Vec<Range<usize>> {
    let chars: Vec<char> = text.chars().collect();
    let text_length = chars.len();
    let chunk_size = chunk_size.max(1);
    let mut spans = Vec::new();
    let mut start = 0;

    while start < text_length {
        let end = (start + chunk_size).min(text_length);

        // The final window always runs to the end of the text
        let chunk_end = if end == text_length {
            end
        } else {
            match chars[start..end]
                .iter()
                .rposition(|&c| c == '.' || c == '\n')
            {
                Some(offset) if offset >= chunk_size / 2 => start + offset + 1,
                _ => end,
            }
        };

        spans.push(start..chunk_end);

        if chunk_end >= text_length {
            break;
        }

        let next_start = chunk_end.saturating_sub(overlap);
        start = if next_start > start {
            next_start
        } else {
            chunk_end
        };
    }

    spans
}

/// Chunk a document with the configured window and overlap
#[inline]
pub fn chunk_document(document: &Document, config: &ChunkingConfig) -> Vec<ContentChunk> {
    let chars: Vec<char> = document.content.chars().collect();

    let spans = chunk_spans(&document.content, config.chunk_size, config.overlap);
    let chunks: Vec<ContentChunk> = trimmed_windows(&chars, spans)
        .enumerate()
        .map(|(chunk_index, (content, span))| ContentChunk {
            content,
            chunk_index,
            span,
        })
        .collect();

    debug!(
        "Chunked '{}' into {} chunks",
        document.metadata.source,
        chunks.len()
    );

    chunks
}

/// Trimmed text of each window; blank windows are kept only when there is just one
fn trimmed_windows(
    chars: &[char],
    spans: Vec<Range<usize>>,
) -> impl Iterator<Item = (String, Range<usize>)> + '_ {
    let single = spans.len() == 1;
    spans.into_iter().filter_map(move |span| {
        let window: String = chars[span.clone()].iter().collect();
        let trimmed = window.trim();
        (single || !trimmed.is_empty()).then(|| (trimmed.to_string(), span))
    })
}

/// Estimate the number of tokens in text
#[inline]
pub fn estimate_token_count(text: &str) -> usize {
    TokenTally::of(text).tokens()
}

/// Longest prefix of `text`, ending on a word, whose estimated token count fits `budget`
#[inline]
pub fn truncate_to_token_budget(text: &str, budget: usize) -> &str {
    TokenTally::default().extend_within(text, budget)
}

/// Running word and punctuation counts behind `estimate_token_count`.
///
/// Counts add up across whitespace-separated pieces, so the tally of a text assembled
/// piece by piece estimates exactly like the assembled text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenTally {
    words: usize,
    punctuation: usize,
}

impl TokenTally {
    #[inline]
    pub fn of(text: &str) -> Self {
        Self {
            words: text.split_whitespace().count(),
            punctuation: count_punctuation(text),
        }
    }

    /// Estimated tokens for everything tallied so far
    #[inline]
    pub fn tokens(&self) -> usize {
        // Rough heuristic: 1 token ≈ 0.75 words for English text
        // Add extra tokens for punctuation and special characters
        (self.punctuation as f64).mul_add(0.1, self.words as f64 / 0.75) as usize
    }

    #[inline]
    pub fn add(&mut self, text: &str) {
        let other = Self::of(text);
        self.words += other.words;
        self.punctuation += other.punctuation;
    }

    /// Tally the longest word-aligned prefix of `text` that keeps the total within
    /// `budget`, returning that prefix
    #[inline]
    pub fn extend_within<'t>(&mut self, text: &'t str, budget: usize) -> &'t str {
        let mut next = *self;
        let mut offset = 0;
        let mut end = 0;

        for piece in text.split_inclusive(char::is_whitespace) {
            let word = piece.trim_end();
            if !word.is_empty() {
                next.words += 1;
                next.punctuation += count_punctuation(word);
                if next.tokens() > budget {
                    break;
                }
                *self = next;
                end = offset + word.len();
            }
            offset += piece.len();
        }

        &text[..end]
    }
}

fn count_punctuation(text: &str) -> usize {
    text.chars().filter(|c| c.is_ascii_punctuation()).count()
}
