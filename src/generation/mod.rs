// Answer generation
// Prompt assembly over retrieved context and the text generation interface


use tracing::{debug, warn};

use crate::config::GenerationConfig;
use crate::database::lancedb::SearchResult;
use crate::embeddings::chunking::{TokenTally, estimate_token_count};
use crate::{RagError, Result};

pub const SYSTEM_CUE: &str = "<|system|>";
pub const USER_CUE: &str = "<|user|>";
/// Generation cue; the answer is whatever the model writes after it
pub const ASSISTANT_CUE: &str = "<|assistant|>";

const SYSTEM_INSTRUCTION: &str =
    "You are a helpful AI assistant that answers questions based on the provided context.";
const CONTEXT_RULE: &str = "---------------------";

/// Sampling parameters for one generation call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_prompt_tokens: u32,
}

impl GenerationOptions {
    /// Context window needed to fit the prompt plus the answer
    #[inline]
    pub fn context_window(&self) -> u32 {
        self.max_prompt_tokens.saturating_add(self.max_tokens)
    }
}

impl Default for GenerationOptions {
    #[inline]
    fn default() -> Self {
        Self::from(&GenerationConfig::default())
    }
}

impl From<&GenerationConfig> for GenerationOptions {
    #[inline]
    fn from(config: &GenerationConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_prompt_tokens: config.max_prompt_tokens,
        }
    }
}

/// A text-generation backend
pub trait TextGenerator: Send + Sync {
    /// Complete a fully formatted prompt, returning the raw model output
    fn generate_text(&self, prompt: &str, options: &GenerationOptions) -> Result<String>;
}

/// Produces grounded answers from retrieved context
#[derive(Debug, Clone)]
pub struct AnswerGenerator<G> {
    backend: G,
    options: GenerationOptions,
}

impl<G: TextGenerator> AnswerGenerator<G> {
    #[inline]
    pub fn new(backend: G, options: GenerationOptions) -> Self {
        Self { backend, options }
    }

    #[inline]
    pub fn backend(&self) -> &G {
        &self.backend
    }

    #[inline]
    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }

    /// Answer `query` from `context`. Each call is independent; nothing is remembered
    /// between calls.
    #[inline]
    pub fn generate(&self, query: &str, context: &[SearchResult]) -> Result<String> {
        let prompt = build_prompt(query, context, self.options.max_prompt_tokens as usize);
        debug!(
            "Built prompt with {} context documents (~{} tokens)",
            context.len(),
            estimate_token_count(&prompt)
        );

        let output = self.backend.generate_text(&prompt, &self.options)?;
        let answer = extract_answer(&output);

        if answer.is_empty() {
            warn!("Model returned an empty answer");
            return Err(RagError::Generation(
                "model returned an empty response".to_string(),
            ));
        }

        Ok(answer.to_string())
    }
}

/// Format the chat prompt, truncating context so the prompt stays within
/// `max_prompt_tokens` (estimated).
///
/// Contexts are kept in retrieval order; the first one that does not fit is cut at a
/// word boundary and the rest are dropped.
#[inline]
pub fn build_prompt(query: &str, context: &[SearchResult], max_prompt_tokens: usize) -> String {
    // Every piece added below sits between whitespace, so tallying the pieces
    // estimates the same as the final prompt
    let mut tally = TokenTally::of(&render_prompt(query, ""));

    let mut context_text = String::new();
    for (i, result) in context.iter().enumerate() {
        let header = format!("Document {} ({}):\n", i + 1, result.metadata.source);
        let mut candidate = tally;
        candidate.add(&header);
        if candidate.tokens() >= max_prompt_tokens {
            debug!("Prompt budget exhausted after {} documents", i);
            break;
        }

        let content = candidate.extend_within(&result.content, max_prompt_tokens);
        if content.is_empty() {
            break;
        }

        if !context_text.is_empty() {
            context_text.push_str("\n\n");
        }
        context_text.push_str(&header);
        context_text.push_str(content);
        tally = candidate;

        if content.len() < result.content.trim_end().len() {
            debug!("Truncated context document {} to fit the prompt", i + 1);
            break;
        }
    }

    render_prompt(query, &context_text)
}

fn render_prompt(query: &str, context_text: &str) -> String {
    format!(
        "{SYSTEM_CUE}{SYSTEM_INSTRUCTION}\n\n\
         {USER_CUE}Context information is below:\n\
         {CONTEXT_RULE}\n\
         {context_text}\n\
         {CONTEXT_RULE}\n\n\
         Based on the context information above, please answer this question: {query}\n\n\
         {ASSISTANT_CUE}"
    )
}

/// Text after the last generation cue, trimmed. Output without an echoed prompt is
/// returned as is (trimmed).
#[inline]
pub fn extract_answer(output: &str) -> &str {
    output
        .rsplit(ASSISTANT_CUE)
        .next()
        .unwrap_or(output)
        .trim()
}
