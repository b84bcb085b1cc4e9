//! Retrieval-augmented answering.
//!
//! Embeds the question, takes the top-k most similar chunks, labels each
//! with its source path, and asks the completion model to answer from
//! that context alone.

use std::sync::Arc;

use review_harness_core::store::{ScoredChunk, VectorIndex};
use tokio_util::sync::CancellationToken;

use crate::cancel::cancellable;
use crate::error::AnswerError;
use crate::llm::{Completer, Embedder};

/// Returned when the store holds nothing to retrieve.
pub const NO_RELEVANT_INFO: &str =
    "I couldn't find any relevant information in the codebase to answer your question.";

pub struct RagAnswerer {
    embedder: Arc<dyn Embedder>,
    completer: Arc<dyn Completer>,
    index: Arc<dyn VectorIndex>,
    top_k: usize,
    max_context_chars: usize,
}

impl RagAnswerer {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        completer: Arc<dyn Completer>,
        index: Arc<dyn VectorIndex>,
        top_k: usize,
        max_context_chars: usize,
    ) -> Self {
        Self {
            embedder,
            completer,
            index,
            top_k,
            max_context_chars,
        }
    }

    pub async fn answer(
        &self,
        question: &str,
        cancel: &CancellationToken,
    ) -> Result<String, AnswerError> {
        let query = cancellable(cancel, self.embedder.embed(question))
            .await
            .map_err(|_| AnswerError::Cancelled)?
            .map_err(AnswerError::Embedding)?;

        let hits = self.index.top_k(&query, self.top_k);
        if hits.is_empty() {
            return Ok(NO_RELEVANT_INFO.to_string());
        }
        tracing::debug!(
            hits = hits.len(),
            best = hits[0].score,
            best_path = %hits[0].chunk.source_path,
            "retrieved context"
        );

        let context = build_context(&hits, self.max_context_chars);
        let prompt = grounded_prompt(&context, question);
        cancellable(cancel, self.completer.complete(&prompt))
            .await
            .map_err(|_| AnswerError::Cancelled)?
            .map_err(AnswerError::Completion)
    }
}

/// Concatenate hits, best first, each under a source-path header.
///
/// Stops adding chunks once `max_chars` would be exceeded. The first chunk
/// is always included, truncated if it alone exceeds `max_chars`.
pub fn build_context(hits: &[ScoredChunk<'_>], max_chars: usize) -> String {
    let mut context = String::new();
    let mut used = 0usize;
    for (i, hit) in hits.iter().enumerate() {
        let block = format!(
            "--- From file: {} ---\n{}\n\n",
            hit.chunk.source_path, hit.chunk.text
        );
        let len = block.chars().count();
        if used + len > max_chars {
            if i == 0 {
                context.extend(block.chars().take(max_chars));
            }
            break;
        }
        context.push_str(&block);
        used += len;
    }
    context
}

pub fn grounded_prompt(context: &str, question: &str) -> String {
    format!(
        "You are a helpful AI assistant with expertise in software engineering. Answer the \
following question using only the provided code context. Be clear and concise. If the \
context is insufficient to answer, say so explicitly.\n\n\
CONTEXT:\n{}\n\nQUESTION:\n{}\n\nANSWER:",
        context, question
    )
}
