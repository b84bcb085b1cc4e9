//! Question-answering agent over one repository.
//!
//! Construction indexes (or loads from cache) the repository. Each
//! [`Agent::ask`] routes the question, tries the structural tool when the
//! router picks it, and falls back to retrieval when that fails.
//!
//! ```text
//! ask ──▶ Router ──structural──▶ StructuralTool ──ok──▶ rephrase ──▶ answer
//!            │                         │ err
//!            │ semantic                ▼
//!            └──────────────────▶ RagAnswerer ──▶ (fallback note +) answer
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use review_harness_core::store::VectorIndex;
use tokio_util::sync::CancellationToken;

use crate::answer::RagAnswerer;
use crate::cache::{default_cache_dir, CacheStorage, FileCache};
use crate::cancel::cancellable;
use crate::config::Config;
use crate::error::{AnswerError, AskError, IndexError};
use crate::indexer::{IndexSettings, IndexSource, IndexStats, RepositoryIndexer};
use crate::llm::{create_client, Completer, Embedder};
use crate::progress::ProgressSink;
use crate::repo_fs::{ExcludeRules, LocalFs, RepoFs};
use crate::router::{Router, ToolChoice};
use crate::structural::{GoAstTool, StructuralTool};

/// Collaborators for [`Agent::with_parts`].
pub struct AgentParts {
    pub fs: Arc<dyn RepoFs>,
    pub embedder: Arc<dyn Embedder>,
    pub completer: Arc<dyn Completer>,
    pub structural: Arc<dyn StructuralTool>,
    pub cache: Option<Arc<dyn CacheStorage>>,
    pub rules: ExcludeRules,
    pub index: IndexSettings,
    pub top_k: usize,
    pub max_context_chars: usize,
    pub progress: Arc<dyn ProgressSink>,
}

pub struct Agent {
    root: PathBuf,
    router: Router,
    structural: Arc<dyn StructuralTool>,
    completer: Arc<dyn Completer>,
    answerer: RagAnswerer,
    chunk_count: usize,
    source: IndexSource,
    stats: IndexStats,
}

impl Agent {
    /// Build an agent for `repo` from configuration: local filesystem,
    /// configured LLM provider, on-disk cache, Go structural tool.
    pub async fn new(
        config: &Config,
        repo: &Path,
        progress: Arc<dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let client = create_client(&config.llm)?;
        let rules = ExcludeRules::new(&config.index.exclude_globs)
            .context("invalid index.exclude_globs pattern")?;

        let cache: Option<Arc<dyn CacheStorage>> = if config.cache.enabled {
            match config.cache.dir.clone().or_else(default_cache_dir) {
                Some(dir) => Some(Arc::new(FileCache::new(dir))),
                None => {
                    tracing::warn!("no cache directory available, caching disabled");
                    None
                }
            }
        } else {
            None
        };

        let parts = AgentParts {
            fs: Arc::new(LocalFs),
            embedder: client.clone(),
            completer: client,
            structural: Arc::new(GoAstTool::new(repo)),
            cache,
            rules,
            index: IndexSettings {
                window_chars: config.chunking.window_chars,
                overlap_chars: config.chunking.overlap_chars,
                embed_concurrency: config.index.embed_concurrency,
            },
            top_k: config.retrieval.top_k,
            max_context_chars: config.retrieval.max_context_chars,
            progress,
        };
        Ok(Self::with_parts(parts, repo, cancel).await?)
    }

    /// Index `root` with explicit collaborators.
    pub async fn with_parts(
        parts: AgentParts,
        root: &Path,
        cancel: &CancellationToken,
    ) -> Result<Self, IndexError> {
        let mut indexer = RepositoryIndexer::new(parts.fs, parts.embedder.clone(), parts.rules, parts.index)
            .with_progress(parts.progress);
        if let Some(cache) = parts.cache {
            indexer = indexer.with_cache(cache);
        }
        let outcome = indexer.index(root, cancel).await?;
        let chunk_count = outcome.store.len();
        let index: Arc<dyn VectorIndex> = Arc::new(outcome.store);

        Ok(Self {
            root: root.to_path_buf(),
            router: Router::new(parts.completer.clone()),
            structural: parts.structural,
            completer: parts.completer.clone(),
            answerer: RagAnswerer::new(
                parts.embedder,
                parts.completer,
                index,
                parts.top_k,
                parts.max_context_chars,
            ),
            chunk_count,
            source: outcome.source,
            stats: outcome.stats,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    pub fn index_source(&self) -> IndexSource {
        self.source
    }

    pub fn index_stats(&self) -> &IndexStats {
        &self.stats
    }

    /// Answer `question` about the repository.
    ///
    /// Fails only when retrieval fails, or when the structural tool and the
    /// retrieval fallback both fail.
    pub async fn ask(&self, question: &str, cancel: &CancellationToken) -> Result<String, AskError> {
        let (query, file_path) = match self.router.route(question, cancel).await {
            ToolChoice::Semantic => return Ok(self.answerer.answer(question, cancel).await?),
            ToolChoice::Structural { query, file_path } => (query, file_path),
        };

        tracing::info!(query = %query, file = %file_path, "running structural query");
        let structural_err = match cancellable(cancel, self.structural.execute(&query, &file_path)).await {
            Ok(Ok(result)) => return Ok(self.present(question, result, cancel).await),
            Ok(Err(e)) => e,
            Err(_) => return Err(AnswerError::Cancelled.into()),
        };

        tracing::warn!(error = %structural_err, "structural query failed, falling back to retrieval");
        match self.answerer.answer(question, cancel).await {
            Ok(answer) => Ok(format!("{}{}", fallback_note(&structural_err), answer)),
            Err(rag) => Err(AskError::BothPathsFailed {
                structural: structural_err,
                rag,
            }),
        }
    }

    /// Rephrase a raw tool result for the user. Returns the raw result if
    /// the completion call fails.
    async fn present(&self, question: &str, result: String, cancel: &CancellationToken) -> String {
        let prompt = presentation_prompt(question, &result);
        match cancellable(cancel, self.completer.complete(&prompt)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => text,
            Ok(Ok(_)) => result,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "could not rephrase structural result");
                result
            }
            Err(_) => result,
        }
    }
}

pub fn fallback_note(err: &dyn std::fmt::Display) -> String {
    format!(
        "I tried to use the structural query tool but it failed: {}. \
Answering with a general search of the codebase instead.\n\n",
        err
    )
}

fn presentation_prompt(question: &str, result: &str) -> String {
    format!(
        "You are a helpful AI assistant. A user asked a question, and an automated tool was run \
on the codebase to get a result. Present this result to the user in a clear, natural way.\n\n\
User's original question: \"{}\"\nTool result:\n{}\n\nYour response:",
        question, result
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StructuralError;

    #[test]
    fn fallback_note_names_the_failure() {
        let note = fallback_note(&StructuralError::NotFound("cmd/x.go".into()));
        assert!(note.contains("file not found: cmd/x.go"));
        assert!(note.ends_with("\n\n"));
    }

    #[test]
    fn presentation_prompt_includes_result() {
        let p = presentation_prompt("which handlers?", "- Pattern: \"/\", Handler: root");
        assert!(p.contains("\"which handlers?\""));
        assert!(p.contains("Tool result:\n- Pattern"));
    }
}
