//! Repository indexer.
//!
//! Walks a repository, splits every text file into overlapping windows,
//! embeds each window, and collects the results in a [`ChunkStore`]. The
//! store is cached per repository and reused while the repository
//! fingerprint is unchanged.
//!
//! # Pipeline
//!
//! ```text
//! fingerprint ──▶ cache hit? ──yes──▶ return cached store
//!                     │ no
//!                     ▼
//!        walk ─▶ exclude ─▶ read ─▶ split ─▶ embed (bounded, ordered)
//!                                                  │
//!                                                  ▼
//!                                      ChunkStore ─▶ save cache
//! ```
//!
//! Only a fingerprint failure is fatal. Unreadable files, non-text files,
//! and failed embeddings are logged and skipped. A cancelled pass returns
//! the chunks gathered so far and leaves the cache untouched, as does a
//! pass that could not enumerate the repository or embedded nothing
//! despite having windows to embed.

use std::path::Path;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use review_harness_core::chunk::split_windows;
use review_harness_core::models::Chunk;
use review_harness_core::store::memory::ChunkStore;
use review_harness_core::store::VectorIndex;
use tokio_util::sync::CancellationToken;

use crate::cache::{cache_key, CacheRecord, CacheStorage};
use crate::cancel::cancellable;
use crate::error::IndexError;
use crate::fingerprint::repo_fingerprint;
use crate::llm::Embedder;
use crate::progress::{IndexEvent, NoProgress, ProgressSink};
use crate::repo_fs::{ExcludeRules, RepoFs};

/// Tunables for an index pass.
#[derive(Debug, Clone)]
pub struct IndexSettings {
    pub window_chars: usize,
    pub overlap_chars: usize,
    /// Embedding requests in flight per file.
    pub embed_concurrency: usize,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            window_chars: 512,
            overlap_chars: 50,
            embed_concurrency: 4,
        }
    }
}

/// Where the returned store came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSource {
    Cache,
    Fresh,
    /// Cancelled mid-pass; the store holds what was gathered.
    Partial,
}

/// How [`RepositoryIndexer::build`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PassEnd {
    Complete,
    Cancelled,
    WalkFailed,
}

/// Counters for a fresh pass. All zero on a cache hit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub files_indexed: usize,
    pub files_skipped: usize,
    pub chunks_skipped: usize,
}

/// Result of [`RepositoryIndexer::index`].
#[derive(Debug, Clone)]
pub struct IndexOutcome {
    pub store: ChunkStore,
    pub fingerprint: String,
    pub source: IndexSource,
    pub stats: IndexStats,
}

pub struct RepositoryIndexer {
    fs: Arc<dyn RepoFs>,
    embedder: Arc<dyn Embedder>,
    cache: Option<Arc<dyn CacheStorage>>,
    rules: ExcludeRules,
    settings: IndexSettings,
    progress: Arc<dyn ProgressSink>,
}

impl RepositoryIndexer {
    pub fn new(
        fs: Arc<dyn RepoFs>,
        embedder: Arc<dyn Embedder>,
        rules: ExcludeRules,
        settings: IndexSettings,
    ) -> Self {
        Self {
            fs,
            embedder,
            cache: None,
            rules,
            settings,
            progress: Arc::new(NoProgress),
        }
    }

    /// Enable load/save against `cache`.
    pub fn with_cache(mut self, cache: Arc<dyn CacheStorage>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Current repository-state fingerprint. Fatal on failure.
    pub async fn fingerprint(
        &self,
        root: &Path,
        cancel: &CancellationToken,
    ) -> Result<String, IndexError> {
        cancellable(cancel, repo_fingerprint(self.fs.as_ref(), root, &self.rules))
            .await
            .map_err(|_| IndexError::Cancelled)?
    }

    /// Stored chunks for `root` if the cached fingerprint and embedding
    /// model match.
    ///
    /// I/O failures and undecodable records are logged and treated as a
    /// miss.
    pub async fn load_cache(
        &self,
        root: &Path,
        fingerprint: &str,
        cancel: &CancellationToken,
    ) -> Option<ChunkStore> {
        let cache = self.cache.as_ref()?;
        let key = cache_key(root);
        let bytes = match cancellable(cancel, cache.get(&key)).await {
            Ok(Ok(Some(bytes))) => bytes,
            Ok(Ok(None)) => return None,
            Ok(Err(e)) => {
                tracing::warn!(key = %key, error = %e, "cache read failed, re-indexing");
                return None;
            }
            Err(_) => return None,
        };
        let Some(record) = CacheRecord::decode(&bytes) else {
            tracing::warn!(key = %key, "cache record is corrupt, re-indexing");
            return None;
        };
        if record.fingerprint != fingerprint {
            tracing::info!(
                cached = %record.fingerprint,
                current = %fingerprint,
                "repository changed since cache was written"
            );
            return None;
        }
        if record.embedding_model != self.embedder.model_name() {
            tracing::info!(
                cached = %record.embedding_model,
                current = %self.embedder.model_name(),
                "embedding model changed since cache was written"
            );
            return None;
        }
        let store = record.into_store();
        if store.is_none() {
            tracing::warn!(key = %key, "cache record has invalid embeddings, re-indexing");
        }
        store
    }

    /// Persist `store` for `root` under `fingerprint`.
    ///
    /// Returns the error for the caller to report; a failed save never
    /// invalidates the store itself.
    pub async fn save_cache(
        &self,
        root: &Path,
        fingerprint: &str,
        store: &ChunkStore,
        cancel: &CancellationToken,
    ) -> std::io::Result<()> {
        let Some(cache) = &self.cache else {
            return Ok(());
        };
        let bytes = CacheRecord::new(fingerprint, self.embedder.model_name(), store)
            .encode()
            .map_err(std::io::Error::other)?;
        cancellable(cancel, cache.put(&cache_key(root), bytes))
            .await
            .map_err(std::io::Error::other)?
    }

    /// Fingerprint, then load from cache or index from scratch.
    pub async fn index(
        &self,
        root: &Path,
        cancel: &CancellationToken,
    ) -> Result<IndexOutcome, IndexError> {
        let fingerprint = self.fingerprint(root, cancel).await?;

        if let Some(store) = self.load_cache(root, &fingerprint, cancel).await {
            self.progress.report(IndexEvent::CacheHit {
                chunks: store.len(),
            });
            tracing::info!(chunks = store.len(), "loaded index from cache");
            return Ok(IndexOutcome {
                store,
                fingerprint,
                source: IndexSource::Cache,
                stats: IndexStats::default(),
            });
        }

        let (store, stats, end) = self.build(root, cancel).await;
        self.progress.report(IndexEvent::Done {
            chunks: store.len(),
            cancelled: end == PassEnd::Cancelled,
        });

        if end == PassEnd::Cancelled {
            tracing::warn!(chunks = store.len(), "indexing cancelled, cache not updated");
            return Ok(IndexOutcome {
                store,
                fingerprint,
                source: IndexSource::Partial,
                stats,
            });
        }

        if end == PassEnd::WalkFailed {
            tracing::warn!("repository walk failed, cache not updated");
        } else if store.is_empty() && stats.chunks_skipped > 0 {
            tracing::warn!(
                skipped_chunks = stats.chunks_skipped,
                "no chunk could be embedded, cache not updated"
            );
        } else if let Err(e) = self.save_cache(root, &fingerprint, &store, cancel).await {
            tracing::warn!(error = %e, "failed to save index to cache");
        }
        tracing::info!(
            chunks = store.len(),
            files = stats.files_indexed,
            skipped_files = stats.files_skipped,
            skipped_chunks = stats.chunks_skipped,
            "indexed repository"
        );
        Ok(IndexOutcome {
            store,
            fingerprint,
            source: IndexSource::Fresh,
            stats,
        })
    }

    /// Walk and embed.
    async fn build(
        &self,
        root: &Path,
        cancel: &CancellationToken,
    ) -> (ChunkStore, IndexStats, PassEnd) {
        let mut store = ChunkStore::new();
        let mut stats = IndexStats::default();

        let entries = match cancellable(cancel, self.fs.walk(root)).await {
            Ok(Ok(entries)) => entries,
            Ok(Err(e)) => {
                tracing::warn!(root = %root.display(), error = %e, "could not enumerate repository");
                return (store, stats, PassEnd::WalkFailed);
            }
            Err(_) => return (store, stats, PassEnd::Cancelled),
        };
        let files: Vec<String> = entries
            .into_iter()
            .filter(|e| !e.is_dir && !self.rules.is_excluded(&e.rel_path))
            .map(|e| e.rel_path)
            .collect();
        let total = files.len();
        self.progress.report(IndexEvent::Indexing { files: total });

        for (n, rel_path) in files.into_iter().enumerate() {
            if cancel.is_cancelled() {
                return (store, stats, PassEnd::Cancelled);
            }

            let bytes = match cancellable(cancel, self.fs.read_file(root, &rel_path)).await {
                Ok(Ok(bytes)) => bytes,
                Ok(Err(e)) => {
                    tracing::warn!(path = %rel_path, error = %e, "failed to read file, skipping");
                    stats.files_skipped += 1;
                    self.progress.report(IndexEvent::FileSkipped {
                        path: rel_path,
                        reason: e.to_string(),
                    });
                    continue;
                }
                Err(_) => return (store, stats, PassEnd::Cancelled),
            };

            let Some(text) = as_text(bytes) else {
                tracing::warn!(path = %rel_path, "file is not UTF-8 text, skipping");
                stats.files_skipped += 1;
                self.progress.report(IndexEvent::FileSkipped {
                    path: rel_path,
                    reason: "not text".to_string(),
                });
                continue;
            };

            let (added, cancelled) = self
                .embed_file(&rel_path, &text, &mut store, &mut stats, cancel)
                .await;
            stats.files_indexed += 1;
            self.progress.report(IndexEvent::FileIndexed {
                path: rel_path,
                n: n + 1,
                total,
                chunks: added,
            });
            if cancelled {
                return (store, stats, PassEnd::Cancelled);
            }
        }

        (store, stats, PassEnd::Complete)
    }

    /// Embed every window of one file and append successes in order.
    async fn embed_file(
        &self,
        rel_path: &str,
        text: &str,
        store: &mut ChunkStore,
        stats: &mut IndexStats,
        cancel: &CancellationToken,
    ) -> (usize, bool) {
        let windows = split_windows(text, self.settings.window_chars, self.settings.overlap_chars);
        let embedder = &self.embedder;

        let results: Vec<_> = stream::iter(windows.into_iter().enumerate().map(|(idx, window)| async move {
            let result = cancellable(cancel, embedder.embed(&window)).await;
            (idx, window, result)
        }))
        .buffered(self.settings.embed_concurrency.max(1))
        .collect()
        .await;

        let mut added = 0;
        let mut cancelled = false;
        for (idx, window, result) in results {
            match result {
                Ok(Ok(embedding)) => {
                    let chunk = Chunk {
                        source_path: rel_path.to_string(),
                        text: window,
                        embedding,
                    };
                    match store.push(chunk) {
                        Ok(()) => added += 1,
                        Err(e) => {
                            tracing::warn!(path = %rel_path, chunk = idx, error = %e, "skipping chunk");
                            stats.chunks_skipped += 1;
                        }
                    }
                }
                Ok(Err(e)) => {
                    tracing::warn!(
                        path = %rel_path,
                        chunk = idx,
                        error = %e,
                        "failed to embed chunk, skipping"
                    );
                    stats.chunks_skipped += 1;
                }
                Err(_) => cancelled = true,
            }
        }
        (added, cancelled)
    }
}

/// File bytes as text, or `None` for binary or non-UTF-8 content.
fn as_text(bytes: Vec<u8>) -> Option<String> {
    if bytes.contains(&0) {
        return None;
    }
    String::from_utf8(bytes).ok()
}
