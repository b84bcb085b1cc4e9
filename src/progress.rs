//! Indexing progress reporting.
//!
//! Reports observable progress while a repository is indexed so users see
//! which file is being embedded and how much is left. Progress is emitted
//! on **stderr** so stdout remains parseable for scripts.
//!
//! Progress is a side channel: nothing in the indexer depends on whether
//! a sink is attached or what it does with the events.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

/// A single progress event for an index pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexEvent {
    /// A valid cache record was found; no files will be read.
    CacheHit { chunks: usize },
    /// Starting a fresh index over `files` candidate files.
    Indexing { files: usize },
    /// One file finished: `n` of `total`, contributing `chunks` chunks.
    FileIndexed {
        path: String,
        n: usize,
        total: usize,
        chunks: usize,
    },
    /// One file was skipped (unreadable or not text).
    FileSkipped { path: String, reason: String },
    /// Pass finished.
    Done { chunks: usize, cancelled: bool },
}

impl fmt::Display for IndexEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexEvent::CacheHit { chunks } => {
                write!(f, "Loaded repository index from cache ({} chunks).", chunks)
            }
            IndexEvent::Indexing { files } => {
                write!(f, "Creating new index for the repository ({} files)...", files)
            }
            IndexEvent::FileIndexed { path, n, total, .. } => {
                write!(f, "Indexed: {}  ({} / {})", path, n, total)
            }
            IndexEvent::FileSkipped { path, reason } => write!(f, "Skipped: {} ({})", path, reason),
            IndexEvent::Done { chunks, cancelled } => {
                if *cancelled {
                    write!(f, "Indexing cancelled; kept {} chunks.", chunks)
                } else {
                    write!(f, "Index ready: {} chunks.", chunks)
                }
            }
        }
    }
}

/// Receives progress events. Implementations must not block for long.
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: IndexEvent);
}

/// Human-friendly progress on stderr, one line per event.
pub struct StderrProgress;

impl ProgressSink for StderrProgress {
    fn report(&self, event: IndexEvent) {
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "{}", event);
        let _ = err.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressSink for JsonProgress {
    fn report(&self, event: IndexEvent) {
        let obj = match &event {
            IndexEvent::CacheHit { chunks } => serde_json::json!({
                "event": "progress",
                "phase": "cache_hit",
                "chunks": chunks
            }),
            IndexEvent::Indexing { files } => serde_json::json!({
                "event": "progress",
                "phase": "indexing",
                "total": files
            }),
            IndexEvent::FileIndexed {
                path,
                n,
                total,
                chunks,
            } => serde_json::json!({
                "event": "progress",
                "phase": "file",
                "path": path,
                "n": n,
                "total": total,
                "chunks": chunks
            }),
            IndexEvent::FileSkipped { path, reason } => serde_json::json!({
                "event": "progress",
                "phase": "skipped",
                "path": path,
                "reason": reason
            }),
            IndexEvent::Done { chunks, cancelled } => serde_json::json!({
                "event": "progress",
                "phase": "done",
                "chunks": chunks,
                "cancelled": cancelled
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut err = std::io::stderr().lock();
            let _ = writeln!(err, "{}", line);
            let _ = err.flush();
        }
    }
}

/// No-op sink when progress is disabled.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _event: IndexEvent) {}
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn sink(&self) -> Arc<dyn ProgressSink> {
        match self {
            ProgressMode::Off => Arc::new(NoProgress),
            ProgressMode::Human => Arc::new(StderrProgress),
            ProgressMode::Json => Arc::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_lines() {
        let e = IndexEvent::FileIndexed {
            path: "cmd/main.go".into(),
            n: 3,
            total: 10,
            chunks: 2,
        };
        assert_eq!(e.to_string(), "Indexed: cmd/main.go  (3 / 10)");
        assert_eq!(
            IndexEvent::Done {
                chunks: 4,
                cancelled: true
            }
            .to_string(),
            "Indexing cancelled; kept 4 chunks."
        );
    }
}
