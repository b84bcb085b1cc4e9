//! Typed errors for the component seams.
//!
//! Each component reports its own error type so callers can tell a
//! recoverable failure (skip, fall back, retry) from a fatal one. The
//! CLI and config layers convert these into `anyhow::Error`.

use std::path::PathBuf;

use thiserror::Error;

/// Failure talking to an embedding or completion provider.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Non-2xx response from the provider.
    #[error("{provider} API error {status}: {body}")]
    Provider {
        provider: &'static str,
        status: u16,
        body: String,
    },
    #[error("{provider} request failed: {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },
    /// 2xx response whose body is not the expected shape.
    #[error("{provider} returned an unexpected response: {detail}")]
    InvalidResponse {
        provider: &'static str,
        detail: String,
    },
    #[error("LLM provider is disabled")]
    Disabled,
}

/// Failure of the structural query tool.
#[derive(Debug, Error)]
pub enum StructuralError {
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("failed to parse {path}: {detail}")]
    Parse { path: String, detail: String },
    #[error("unknown structural query: {0}")]
    UnknownQuery(String),
}

/// Fatal indexing failure. Everything else during indexing is skipped.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("could not determine repository state for {root}: {source}")]
    Fingerprint {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("indexing cancelled before the repository state was known")]
    Cancelled,
}

/// Failure of the retrieval-augmented answer path.
#[derive(Debug, Error)]
pub enum AnswerError {
    /// The question itself could not be embedded, so no context exists.
    #[error("failed to embed question: {0}")]
    Embedding(#[source] LlmError),
    /// Context was built but the completion call failed.
    #[error("failed to generate answer: {0}")]
    Completion(#[source] LlmError),
    #[error("answer cancelled")]
    Cancelled,
}

/// Failure of [`Agent::ask`](crate::agent::Agent::ask).
#[derive(Debug, Error)]
pub enum AskError {
    #[error(transparent)]
    Answer(#[from] AnswerError),
    /// The structural tool failed and the retrieval fallback failed too.
    #[error("structural query failed ({structural}) and fallback retrieval also failed ({rag})")]
    BothPathsFailed {
        structural: StructuralError,
        rag: AnswerError,
    },
}
