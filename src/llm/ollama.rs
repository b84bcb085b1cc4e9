//! Ollama request shapes.
//!
//! Requires Ollama to be running with both models pulled
//! (e.g. `ollama pull nomic-embed-text`).

use serde_json::{json, Value};

use super::{as_embedding, as_text};
use crate::error::LlmError;

pub(super) const DEFAULT_URL: &str = "http://localhost:11434";
pub(super) const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";

const PROVIDER: &str = "ollama";

pub(super) fn embed_url(base: &str) -> String {
    format!("{}/api/embed", base)
}

pub(super) fn embed_body(model: &str, text: &str) -> Value {
    json!({ "model": model, "input": text })
}

/// `{"embeddings": [[...]]}`
pub(super) fn parse_embedding(json: &Value) -> Result<Vec<f32>, LlmError> {
    as_embedding(PROVIDER, json.pointer("/embeddings/0"))
}

pub(super) fn complete_url(base: &str) -> String {
    format!("{}/api/generate", base)
}

pub(super) fn complete_body(model: &str, prompt: &str) -> Value {
    json!({ "model": model, "prompt": prompt, "stream": false })
}

pub(super) fn parse_completion(json: &Value) -> Result<String, LlmError> {
    as_text(PROVIDER, json.get("response"))
}
