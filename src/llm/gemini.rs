//! Google Gemini request shapes.

use serde_json::{json, Value};

use super::{as_embedding, as_text};
use crate::error::LlmError;

pub(super) const DEFAULT_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub(super) const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";

const PROVIDER: &str = "gemini";

pub(super) fn embed_url(base: &str, model: &str) -> String {
    format!("{}/models/{}:embedContent", base, model)
}

pub(super) fn embed_body(model: &str, text: &str) -> Value {
    json!({
        "model": format!("models/{}", model),
        "content": { "parts": [{ "text": text }] },
    })
}

/// `{"embedding": {"values": [...]}}`
pub(super) fn parse_embedding(json: &Value) -> Result<Vec<f32>, LlmError> {
    as_embedding(PROVIDER, json.pointer("/embedding/values"))
}

pub(super) fn complete_url(base: &str, model: &str) -> String {
    format!("{}/models/{}:generateContent", base, model)
}

pub(super) fn complete_body(prompt: &str) -> Value {
    json!({
        "contents": [{ "parts": [{ "text": prompt }] }],
    })
}

/// First text part of the first candidate.
pub(super) fn parse_completion(json: &Value) -> Result<String, LlmError> {
    as_text(PROVIDER, json.pointer("/candidates/0/content/parts/0/text"))
}
