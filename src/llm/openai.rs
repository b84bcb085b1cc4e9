//! OpenAI-compatible request shapes.

use serde_json::{json, Value};

use super::{as_embedding, as_text};
use crate::error::LlmError;

pub(super) const DEFAULT_URL: &str = "https://api.openai.com";
pub(super) const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

const PROVIDER: &str = "openai";

pub(super) fn embed_url(base: &str) -> String {
    format!("{}/v1/embeddings", base)
}

pub(super) fn embed_body(model: &str, text: &str) -> Value {
    json!({ "model": model, "input": text })
}

pub(super) fn parse_embedding(json: &Value) -> Result<Vec<f32>, LlmError> {
    as_embedding(PROVIDER, json.pointer("/data/0/embedding"))
}

pub(super) fn complete_url(base: &str) -> String {
    format!("{}/v1/chat/completions", base)
}

pub(super) fn complete_body(model: &str, prompt: &str) -> Value {
    json!({
        "model": model,
        "messages": [{ "role": "user", "content": prompt }],
    })
}

pub(super) fn parse_completion(json: &Value) -> Result<String, LlmError> {
    as_text(PROVIDER, json.pointer("/choices/0/message/content"))
}
