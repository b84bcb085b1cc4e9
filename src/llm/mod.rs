//! Embedding and completion clients.
//!
//! The rest of the crate depends only on the [`Embedder`] and
//! [`Completer`] traits. [`LlmClient`] implements both for each
//! supported provider:
//!
//! - **gemini**: `:embedContent` / `:generateContent`
//! - **openai**: `/v1/embeddings` / `/v1/chat/completions`
//! - **ollama**: `/api/embed` / `/api/generate`
//! - **disabled**: every call fails with [`LlmError::Disabled`]
//!
//! Use [`create_client`] to build one from configuration.
//!
//! # Retry Strategy
//!
//! All providers share [`post_json_with_retry`]:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

mod gemini;
mod ollama;
mod openai;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::LlmError;

/// Turns text into an embedding vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the embedding model identifier (e.g. `"text-embedding-004"`).
    fn model_name(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;
}

/// Answers a single prompt. No streaming.
#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Provider {
    Gemini,
    OpenAi,
    Ollama,
    Disabled,
}

impl Provider {
    fn name(self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::OpenAi => "openai",
            Provider::Ollama => "ollama",
            Provider::Disabled => "disabled",
        }
    }
}

/// HTTP client for one configured provider.
pub struct LlmClient {
    provider: Provider,
    http: reqwest::Client,
    base_url: String,
    model: String,
    embedding_model: String,
    api_key: Option<String>,
    max_retries: u32,
}

/// Build the client described by `config`.
///
/// # Errors
///
/// Fails for an unknown provider, a missing model, or a missing API key
/// for providers that need one.
pub fn create_client(config: &LlmConfig) -> Result<Arc<LlmClient>> {
    let provider = match config.provider.as_str() {
        "gemini" => Provider::Gemini,
        "openai" => Provider::OpenAi,
        "ollama" => Provider::Ollama,
        "disabled" => Provider::Disabled,
        other => bail!("Unknown llm provider: {}", other),
    };

    let api_key = config.api_key();
    if matches!(provider, Provider::Gemini | Provider::OpenAi) && api_key.is_none() {
        bail!(
            "{} environment variable not set (required by the {} provider)",
            config.api_key_env,
            provider.name()
        );
    }

    let model = match provider {
        Provider::Disabled => String::new(),
        _ => config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("llm.model required for {} provider", provider.name()))?,
    };

    let (default_url, default_embedding) = match provider {
        Provider::Gemini => (gemini::DEFAULT_URL, gemini::DEFAULT_EMBEDDING_MODEL),
        Provider::OpenAi => (openai::DEFAULT_URL, openai::DEFAULT_EMBEDDING_MODEL),
        Provider::Ollama => (ollama::DEFAULT_URL, ollama::DEFAULT_EMBEDDING_MODEL),
        Provider::Disabled => ("", "disabled"),
    };

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    Ok(Arc::new(LlmClient {
        provider,
        http,
        base_url: config
            .url
            .clone()
            .unwrap_or_else(|| default_url.to_string())
            .trim_end_matches('/')
            .to_string(),
        model,
        embedding_model: config
            .embedding_model
            .clone()
            .unwrap_or_else(|| default_embedding.to_string()),
        api_key,
        max_retries: config.max_retries,
    }))
}

impl LlmClient {
    fn headers(&self) -> Vec<(&'static str, String)> {
        let Some(key) = &self.api_key else {
            return Vec::new();
        };
        match self.provider {
            Provider::Gemini => vec![("x-goog-api-key", key.clone())],
            Provider::OpenAi => vec![("Authorization", format!("Bearer {}", key))],
            _ => Vec::new(),
        }
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value, LlmError> {
        post_json_with_retry(
            &self.http,
            self.provider.name(),
            url,
            &self.headers(),
            body,
            self.max_retries,
        )
        .await
    }
}

#[async_trait]
impl Embedder for LlmClient {
    fn model_name(&self) -> &str {
        &self.embedding_model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let (url, body, parse): (String, Value, fn(&Value) -> Result<Vec<f32>, LlmError>) =
            match self.provider {
                Provider::Gemini => (
                    gemini::embed_url(&self.base_url, &self.embedding_model),
                    gemini::embed_body(&self.embedding_model, text),
                    gemini::parse_embedding,
                ),
                Provider::OpenAi => (
                    openai::embed_url(&self.base_url),
                    openai::embed_body(&self.embedding_model, text),
                    openai::parse_embedding,
                ),
                Provider::Ollama => (
                    ollama::embed_url(&self.base_url),
                    ollama::embed_body(&self.embedding_model, text),
                    ollama::parse_embedding,
                ),
                Provider::Disabled => return Err(LlmError::Disabled),
            };
        let json = self.post(&url, &body).await?;
        parse(&json)
    }
}

#[async_trait]
impl Completer for LlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let (url, body, parse): (String, Value, fn(&Value) -> Result<String, LlmError>) =
            match self.provider {
                Provider::Gemini => (
                    gemini::complete_url(&self.base_url, &self.model),
                    gemini::complete_body(prompt),
                    gemini::parse_completion,
                ),
                Provider::OpenAi => (
                    openai::complete_url(&self.base_url),
                    openai::complete_body(&self.model, prompt),
                    openai::parse_completion,
                ),
                Provider::Ollama => (
                    ollama::complete_url(&self.base_url),
                    ollama::complete_body(&self.model, prompt),
                    ollama::parse_completion,
                ),
                Provider::Disabled => return Err(LlmError::Disabled),
            };
        let json = self.post(&url, &body).await?;
        parse(&json)
    }
}

/// POST a JSON body with retry/backoff and return the JSON response.
pub(crate) async fn post_json_with_retry(
    http: &reqwest::Client,
    provider: &'static str,
    url: &str,
    headers: &[(&'static str, String)],
    body: &Value,
    max_retries: u32,
) -> Result<Value, LlmError> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            // Exponential backoff: 1s, 2s, 4s, 8s, ...
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tracing::debug!(provider, attempt, ?delay, "retrying request");
            tokio::time::sleep(delay).await;
        }

        let mut request = http.post(url).json(body);
        for (name, value) in headers {
            request = request.header(*name, value);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response
                        .json::<Value>()
                        .await
                        .map_err(|e| LlmError::InvalidResponse {
                            provider,
                            detail: e.to_string(),
                        });
                }

                let body_text = response.text().await.unwrap_or_default();
                let err = LlmError::Provider {
                    provider,
                    status: status.as_u16(),
                    body: body_text,
                };

                // Rate limited or server error: retry
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(err);
                    continue;
                }

                // Client error (not 429): don't retry
                return Err(err);
            }
            Err(source) => {
                last_err = Some(LlmError::Transport { provider, source });
                continue;
            }
        }
    }

    Err(last_err.unwrap_or(LlmError::InvalidResponse {
        provider,
        detail: "request failed after retries".to_string(),
    }))
}

/// Read a JSON array of numbers as an embedding.
fn as_embedding(provider: &'static str, value: Option<&Value>) -> Result<Vec<f32>, LlmError> {
    let values = value
        .and_then(|v| v.as_array())
        .ok_or_else(|| LlmError::InvalidResponse {
            provider,
            detail: "missing embedding array".to_string(),
        })?;
    values
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| LlmError::InvalidResponse {
                    provider,
                    detail: "non-numeric embedding value".to_string(),
                })
        })
        .collect()
}

fn as_text(provider: &'static str, value: Option<&Value>) -> Result<String, LlmError> {
    value
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| LlmError::InvalidResponse {
            provider,
            detail: "no content returned".to_string(),
        })
}
