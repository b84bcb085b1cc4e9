//! Configuration parsing.
//!
//! Review Harness reads one TOML file. Every section and key is optional;
//! missing values take the defaults below. [`load_config`] validates the
//! result and fails with a descriptive error on anything that would make
//! indexing or retrieval misbehave.
//!
//! ```toml
//! [llm]
//! provider = "gemini"            # gemini | openai | ollama | disabled
//! model = "gemini-1.5-flash"
//! embedding_model = "text-embedding-004"
//! api_key_env = "AI_API_KEY"
//!
//! [chunking]
//! window_chars = 512
//! overlap_chars = 50
//!
//! [retrieval]
//! top_k = 5
//!
//! [review]
//! comment_threshold = "warning"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub index: IndexConfig,
    pub cache: CacheConfig,
    pub review: ReviewConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Completion model.
    #[serde(default)]
    pub model: Option<String>,
    /// Embedding model. Each provider has a default.
    #[serde(default)]
    pub embedding_model: Option<String>,
    /// Base URL override (self-hosted gateways, non-default Ollama port).
    #[serde(default)]
    pub url: Option<String>,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            embedding_model: None,
            url: None,
            api_key_env: default_api_key_env(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_api_key_env() -> String {
    "AI_API_KEY".to_string()
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    60
}

impl LlmConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    /// The API key from the configured environment variable, if set and non-empty.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }

    /// Whether calls can be made at all. Ollama needs no key.
    pub fn has_credential(&self) -> bool {
        match self.provider.as_str() {
            "ollama" => true,
            "disabled" => false,
            _ => self.api_key().is_some(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_window_chars")]
    pub window_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window_chars: default_window_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_window_chars() -> usize {
    512
}
fn default_overlap_chars() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Upper bound on the context block handed to the model.
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_context_chars: default_max_context_chars(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_max_context_chars() -> usize {
    12_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Extra globs excluded on top of the built-in binary/media denylist.
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    /// Embedding requests in flight per file.
    #[serde(default = "default_embed_concurrency")]
    pub embed_concurrency: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            exclude_globs: Vec::new(),
            embed_concurrency: default_embed_concurrency(),
        }
    }
}

fn default_embed_concurrency() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Defaults to `$XDG_CACHE_HOME/review-harness`.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReviewConfig {
    #[serde(default = "default_true")]
    pub ai_scoring: bool,
    /// Tool names whose findings already come from the model.
    #[serde(default = "default_ai_tools")]
    pub ai_tools: Vec<String>,
    #[serde(default = "default_comment_threshold")]
    pub comment_threshold: String,
    /// How far an issue line may move to land on an added diff line.
    #[serde(default = "default_diff_line_window")]
    pub diff_line_window: u32,
    /// Re-scoring requests in flight.
    #[serde(default = "default_scoring_concurrency")]
    pub scoring_concurrency: usize,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            ai_scoring: true,
            ai_tools: default_ai_tools(),
            comment_threshold: default_comment_threshold(),
            diff_line_window: default_diff_line_window(),
            scoring_concurrency: default_scoring_concurrency(),
        }
    }
}

fn default_ai_tools() -> Vec<String> {
    vec!["Gemini".to_string(), "ai".to_string()]
}
fn default_comment_threshold() -> String {
    "warning".to_string()
}
fn default_diff_line_window() -> u32 {
    3
}
fn default_scoring_concurrency() -> usize {
    4
}

/// Read, parse and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate config text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    if config.chunking.window_chars == 0 {
        bail!("chunking.window_chars must be > 0");
    }
    if config.chunking.overlap_chars >= config.chunking.window_chars {
        bail!(
            "chunking.overlap_chars ({}) must be less than chunking.window_chars ({})",
            config.chunking.overlap_chars,
            config.chunking.window_chars
        );
    }

    // Validate retrieval
    if config.retrieval.top_k < 1 {
        bail!("retrieval.top_k must be >= 1");
    }
    if config.index.embed_concurrency < 1 {
        bail!("index.embed_concurrency must be >= 1");
    }
    if config.review.scoring_concurrency < 1 {
        bail!("review.scoring_concurrency must be >= 1");
    }

    match config.llm.provider.as_str() {
        "disabled" | "gemini" | "openai" | "ollama" => {}
        other => bail!(
            "Unknown llm provider: '{}'. Must be gemini, openai, ollama, or disabled.",
            other
        ),
    }
    if config.llm.is_enabled() && config.llm.model.is_none() {
        bail!(
            "llm.model must be specified when provider is '{}'",
            config.llm.provider
        );
    }

    Ok(())
}
