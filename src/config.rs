//! TOML configuration.
//!
//! Every section is optional and falls back to defaults, so an empty file
//! (or no file at all, see [`load_config_or_default`]) is a valid
//! configuration. API credentials never live here; they are read from the
//! environment (`OPENAI_API_KEY`).
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:8000"
//!
//! [catalog]
//! path = "./config/catalog.toml"
//!
//! [embedding]
//! provider = "openai"          # openai | hash | local
//! model = "text-embedding-3-small"
//!
//! [completion]
//! provider = "openai"          # openai | disabled
//! model = "gpt-4o-mini"
//! temperature = 0.7
//!
//! [memory]
//! capacity = 50
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CatalogConfig {
    /// `.toml` (`[[products]]`) or `.json` (array) file; the built-in
    /// catalog is used when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            base_url: default_openai_base_url(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    2
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_completion_provider")]
    pub provider: String,
    #[serde(default = "default_completion_model")]
    pub model: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_completion_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: default_completion_provider(),
            model: default_completion_model(),
            base_url: default_openai_base_url(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_completion_timeout_secs(),
        }
    }
}

fn default_completion_provider() -> String {
    "openai".to_string()
}
fn default_completion_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> usize {
    800
}
fn default_completion_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct MemoryConfig {
    /// Maximum number of chat turns retained.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Past turns recalled by similarity per message.
    #[serde(default = "default_recall_k")]
    pub recall_k: usize,
    /// Most recent turns always included in the prompt.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            recall_k: default_recall_k(),
            history_window: default_history_window(),
        }
    }
}

fn default_capacity() -> usize {
    50
}
fn default_recall_k() -> usize {
    3
}
fn default_history_window() -> usize {
    6
}

impl Config {
    /// Fully offline configuration: hashing embedder, no language model.
    pub fn minimal() -> Self {
        Self {
            embedding: EmbeddingConfig {
                provider: "hash".to_string(),
                ..Default::default()
            },
            completion: CompletionConfig {
                provider: "disabled".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.bind.trim().is_empty() {
            bail!("server.bind must not be empty");
        }

        match self.embedding.provider.as_str() {
            "openai" | "hash" | "local" => {}
            other => bail!(
                "Unknown embedding provider: '{}'. Must be openai, hash, or local.",
                other
            ),
        }
        if self.embedding.dims == Some(0) {
            bail!("embedding.dims must be > 0");
        }
        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be > 0");
        }

        match self.completion.provider.as_str() {
            "openai" | "disabled" => {}
            other => bail!(
                "Unknown completion provider: '{}'. Must be openai or disabled.",
                other
            ),
        }
        if !(0.0..=2.0).contains(&self.completion.temperature) {
            bail!("completion.temperature must be in [0.0, 2.0]");
        }
        if self.completion.max_tokens == 0 {
            bail!("completion.max_tokens must be > 0");
        }

        if self.memory.capacity == 0 {
            bail!("memory.capacity must be >= 1");
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

/// Like [`load_config`], but a missing file yields [`Config::default`].
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::info!(path = %path.display(), "config file not found, using defaults");
        Ok(Config::default())
    }
}
