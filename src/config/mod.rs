// Configuration management module
// All settings come from environment variables so the backend can be driven
// by a .env.local file or the hosting environment.

#[cfg(test)]
mod tests;

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://ark.cn-beijing.volces.com/api/v3";
pub const DEFAULT_CHAT_MODEL: &str = "doubao-seed-1-6-vision-250815";
pub const DEFAULT_EMBED_MODEL: &str = "doubao-embedding-vision-250615";
pub const DEFAULT_DOCS_DIR: &str = "local_docs";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";
pub const DEFAULT_CORS_ORIGINS: &str = "http://localhost:5173,http://127.0.0.1:5173";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Credential for the remote API. Absence is not fatal at load time;
    /// remote calls fail with a configuration error when it is missing.
    pub api_key: Option<String>,
    pub base_url: String,
    pub chat_model: String,
    pub embed_model: String,
    pub docs_dir: PathBuf,
    pub store_path: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub min_score: f32,
    pub rag_enabled_for_chat: bool,
    pub system_prompt: Option<String>,
    pub cors_origins: Vec<String>,
    pub bind_addr: SocketAddr,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("Invalid chunk size: {0} (must be at least 1)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("Invalid top-k: {0} (must be at least 1)")]
    InvalidTopK(usize),
    #[error("Invalid minimum score: {0} (must be between -1 and 1)")]
    InvalidMinScore(f32),
    #[error("Invalid bind address: {0}")]
    InvalidBindAddr(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        let docs_dir = PathBuf::from(DEFAULT_DOCS_DIR);
        let store_path = docs_dir.join("index.json");
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            docs_dir,
            store_path,
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 5,
            min_score: 0.75,
            rag_enabled_for_chat: true,
            system_prompt: None,
            cors_origins: split_origins(DEFAULT_CORS_ORIGINS),
            bind_addr: default_bind_addr(),
        }
    }
}

impl Config {
    /// Build the configuration from the process environment, falling back to
    /// defaults for anything unset.
    #[inline]
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(key) = env_var("ARK_API_KEY") {
            config.api_key = Some(key);
        }
        if let Some(url) = env_var("ARK_BASE_URL") {
            config.base_url = url;
        }
        if let Some(model) = env_var("ARK_MODEL") {
            config.chat_model = model;
        }
        if let Some(model) = env_var("ARK_EMBEDDING_MODEL") {
            config.embed_model = model;
        }
        if let Some(dir) = env_var("RAG_DOCS_DIR") {
            config.docs_dir = PathBuf::from(dir);
            config.store_path = config.docs_dir.join("index.json");
        }
        if let Some(path) = env_var("RAG_STORE_PATH") {
            config.store_path = PathBuf::from(path);
        }
        if let Some(raw) = env_var("RAG_CHUNK_SIZE") {
            config.chunk_size = parse_number("RAG_CHUNK_SIZE", &raw)?;
        }
        if let Some(raw) = env_var("RAG_CHUNK_OVERLAP") {
            config.chunk_overlap = parse_number("RAG_CHUNK_OVERLAP", &raw)?;
        }
        if let Some(raw) = env_var("RAG_TOP_K") {
            config.top_k = parse_number("RAG_TOP_K", &raw)?;
        }
        if let Some(raw) = env_var("RAG_MIN_SCORE") {
            config.min_score = raw
                .parse()
                .map_err(|_| ConfigError::InvalidValue("RAG_MIN_SCORE", raw))?;
        }
        if let Some(raw) = env_var("RAG_ENABLE_FOR_CHAT") {
            config.rag_enabled_for_chat = parse_bool(&raw);
        }
        if let Some(prompt) = env_var("SYSTEM_PROMPT") {
            config.system_prompt = Some(prompt);
        }
        if let Some(origins) = env_var("CORS_ORIGINS") {
            config.cors_origins = split_origins(&origins);
        }
        if let Some(raw) = env_var("BIND_ADDR") {
            config.bind_addr = raw
                .parse()
                .map_err(|_| ConfigError::InvalidBindAddr(raw))?;
        }

        config.validate()?;
        Ok(config)
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if Url::parse(&self.base_url).is_err() {
            return Err(ConfigError::InvalidBaseUrl(self.base_url.clone()));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize(self.chunk_size));
        }
        // An overlap at or beyond the chunk size would make the sliding
        // window advance by a non-positive amount and never terminate.
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::OverlapTooLarge(
                self.chunk_overlap,
                self.chunk_size,
            ));
        }
        if self.top_k == 0 {
            return Err(ConfigError::InvalidTopK(self.top_k));
        }
        if !(-1.0..=1.0).contains(&self.min_score) {
            return Err(ConfigError::InvalidMinScore(self.min_score));
        }
        Ok(())
    }

    #[inline]
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_number(name: &'static str, raw: &str) -> Result<usize, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(name, raw.to_string()))
}

/// Truthy values are 1/true/yes/on, case-insensitive; anything else is false.
fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn default_bind_addr() -> SocketAddr {
    DEFAULT_BIND_ADDR
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 8000)))
}
