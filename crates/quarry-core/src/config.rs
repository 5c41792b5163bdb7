use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Overrides the database path.
pub const DB_PATH_ENV: &str = "QUARRY_DB";
/// Overrides `[embedding] provider`.
pub const PROVIDER_ENV: &str = "QUARRY_EMBEDDING_PROVIDER";
/// Overrides `[embedding] base_url`.
pub const EMBEDDING_URL_ENV: &str = "QUARRY_EMBEDDING_URL";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarryConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database file. Defaults to `<data dir>/quarry/quarry.db`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-compatible `/embeddings` endpoint.
    #[default]
    OpenAi,
    /// Deterministic offline feature-hashing embedder.
    Hashing,
}

impl ProviderKind {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "hashing" => Some(Self::Hashing),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: default_model(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
        }
    }
}

impl QuarryConfig {
    /// Apply `QUARRY_*` overrides read through `lookup`.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup(DB_PATH_ENV).filter(|v| !v.trim().is_empty()) {
            self.store.path = Some(PathBuf::from(path));
        }
        if let Some(kind) = lookup(PROVIDER_ENV).as_deref().and_then(ProviderKind::parse) {
            self.embedding.provider = kind;
        }
        if let Some(url) = lookup(EMBEDDING_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.embedding.base_url = url;
        }
    }

    /// Database path after defaults are applied.
    ///
    /// # Errors
    ///
    /// Returns an error when no path is configured and the OS data
    /// directory cannot be determined.
    pub fn store_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.store.path {
            return Ok(path.clone());
        }
        let mut path = dirs::data_dir().context("unable to determine OS data directory")?;
        path.push("quarry");
        path.push("quarry.db");
        Ok(path)
    }
}

/// Load configuration from `explicit`, else the user config file, else
/// defaults. Environment overrides are applied last.
///
/// # Errors
///
/// Returns an error if an explicit path is missing, or if a config file
/// exists but cannot be read or parsed.
pub fn load_config(explicit: Option<&Path>) -> Result<QuarryConfig> {
    let mut config = match explicit {
        Some(path) => read_config_file(path)?,
        None => match user_config_path().filter(|p| p.exists()) {
            Some(path) => read_config_file(&path)?,
            None => QuarryConfig::default(),
        },
    };
    config.apply_env_overrides(|key| std::env::var(key).ok());
    Ok(config)
}

/// `<config dir>/quarry/config.toml`, if the OS has a config directory.
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("quarry").join("config.toml"))
}

fn read_config_file(path: &Path) -> Result<QuarryConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str::<QuarryConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

fn default_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_limit() -> usize {
    10
}
