use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;

/// Default configuration file path, used when `--config` is not passed.
pub const DEFAULT_CONFIG_PATH: &str = "./palisade.toml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GithubConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_branch")]
    pub default_branch: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            default_branch: default_branch(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}
fn default_branch() -> String {
    "main".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Directory holding one persisted index per repository short name.
    #[serde(default = "default_index_dir")]
    pub dir: PathBuf,
    /// Local checkout to scan for source text.
    #[serde(default = "default_index_root")]
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    /// Upper bound on chunk size in characters; whitespace-delimited
    /// packing never splits inside a token.
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: default_index_dir(),
            root: default_index_root(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            max_chunk_chars: default_max_chunk_chars(),
        }
    }
}

fn default_index_dir() -> PathBuf {
    PathBuf::from("./index")
}
fn default_index_root() -> PathBuf {
    PathBuf::from("./tmp")
}
fn default_include_globs() -> Vec<String> {
    vec!["**/*.py".to_string()]
}
fn default_max_chunk_chars() -> usize {
    1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embed_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            dims: default_dims(),
            batch_size: default_batch_size(),
            timeout_secs: default_embed_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "huggingface".to_string()
}
fn default_model() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}
fn default_dims() -> usize {
    384
}
fn default_batch_size() -> usize {
    64
}
fn default_embed_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneratorConfig {
    #[serde(default = "default_generator_url")]
    pub url: String,
    #[serde(default = "default_generator_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            url: default_generator_url(),
            timeout_secs: default_generator_timeout_secs(),
        }
    }
}

fn default_generator_url() -> String {
    "https://us-central1-palisades-sec.cloudfunctions.net/palisade-feature".to_string()
}
fn default_generator_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    4
}

/// Credentials collected once at process start and passed by reference into
/// each pipeline step. Nothing reads the environment after this point.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub github_token: Option<String>,
    pub embedding_api_key: Option<String>,
    pub generator_auth_token: Option<String>,
}

impl Credentials {
    /// Gather tokens from the environment, with `--auth-token` taking
    /// precedence over `CF_AUTH_TOKEN` for the generator service.
    ///
    /// The embedding key variable depends on the configured provider:
    /// `HF_TOKEN` for `huggingface`, `OPENAI_API_KEY` for `openai`.
    pub fn from_env(config: &Config, auth_token: Option<String>) -> Self {
        let key_var = match config.embedding.provider.as_str() {
            "openai" => "OPENAI_API_KEY",
            _ => "HF_TOKEN",
        };
        Self {
            github_token: std::env::var("GITHUB_TOKEN").ok(),
            embedding_api_key: std::env::var(key_var).ok(),
            generator_auth_token: auth_token.or_else(|| std::env::var("CF_AUTH_TOKEN").ok()),
        }
    }

    pub fn require_github(&self) -> Result<&str> {
        self.github_token
            .as_deref()
            .ok_or_else(|| PipelineError::Auth("GITHUB_TOKEN not set".to_string()).into())
    }

    pub fn require_embedding_key(&self, provider: &str) -> Result<&str> {
        self.embedding_api_key.as_deref().ok_or_else(|| {
            let var = match provider {
                "openai" => "OPENAI_API_KEY",
                _ => "HF_TOKEN",
            };
            PipelineError::Auth(format!("{} not set", var)).into()
        })
    }
}

/// Load configuration from `path`, or from `./palisade.toml` when no path
/// is given. An absent default file yields the built-in defaults; an
/// explicitly passed path must exist.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let (path, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
    };

    if !path.exists() {
        if explicit {
            anyhow::bail!("config file does not exist: {}", path.display());
        }
        return validate(Config::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(config)
}

fn validate(config: Config) -> Result<Config> {
    if config.index.max_chunk_chars == 0 {
        anyhow::bail!("index.max_chunk_chars must be > 0");
    }
    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    match config.embedding.provider.as_str() {
        "huggingface" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be huggingface or openai.",
            other
        ),
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = validate(Config::default()).unwrap();
        assert_eq!(config.github.api_base, "https://api.github.com");
        assert_eq!(config.github.default_branch, "main");
        assert_eq!(config.index.max_chunk_chars, 1024);
        assert_eq!(config.index.include_globs, vec!["**/*.py"]);
        assert_eq!(config.retrieval.top_k, 4);
        assert_eq!(config.embedding.provider, "huggingface");
        assert_eq!(config.embedding.dims, 384);
    }

    #[test]
    fn test_parse_partial_file() {
        let config: Config = toml::from_str(
            r#"
            [index]
            root = "./checkout"
            include_globs = ["**/*.rs"]

            [retrieval]
            top_k = 8
            "#,
        )
        .unwrap();
        let config = validate(config).unwrap();
        assert_eq!(config.index.root, PathBuf::from("./checkout"));
        assert_eq!(config.retrieval.top_k, 8);
        // Untouched sections keep their defaults
        assert_eq!(config.embedding.model, "sentence-transformers/all-MiniLM-L6-v2");
        assert!(config.generator.url.ends_with("/palisade-feature"));
    }

    #[test]
    fn test_rejects_invalid_values() {
        let mut config = Config::default();
        config.retrieval.top_k = 0;
        assert!(validate(config).is_err());

        let mut config = Config::default();
        config.embedding.provider = "faiss".to_string();
        assert!(validate(config).is_err());

        let mut config = Config::default();
        config.index.max_chunk_chars = 0;
        assert!(validate(config).is_err());
    }

    #[test]
    fn test_explicit_missing_config_is_an_error() {
        let err = load_config(Some(Path::new("/nonexistent/palisade.toml"))).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
