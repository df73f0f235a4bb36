/// Configuration system for book-rag
///
/// Supports loading from multiple sources with priority:
/// Environment variables > Config file > Defaults
use crate::error::{ConfigError, RagError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Embedding provider configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Vector store configuration
    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Generation provider configuration
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Content sync configuration
    #[serde(default)]
    pub sync: SyncConfig,

    /// Response cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Embeddings endpoint (OpenAI-compatible), empty disables the provider
    #[serde(default)]
    pub endpoint: String,

    /// API key, usually injected via BOOK_RAG_EMBEDDING_API_KEY
    #[serde(default)]
    pub api_key: String,

    /// Model name sent to the provider
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Fixed vector dimension for this deployment; must match the provider
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Inputs longer than this are truncated before embedding
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,

    /// Maximum retry attempts per embedding call
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Base backoff delay in milliseconds, doubled each retry
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Minimum delay between consecutive embedding calls in a batch
    #[serde(default = "default_rate_limit_delay_ms")]
    pub rate_limit_delay_ms: u64,

    /// Worker pool size for parallel batch embedding
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

/// Vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    /// Qdrant URL; empty puts the store in degraded no-op mode
    #[serde(default)]
    pub url: String,

    /// Optional Qdrant API key
    #[serde(default)]
    pub api_key: String,

    /// Collection name for content chunks
    #[serde(default = "default_collection_name")]
    pub collection_name: String,
}

/// Chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,

    /// Overlap carried between hard-split sub-chunks, in characters
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

/// Generation provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Chat-completions endpoint (OpenAI-compatible), empty disables generation
    #[serde(default)]
    pub endpoint: String,

    /// API key, usually injected via BOOK_RAG_GENERATION_API_KEY
    #[serde(default)]
    pub api_key: String,

    /// Primary model
    #[serde(default = "default_generation_model")]
    pub model: String,

    /// Secondary models tried in order when the primary fails
    #[serde(default)]
    pub fallback_models: Vec<String>,

    /// Maximum tokens requested per completion
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Overall response timeout in seconds
    #[serde(default = "default_response_timeout")]
    pub response_timeout_secs: u64,

    /// Maximum characters a single chunk may contribute to the prompt context
    #[serde(default = "default_max_context_snippet")]
    pub max_context_snippet: usize,

    /// Number of chunks retrieved per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

/// Content sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Root of the document tree to watch
    #[serde(default = "default_docs_root")]
    pub docs_root: PathBuf,

    /// Watcher debounce interval in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Recognized document extensions (lowercase, without dot)
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

/// Response cache and registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL for session-scoped cache entries, in seconds
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,

    /// TTL for the shared general cache entries, in seconds
    #[serde(default = "default_general_ttl")]
    pub general_ttl_secs: u64,

    /// Sync registry file path
    #[serde(default = "default_registry_path")]
    pub registry_path: PathBuf,
}

// Default value functions
fn default_embedding_model() -> String {
    "text-embedding-ada-002".to_string()
}

fn default_dimension() -> usize {
    1536
}

fn default_max_input_chars() -> usize {
    8191
}

fn default_max_retries() -> usize {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_rate_limit_delay_ms() -> u64 {
    1000
}

fn default_concurrency() -> usize {
    4
}

fn default_collection_name() -> String {
    "book_content".to_string()
}

fn default_max_chunk_size() -> usize {
    1000
}

fn default_overlap() -> usize {
    200
}

fn default_generation_model() -> String {
    "meta-llama/llama-3.3-70b-instruct".to_string()
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f32 {
    0.3
}

fn default_response_timeout() -> u64 {
    30
}

fn default_max_context_snippet() -> usize {
    500
}

fn default_top_k() -> usize {
    5
}

fn default_docs_root() -> PathBuf {
    PathBuf::from("docs")
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_extensions() -> Vec<String> {
    vec!["md".to_string(), "mdx".to_string()]
}

fn default_session_ttl() -> u64 {
    7200 // 2 hours
}

fn default_general_ttl() -> u64 {
    86400 // 24 hours
}

fn default_registry_path() -> PathBuf {
    crate::paths::default_registry_path()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            model: default_embedding_model(),
            dimension: default_dimension(),
            max_input_chars: default_max_input_chars(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            rate_limit_delay_ms: default_rate_limit_delay_ms(),
            concurrency: default_concurrency(),
        }
    }
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            collection_name: default_collection_name(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: default_max_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            model: default_generation_model(),
            fallback_models: Vec::new(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            response_timeout_secs: default_response_timeout(),
            max_context_snippet: default_max_context_snippet(),
            top_k: default_top_k(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            docs_root: default_docs_root(),
            debounce_ms: default_debounce_ms(),
            extensions: default_extensions(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: default_session_ttl(),
            general_ttl_secs: default_general_ttl(),
            registry_path: default_registry_path(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> Result<Self, RagError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseFailed(format!("Invalid TOML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the default location or fall back to defaults
    pub fn load_or_default() -> Result<Self, RagError> {
        let config_path = crate::paths::default_config_path();

        if config_path.exists() {
            tracing::info!("Loading config from: {}", config_path.display());
            Self::from_file(&config_path)
        } else {
            tracing::info!("No config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(endpoint) = std::env::var("BOOK_RAG_EMBEDDING_ENDPOINT") {
            self.embedding.endpoint = endpoint;
        }
        if let Ok(key) = std::env::var("BOOK_RAG_EMBEDDING_API_KEY") {
            self.embedding.api_key = key;
        }
        if let Ok(model) = std::env::var("BOOK_RAG_EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Ok(dim) = std::env::var("BOOK_RAG_EMBEDDING_DIMENSION")
            && let Ok(dim) = dim.parse()
        {
            self.embedding.dimension = dim;
        }

        if let Ok(url) = std::env::var("BOOK_RAG_QDRANT_URL") {
            self.vector_store.url = url;
        }
        if let Ok(key) = std::env::var("BOOK_RAG_QDRANT_API_KEY") {
            self.vector_store.api_key = key;
        }

        if let Ok(endpoint) = std::env::var("BOOK_RAG_GENERATION_ENDPOINT") {
            self.generation.endpoint = endpoint;
        }
        if let Ok(key) = std::env::var("BOOK_RAG_GENERATION_API_KEY") {
            self.generation.api_key = key;
        }
        if let Ok(model) = std::env::var("BOOK_RAG_GENERATION_MODEL") {
            self.generation.model = model;
        }

        if let Ok(root) = std::env::var("BOOK_RAG_DOCS_ROOT") {
            self.sync.docs_root = PathBuf::from(root);
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), RagError> {
        if self.embedding.dimension == 0 {
            return Err(ConfigError::InvalidValue {
                key: "embedding.dimension".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.chunking.max_chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "chunking.max_chunk_size".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.chunking.overlap >= self.chunking.max_chunk_size {
            return Err(ConfigError::InvalidValue {
                key: "chunking.overlap".to_string(),
                reason: format!(
                    "must be smaller than max_chunk_size ({})",
                    self.chunking.max_chunk_size
                ),
            }
            .into());
        }

        if self.embedding.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                key: "embedding.concurrency".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.generation.top_k == 0 {
            return Err(ConfigError::InvalidValue {
                key: "generation.top_k".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(ConfigError::InvalidValue {
                key: "generation.temperature".to_string(),
                reason: format!(
                    "must be between 0.0 and 2.0, got {}",
                    self.generation.temperature
                ),
            }
            .into());
        }

        if self.sync.extensions.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "sync.extensions".to_string(),
                reason: "at least one extension is required".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Create a new Config with defaults and environment overrides
    pub fn new() -> Result<Self, RagError> {
        let mut config = Self::load_or_default()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.embedding.dimension, 1536);
        assert_eq!(config.chunking.max_chunk_size, 1000);
        assert_eq!(config.chunking.overlap, 200);
        assert_eq!(config.cache.general_ttl_secs, 86400);
    }

    #[test]
    fn test_invalid_dimension_rejected() {
        let mut config = Config::default();
        config.embedding.dimension = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        let mut config = Config::default();
        config.chunking.overlap = config.chunking.max_chunk_size;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml() {
        let toml_str = r#"
            [embedding]
            endpoint = "https://api.example.com/v1/embeddings"
            dimension = 768

            [vector_store]
            url = "http://localhost:6334"

            [chunking]
            max_chunk_size = 800
            overlap = 100

            [sync]
            docs_root = "content"
            extensions = ["md"]
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.embedding.dimension, 768);
        assert_eq!(config.chunking.max_chunk_size, 800);
        assert_eq!(config.sync.docs_root, PathBuf::from("content"));
        assert_eq!(config.sync.extensions, vec!["md".to_string()]);
        // Unspecified sections fall back to defaults
        assert_eq!(config.generation.top_k, 5);
    }

    #[test]
    fn test_empty_extensions_rejected() {
        let mut config = Config::default();
        config.sync.extensions.clear();
        assert!(config.validate().is_err());
    }
}
