/// Centralized error types for book-rag using thiserror
///
/// Provides domain-specific error types for better error handling and user-facing messages.
use thiserror::Error;

/// Main error type for the RAG pipeline
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors raised while parsing source documents
///
/// These are always recoverable: malformed front-matter falls back to
/// treating the whole file as body text, so parse errors only surface
/// when the file itself cannot be read.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Failed to read document '{path}': {reason}")]
    ReadFailed { path: String, reason: String },

    #[error("Document is not valid UTF-8: {0}")]
    InvalidUtf8(String),

    #[error("Path is outside the watched root: {0}")]
    OutsideRoot(String),
}

/// Errors related to embedding generation
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Embedding provider unavailable after {attempts} attempts: {reason}")]
    Unavailable { attempts: usize, reason: String },

    #[error("Invalid embedding dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding contains non-finite values")]
    NonFiniteVector,

    #[error("Embedding request failed: {0}")]
    RequestFailed(String),

    #[error("Embedding provider returned an empty response")]
    EmptyResponse,

    #[error("Embedding provider is not configured")]
    NotConfigured,
}

/// Errors related to vector store operations
#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("Failed to connect to vector store: {0}")]
    ConnectionFailed(String),

    #[error("Failed to create collection '{collection}': {reason}")]
    CollectionCreationFailed { collection: String, reason: String },

    #[error("Failed to store vectors: {0}")]
    UpsertFailed(String),

    #[error("Failed to search vectors: {0}")]
    SearchFailed(String),

    #[error("Failed to delete vectors: {0}")]
    DeleteFailed(String),

    #[error("Failed to count vectors: {0}")]
    CountFailed(String),
}

/// Errors related to answer generation
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("All generation providers failed; last error: {0}")]
    AllProvidersFailed(String),

    #[error("Generation provider '{provider}' failed: {reason}")]
    ProviderFailed { provider: String, reason: String },

    #[error("Generation provider returned an empty completion")]
    EmptyCompletion,

    #[error("Generation timed out after {0} seconds")]
    Timeout(u64),

    #[error("No generation provider is configured")]
    NotConfigured,
}

/// Errors related to content synchronization
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Watch root not found: {0}")]
    RootNotFound(String),

    #[error("Failed to start filesystem watcher: {0}")]
    WatcherFailed(String),

    #[error("Change queue is closed")]
    QueueClosed,

    #[error("Sync service is already running")]
    AlreadyRunning,
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {0}")]
    LoadFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Errors related to input validation
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Empty {0}")]
    Empty(String),

    #[error("{field} must be {constraint}, got {actual}")]
    ConstraintViolation {
        field: String,
        constraint: String,
        actual: String,
    },

    #[error("Malformed search result: missing {0}")]
    MalformedResult(String),

    #[error("Invalid query mode: {0}")]
    InvalidQueryMode(String),
}

/// Errors related to the persisted sync registry
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Failed to load registry from '{path}': {reason}")]
    LoadFailed { path: String, reason: String },

    #[error("Failed to save registry to '{path}': {reason}")]
    SaveFailed { path: String, reason: String },

    #[error("Failed to parse registry file: {0}")]
    ParseFailed(String),
}

// Conversion from anyhow::Error to RagError
impl From<anyhow::Error> for RagError {
    fn from(err: anyhow::Error) -> Self {
        RagError::Other(format!("{:#}", err))
    }
}

impl RagError {
    /// Create a new error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        RagError::Other(msg.into())
    }

    /// Check if this is a user error (bad input) vs system error
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            RagError::Validation(_) | RagError::Config(ConfigError::InvalidValue { .. })
        )
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RagError::VectorStore(VectorStoreError::ConnectionFailed(_))
                | RagError::Embedding(EmbeddingError::RequestFailed(_))
                | RagError::Generation(GenerationError::Timeout(_))
                | RagError::Io(_)
        )
    }

    /// Check whether the pipeline should degrade rather than propagate
    ///
    /// Exhausted providers and unreachable stores never reach the end
    /// user as raw errors; callers switch to their fallback path instead.
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            RagError::Embedding(EmbeddingError::Unavailable { .. })
                | RagError::VectorStore(_)
                | RagError::Generation(GenerationError::AllProvidersFailed(_))
                | RagError::Generation(GenerationError::NotConfigured)
        )
    }
}
