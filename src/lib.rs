//! # book-rag - Grounded Q&A over a documentation tree
//!
//! A RAG (Retrieval-Augmented Generation) pipeline for book-style document
//! corpora: Markdown/MDX sources are parsed, semantically chunked, embedded
//! through a pluggable provider, and persisted in Qdrant; at query time the
//! pipeline retrieves relevant chunks and produces a grounded answer through
//! a chain of language-model providers with caching and degraded-mode
//! fallbacks.
//!
//! ## Overview
//!
//! Ingestion flow: sync service -> parser -> chunker -> hasher -> embedding
//! adapter -> vector store. Query flow: cache check -> retrieval ->
//! generation (with provider fallback) -> cache store -> interaction log.
//! A filesystem watcher drives incremental re-ingestion when source files
//! change or disappear.
//!
//! ## Key properties
//!
//! - **Content-hash identity**: a chunk's id is a pure function of its
//!   content and source location, making re-ingestion idempotent
//! - **Failure isolation**: one chunk or file failing never aborts the rest
//!   of a batch; statuses are recorded per unit
//! - **Degraded modes everywhere**: an unconfigured or unreachable store,
//!   embedding provider, or language model degrades to a safe, explicitly
//!   marked fallback instead of an error
//!
//! ## Modules
//!
//! - [`ingest`]: document parsing, semantic chunking, identity assignment
//! - [`embedding`]: embedding provider trait and HTTP adapter
//! - [`vector_db`]: vector store trait and Qdrant adapter
//! - [`retrieval`]: query-time search orchestration
//! - [`generation`]: prompt assembly, provider fallback, tone scoring
//! - [`sync`]: filesystem watcher and incremental re-ingestion
//! - [`cache`]: two-tier TTL response cache
//! - [`registry`]: persisted file-mapping and chunk-metadata records
//! - [`service`]: dependency-injected facade tying it all together
//! - [`config`]: configuration with env-var overrides
//! - [`error`]: error taxonomy
//!
//! ## Usage example
//!
//! ```no_run
//! use book_rag::config::Config;
//! use book_rag::service::RagService;
//! use book_rag::types::{QueryMode, QueryRequest};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let service = RagService::new(Config::new()?).await?;
//!
//!     service.sync().sync_all(false).await;
//!
//!     let response = service
//!         .process_query(QueryRequest {
//!             query: "What are nodes?".to_string(),
//!             session_id: "session-1".to_string(),
//!             mode: QueryMode::Global,
//!             selected_text: None,
//!             source_filter: None,
//!         })
//!         .await?;
//!
//!     println!("{}", response.answer);
//!     Ok(())
//! }
//! ```

/// Two-tier TTL response cache
pub mod cache;

/// Configuration management with environment variable overrides
pub mod config;

/// Embedding provider trait and HTTP adapter
pub mod embedding;

/// Error types and utilities
pub mod error;

/// Answer generation with provider fallback
pub mod generation;

/// Document parsing, chunking, and content hashing
pub mod ingest;

/// Default filesystem locations
pub mod paths;

/// Persisted file-mapping and chunk-metadata registry
pub mod registry;

/// Query-time retrieval orchestration
pub mod retrieval;

/// Service facade and ingestion jobs
pub mod service;

/// Content synchronization and filesystem watching
pub mod sync;

/// Core data model and request/response types
pub mod types;

/// Vector store abstraction and Qdrant adapter
pub mod vector_db;
