//! Top-level service facade wiring the pipeline together
//!
//! `RagService` owns explicitly constructed, dependency-injected components
//! (no process-wide singletons): embedding provider, vector store, retrieval
//! and generation orchestrators, response cache, and the sync registry. The
//! query pipeline runs cache check -> retrieval -> generation -> cache store
//! -> interaction log.

pub mod ingestion;

use crate::cache::ResponseCache;
use crate::config::Config;
use crate::embedding::{EmbeddingProvider, HttpEmbeddingProvider};
use crate::error::{RagError, ValidationError};
use crate::generation::GenerationOrchestrator;
use crate::registry::SyncRegistry;
use crate::retrieval::RetrievalOrchestrator;
use crate::sync::ContentSyncService;
use crate::types::{
    Citation, IngestJob, QueryMode, QueryRequest, QueryResponse, ScoredChunk, SyncStatus,
};
use crate::vector_db::{QdrantVectorStore, VectorStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Sink for chat interaction records
///
/// Session and log storage belong to an external collaborator; this trait
/// is the seam it plugs into. Logging is best-effort and never fails the
/// query pipeline.
#[async_trait::async_trait]
pub trait InteractionLog: Send + Sync {
    async fn log_interaction(
        &self,
        session_id: &str,
        query: &str,
        answer: &str,
        mode: QueryMode,
        selected_text: Option<&str>,
    );
}

/// Default interaction sink: structured log lines only
pub struct TracingInteractionLog;

#[async_trait::async_trait]
impl InteractionLog for TracingInteractionLog {
    async fn log_interaction(
        &self,
        session_id: &str,
        query: &str,
        answer: &str,
        mode: QueryMode,
        selected_text: Option<&str>,
    ) {
        tracing::info!(
            session_id,
            mode = ?mode,
            has_selection = selected_text.is_some(),
            query_len = query.len(),
            answer_len = answer.len(),
            "chat interaction"
        );
    }
}

/// Main service for querying and ingesting the corpus
#[derive(Clone)]
pub struct RagService {
    pub(crate) config: Arc<Config>,
    pub(crate) embedding: Arc<dyn EmbeddingProvider>,
    pub(crate) store: Arc<dyn VectorStore>,
    pub(crate) retrieval: Arc<RetrievalOrchestrator>,
    pub(crate) generation: Arc<GenerationOrchestrator>,
    pub(crate) cache: Arc<ResponseCache>,
    pub(crate) registry: Arc<RwLock<SyncRegistry>>,
    pub(crate) sync: ContentSyncService,
    pub(crate) interaction_log: Arc<dyn InteractionLog>,
    pub(crate) jobs: Arc<RwLock<HashMap<Uuid, IngestJob>>>,
}

impl RagService {
    /// Create a service with production wiring from configuration
    ///
    /// The vector store degrades to no-ops when unconfigured; the
    /// collection is initialized with the configured embedding dimension
    /// otherwise.
    pub async fn new(config: Config) -> Result<Self, RagError> {
        let embedding: Arc<dyn EmbeddingProvider> =
            Arc::new(HttpEmbeddingProvider::new(config.embedding.clone())?);
        let store: Arc<dyn VectorStore> =
            Arc::new(QdrantVectorStore::connect(&config.vector_store));
        let generation = GenerationOrchestrator::from_config(&config.generation);
        let interaction_log: Arc<dyn InteractionLog> = Arc::new(TracingInteractionLog);

        let service =
            Self::with_components(config, embedding, store, generation, interaction_log)?;

        if service.store.is_degraded() {
            tracing::warn!("Vector store is degraded; queries will run without context");
        } else {
            service
                .store
                .init(service.config.embedding.dimension)
                .await?;
        }

        Ok(service)
    }

    /// Create a service from explicit components (dependency injection)
    pub fn with_components(
        config: Config,
        embedding: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        generation: GenerationOrchestrator,
        interaction_log: Arc<dyn InteractionLog>,
    ) -> Result<Self, RagError> {
        config.validate()?;

        let registry = SyncRegistry::load(&config.cache.registry_path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load registry: {}, starting fresh", e);
            SyncRegistry::default()
        });
        let registry = Arc::new(RwLock::new(registry));

        let retrieval = Arc::new(RetrievalOrchestrator::new(
            embedding.clone(),
            store.clone(),
            config.generation.top_k,
        ));

        let cache = Arc::new(ResponseCache::new(
            Duration::from_secs(config.cache.session_ttl_secs),
            Duration::from_secs(config.cache.general_ttl_secs),
        ));

        let sync = ContentSyncService::new(&config, embedding.clone(), store.clone(), registry.clone());

        Ok(Self {
            config: Arc::new(config),
            embedding,
            store,
            retrieval,
            generation: Arc::new(generation),
            cache,
            registry,
            sync,
            interaction_log,
            jobs: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// The content sync service driving the watched docs tree
    pub fn sync(&self) -> &ContentSyncService {
        &self.sync
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Process a query through the full pipeline
    pub async fn process_query(&self, request: QueryRequest) -> Result<QueryResponse, RagError> {
        validate_query(&request)?;

        if let Some(cached) = self.cache.get(&request.query, &request.session_id) {
            tracing::info!("Returning cached response");
            self.interaction_log
                .log_interaction(
                    &request.session_id,
                    &request.query,
                    &cached.answer,
                    request.mode,
                    request.selected_text.as_deref(),
                )
                .await;
            return Ok(cached);
        }

        let chunks = self.gather_context(&request).await;

        let answer = self
            .generation
            .generate(&request.query, &chunks, request.mode)
            .await;

        let citations = build_citations(&chunks);
        let sources = answer
            .sources
            .iter()
            .filter(|s| s.as_str() != "user_selection")
            .cloned()
            .collect();

        let response = QueryResponse {
            answer: answer.text,
            sources,
            citations,
            retrieved_chunk_count: chunks.len(),
            degraded: answer.degraded,
            follow_up_questions: answer.follow_up_questions,
            tone_score: answer.tone_score,
        };

        // Degraded answers describe an outage; caching them would outlive it
        if !response.degraded {
            self.cache
                .store(&request.query, &response, &request.session_id);
        }

        self.interaction_log
            .log_interaction(
                &request.session_id,
                &request.query,
                &response.answer,
                request.mode,
                request.selected_text.as_deref(),
            )
            .await;

        Ok(response)
    }

    /// Current sync/corpus status
    pub async fn status(&self) -> SyncStatus {
        self.sync.status().await
    }

    /// Collect context chunks for a request
    ///
    /// In Local mode the excerpt itself leads the context at full score;
    /// retrieval failures degrade to "no context available" rather than
    /// surfacing to the caller.
    async fn gather_context(&self, request: &QueryRequest) -> Vec<ScoredChunk> {
        let mut chunks = Vec::new();

        if request.mode == QueryMode::Local
            && let Some(excerpt) = &request.selected_text
        {
            chunks.push(ScoredChunk {
                id: "selected_text".to_string(),
                score: 1.0,
                content: excerpt.clone(),
                source_path: "user_selection".to_string(),
                source_section: "Selected Text".to_string(),
                content_preview: excerpt.chars().take(crate::types::PREVIEW_LEN).collect(),
            });
        }

        let retrieved = self
            .retrieval
            .retrieve(
                &request.query,
                request.selected_text.as_deref(),
                request.source_filter.as_deref(),
            )
            .await;

        match retrieved {
            Ok(results) => chunks.extend(results),
            Err(e) => {
                tracing::warn!("Retrieval unavailable, continuing without context: {}", e);
            }
        }

        chunks
    }
}

/// Queries must be non-empty, at least 3 and at most 1000 characters
fn validate_query(request: &QueryRequest) -> Result<(), ValidationError> {
    let trimmed = request.query.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty("query".to_string()));
    }
    if trimmed.chars().count() < 3 {
        return Err(ValidationError::ConstraintViolation {
            field: "query".to_string(),
            constraint: "at least 3 characters".to_string(),
            actual: format!("{} characters", trimmed.chars().count()),
        });
    }
    if request.query.chars().count() > 1000 {
        return Err(ValidationError::ConstraintViolation {
            field: "query".to_string(),
            constraint: "at most 1000 characters".to_string(),
            actual: format!("{} characters", request.query.chars().count()),
        });
    }
    Ok(())
}

/// One citation per context chunk, with a bounded excerpt
fn build_citations(chunks: &[ScoredChunk]) -> Vec<Citation> {
    chunks
        .iter()
        .map(|chunk| Citation {
            source: chunk.source_path.clone(),
            section: chunk.source_section.clone(),
            excerpt: chunk
                .content_preview
                .chars()
                .take(crate::types::PREVIEW_LEN)
                .collect(),
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::embedding::test_support::MockEmbeddingProvider;
    use crate::generation::test_support::ScriptedProvider;
    use crate::generation::GenerationProvider;
    use crate::vector_db::test_support::InMemoryVectorStore;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Interaction sink that records what it was asked to log
    #[derive(Default)]
    pub struct RecordingLog {
        pub entries: Mutex<Vec<(String, String, String)>>,
    }

    #[async_trait::async_trait]
    impl InteractionLog for RecordingLog {
        async fn log_interaction(
            &self,
            session_id: &str,
            query: &str,
            answer: &str,
            _mode: QueryMode,
            _selected_text: Option<&str>,
        ) {
            self.entries.lock().unwrap().push((
                session_id.to_string(),
                query.to_string(),
                answer.to_string(),
            ));
        }
    }

    pub struct ServiceFixture {
        pub service: RagService,
        pub store: Arc<InMemoryVectorStore>,
        pub log: Arc<RecordingLog>,
        pub docs: TempDir,
        pub _state: TempDir,
    }

    /// Build a fully in-process service around scripted generation providers
    pub fn service_fixture(providers: Vec<Arc<dyn GenerationProvider>>) -> ServiceFixture {
        let docs = TempDir::new().unwrap();
        let state = TempDir::new().unwrap();

        let mut config = Config::default();
        config.sync.docs_root = docs.path().to_path_buf();
        config.cache.registry_path = state.path().join("registry.json");
        config.embedding.rate_limit_delay_ms = 0;
        config.generation.response_timeout_secs = 5;

        let store = Arc::new(InMemoryVectorStore::default());
        let log = Arc::new(RecordingLog::default());
        let generation = GenerationOrchestrator::with_providers(providers, &config.generation);

        let service = RagService::with_components(
            config,
            Arc::new(MockEmbeddingProvider::new(8)),
            store.clone(),
            generation,
            log.clone(),
        )
        .unwrap();

        ServiceFixture {
            service,
            store,
            log,
            docs,
            _state: state,
        }
    }

    pub fn answering_fixture(answer: &str) -> ServiceFixture {
        service_fixture(vec![
            Arc::new(ScriptedProvider::answering("primary", answer)) as Arc<dyn GenerationProvider>,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::generation::test_support::ScriptedProvider;
    use crate::generation::GenerationProvider;

    fn request(query: &str) -> QueryRequest {
        QueryRequest {
            query: query.to_string(),
            session_id: "session-1".to_string(),
            mode: QueryMode::Global,
            selected_text: None,
            source_filter: None,
        }
    }

    #[tokio::test]
    async fn test_query_validation() {
        let f = answering_fixture("answer");

        let empty = f.service.process_query(request("   ")).await.unwrap_err();
        assert!(empty.is_user_error());

        let short = f.service.process_query(request("hi")).await.unwrap_err();
        assert!(short.is_user_error());

        let long = f.service.process_query(request(&"x".repeat(1001))).await;
        assert!(long.unwrap_err().is_user_error());
    }

    #[tokio::test]
    async fn test_query_answers_and_logs() {
        let f = answering_fixture("Nodes are processes.");

        let response = f.service.process_query(request("What are nodes?")).await.unwrap();
        assert_eq!(response.answer, "Nodes are processes.");
        assert!(!response.degraded);

        let entries = f.log.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].1, "What are nodes?");
    }

    #[tokio::test]
    async fn test_cache_hit_skips_generation() {
        let provider = Arc::new(ScriptedProvider::answering("primary", "Cached answer."));
        let f = service_fixture(vec![provider.clone() as Arc<dyn GenerationProvider>]);

        let first = f.service.process_query(request("What are nodes?")).await.unwrap();
        // Answer + follow-up derivation both hit the provider
        let calls_after_first = provider.calls.load(std::sync::atomic::Ordering::SeqCst);

        let second = f.service.process_query(request("What are nodes?")).await.unwrap();
        assert_eq!(first.answer, second.answer);
        assert_eq!(
            provider.calls.load(std::sync::atomic::Ordering::SeqCst),
            calls_after_first
        );

        // Both the miss and the hit were logged
        assert_eq!(f.log.entries.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_degraded_answer_carries_marker_and_is_not_cached() {
        let f = service_fixture(vec![
            Arc::new(ScriptedProvider::failing("primary", "down")) as Arc<dyn GenerationProvider>,
        ]);

        let response = f.service.process_query(request("What are nodes?")).await.unwrap();
        assert!(response.degraded);

        // A second identical query runs the pipeline again (no cache hit)
        let again = f.service.process_query(request("What are nodes?")).await.unwrap();
        assert!(again.degraded);
        assert_eq!(f.log.entries.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_local_mode_grounds_on_excerpt() {
        let f = service_fixture(vec![
            Arc::new(ScriptedProvider::failing("primary", "down")) as Arc<dyn GenerationProvider>,
        ]);

        let mut req = request("What does this paragraph mean?");
        req.mode = QueryMode::Local;
        req.selected_text = Some("Actuators convert commands into joint motion.".to_string());

        let response = f.service.process_query(req).await.unwrap();
        // The degraded echo is grounded on the excerpt itself
        assert!(response.answer.contains("Actuators convert commands"));
        assert_eq!(response.retrieved_chunk_count, 1);
        assert_eq!(response.citations[0].source, "user_selection");
        // The user's own selection is not reported as a corpus source
        assert!(response.sources.is_empty());
    }

    #[tokio::test]
    async fn test_query_over_ingested_corpus_cites_sources() {
        let f = answering_fixture("Grounded answer.");

        let path = f.docs.path().join("nodes.mdx");
        std::fs::write(
            &path,
            "---\ntitle: Nodes\n---\n\n# Understanding Nodes\n\nA node is an independent process.",
        )
        .unwrap();
        f.service.sync().process_update(&path).await.unwrap();

        let response = f
            .service
            .process_query(request("What is a node exactly?"))
            .await
            .unwrap();

        assert!(response.retrieved_chunk_count > 0);
        assert_eq!(response.sources, vec!["/nodes.mdx".to_string()]);
        assert_eq!(response.citations[0].section, "Understanding Nodes");
    }

    #[tokio::test]
    async fn test_embedding_outage_degrades_to_empty_context() {
        use crate::embedding::test_support::MockEmbeddingProvider;
        use crate::generation::GenerationOrchestrator;
        use tempfile::TempDir;

        let docs = TempDir::new().unwrap();
        let state = TempDir::new().unwrap();
        let mut config = Config::default();
        config.sync.docs_root = docs.path().to_path_buf();
        config.cache.registry_path = state.path().join("registry.json");

        // Every embed call fails; retrieval must degrade, not error
        let embedding = Arc::new(MockEmbeddingProvider::failing_on(8, ""));
        let generation = GenerationOrchestrator::with_providers(
            vec![Arc::new(ScriptedProvider::answering("p", "No-context answer."))
                as Arc<dyn GenerationProvider>],
            &config.generation,
        );
        let service = RagService::with_components(
            config,
            embedding,
            Arc::new(crate::vector_db::test_support::InMemoryVectorStore::default()),
            generation,
            Arc::new(TracingInteractionLog),
        )
        .unwrap();

        let response = service.process_query(request("What are nodes?")).await.unwrap();
        assert_eq!(response.retrieved_chunk_count, 0);
        assert_eq!(response.answer, "No-context answer.");
    }
}
