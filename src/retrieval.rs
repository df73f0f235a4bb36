//! Retrieval orchestration: query embedding, similarity search, result
//! validation, and ranking

use crate::embedding::EmbeddingProvider;
use crate::error::RagError;
use crate::types::ScoredChunk;
use crate::vector_db::VectorStore;
use std::sync::Arc;

/// Turns a user query (optionally with a selected excerpt) into a ranked set
/// of context chunks
pub struct RetrievalOrchestrator {
    embedding: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    top_k: usize,
}

impl RetrievalOrchestrator {
    pub fn new(
        embedding: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        top_k: usize,
    ) -> Self {
        Self {
            embedding,
            store,
            top_k,
        }
    }

    /// Retrieve context chunks for a query
    ///
    /// With an excerpt present, the concatenation of excerpt and query is
    /// embedded so results stay relevant to both. A malformed result batch
    /// is discarded wholesale rather than partially trusted.
    pub async fn retrieve(
        &self,
        query: &str,
        selected_text: Option<&str>,
        source_filter: Option<&str>,
    ) -> Result<Vec<ScoredChunk>, RagError> {
        let embed_text = match selected_text {
            Some(excerpt) => format!("{} {}", excerpt, query),
            None => query.to_string(),
        };

        let vector = self.embedding.embed(&embed_text).await?;

        let results = self
            .store
            .search(vector, self.top_k, None)
            .await?;

        if !validate_results(&results) {
            tracing::warn!("Discarding malformed search result batch");
            return Ok(Vec::new());
        }

        let results = match source_filter {
            Some(source) => filter_by_source(results, source),
            None => results,
        };

        Ok(rank_results(results))
    }
}

/// Every result must carry an identity, content, and a finite score;
/// one malformed record poisons the whole batch
pub fn validate_results(results: &[ScoredChunk]) -> bool {
    results
        .iter()
        .all(|r| !r.id.is_empty() && !r.content.is_empty() && r.score.is_finite())
}

/// Sort by descending similarity score
pub fn rank_results(mut results: Vec<ScoredChunk>) -> Vec<ScoredChunk> {
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results
}

/// Keep only results whose source path contains the named source
pub fn filter_by_source(results: Vec<ScoredChunk>, source: &str) -> Vec<ScoredChunk> {
    results
        .into_iter()
        .filter(|r| r.source_path.contains(source))
        .collect()
}
