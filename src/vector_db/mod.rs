//! Vector store abstraction with an explicit degraded mode
//!
//! One named collection with a fixed dimension and cosine distance. When the
//! backing store is unreachable or unconfigured, the client degrades to
//! no-ops: upserts succeed silently, searches return empty, counts return
//! zero. Callers treat empty results as "no context available", never as an
//! error.

mod qdrant;

pub use qdrant::QdrantVectorStore;

use crate::error::VectorStoreError;
use crate::types::{Chunk, ScoredChunk};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A (vector, payload) pair ready for persistence
#[derive(Debug, Clone)]
pub struct VectorPoint {
    /// Chunk identity (content hash)
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

/// Payload stored alongside each vector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub chunk_id: String,
    pub content: String,
    pub content_preview: String,
    pub source_path: String,
    pub source_section: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VectorPoint {
    /// Build a point from an identified chunk and its embedding
    pub fn from_chunk(chunk: &Chunk, vector: Vec<f32>) -> Self {
        Self {
            id: chunk.content_hash.clone(),
            vector,
            payload: ChunkPayload {
                chunk_id: chunk.content_hash.clone(),
                content: chunk.content.clone(),
                content_preview: chunk.content_preview.clone(),
                source_path: chunk.source_path.clone(),
                source_section: chunk.source_section.clone(),
                created_at: chunk.created_at,
                updated_at: chunk.updated_at,
            },
        }
    }
}

/// Trait for vector store operations
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    /// Idempotent create-if-absent of the collection and its payload indices
    async fn init(&self, dimension: usize) -> Result<(), VectorStoreError>;

    /// Upsert points, returning how many were written
    async fn upsert(&self, points: Vec<VectorPoint>) -> Result<usize, VectorStoreError>;

    /// Nearest-neighbor search, optionally restricted to one source path,
    /// returning results sorted by descending similarity
    async fn search(
        &self,
        vector: Vec<f32>,
        limit: usize,
        source_filter: Option<&str>,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError>;

    /// Delete points by chunk identity
    async fn delete(&self, ids: &[String]) -> Result<(), VectorStoreError>;

    /// Delete every point belonging to a source path
    async fn delete_by_source(&self, source_path: &str) -> Result<(), VectorStoreError>;

    /// Total number of stored points
    async fn count(&self) -> Result<usize, VectorStoreError>;

    /// True when the store is operating in no-op degraded mode
    fn is_degraded(&self) -> bool;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory store with brute-force cosine search, for unit tests
    #[derive(Default)]
    pub struct InMemoryVectorStore {
        points: Mutex<HashMap<String, (Vec<f32>, ChunkPayload)>>,
    }

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if na == 0.0 || nb == 0.0 {
            return 0.0;
        }
        dot / (na * nb)
    }

    #[async_trait::async_trait]
    impl VectorStore for InMemoryVectorStore {
        async fn init(&self, _dimension: usize) -> Result<(), VectorStoreError> {
            Ok(())
        }

        async fn upsert(&self, points: Vec<VectorPoint>) -> Result<usize, VectorStoreError> {
            let count = points.len();
            let mut map = self.points.lock().unwrap();
            for point in points {
                map.insert(point.id.clone(), (point.vector, point.payload));
            }
            Ok(count)
        }

        async fn search(
            &self,
            vector: Vec<f32>,
            limit: usize,
            source_filter: Option<&str>,
        ) -> Result<Vec<ScoredChunk>, VectorStoreError> {
            let map = self.points.lock().unwrap();
            let mut results: Vec<ScoredChunk> = map
                .values()
                .filter(|(_, payload)| {
                    source_filter.is_none_or(|f| payload.source_path == f)
                })
                .map(|(v, payload)| ScoredChunk {
                    id: payload.chunk_id.clone(),
                    score: cosine(&vector, v),
                    content: payload.content.clone(),
                    source_path: payload.source_path.clone(),
                    source_section: payload.source_section.clone(),
                    content_preview: payload.content_preview.clone(),
                })
                .collect();
            results.sort_by(|a, b| b.score.total_cmp(&a.score));
            results.truncate(limit);
            Ok(results)
        }

        async fn delete(&self, ids: &[String]) -> Result<(), VectorStoreError> {
            let mut map = self.points.lock().unwrap();
            for id in ids {
                map.remove(id);
            }
            Ok(())
        }

        async fn delete_by_source(&self, source_path: &str) -> Result<(), VectorStoreError> {
            let mut map = self.points.lock().unwrap();
            map.retain(|_, (_, payload)| payload.source_path != source_path);
            Ok(())
        }

        async fn count(&self) -> Result<usize, VectorStoreError> {
            Ok(self.points.lock().unwrap().len())
        }

        fn is_degraded(&self) -> bool {
            false
        }
    }
}
