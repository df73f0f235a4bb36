use super::{VectorPoint, VectorStore};
use crate::config::VectorStoreConfig;
use crate::error::VectorStoreError;
use crate::types::ScoredChunk;
use qdrant_client::qdrant::vectors_config::Config;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder,
    DeletePointsBuilder, Distance, FieldType, Filter, PointStruct, PointsIdsList,
    SearchPointsBuilder, UpsertPointsBuilder, VectorParams, VectorsConfig,
};
use qdrant_client::{Payload, Qdrant};
use uuid::Uuid;

/// Qdrant-backed vector store
///
/// Operates in degraded no-op mode when no URL is configured or the client
/// cannot be constructed: upserts succeed silently, searches return empty
/// result sets, and counts return zero.
pub struct QdrantVectorStore {
    client: Option<Qdrant>,
    collection: String,
}

/// Qdrant point ids must be UUIDs; derive one deterministically from the
/// leading bytes of the chunk's content hash
fn point_uuid(chunk_id: &str) -> String {
    let mut bytes = [0u8; 16];
    for (i, byte) in bytes.iter_mut().enumerate() {
        let hex = chunk_id.get(i * 2..i * 2 + 2).unwrap_or("00");
        *byte = u8::from_str_radix(hex, 16).unwrap_or(0);
    }
    Uuid::from_bytes(bytes).to_string()
}

impl QdrantVectorStore {
    /// Connect to Qdrant, or fall back to degraded mode when unconfigured
    pub fn connect(config: &VectorStoreConfig) -> Self {
        if config.url.is_empty() {
            tracing::warn!("Qdrant URL not configured, vector store running in degraded mode");
            return Self {
                client: None,
                collection: config.collection_name.clone(),
            };
        }

        tracing::info!("Connecting to Qdrant at {}", config.url);
        let mut builder = Qdrant::from_url(&config.url);
        if !config.api_key.is_empty() {
            builder = builder.api_key(config.api_key.clone());
        }

        match builder.build() {
            Ok(client) => Self {
                client: Some(client),
                collection: config.collection_name.clone(),
            },
            Err(e) => {
                tracing::warn!(
                    "Failed to create Qdrant client ({}), vector store running in degraded mode",
                    e
                );
                Self {
                    client: None,
                    collection: config.collection_name.clone(),
                }
            }
        }
    }

    async fn collection_exists(&self, client: &Qdrant) -> Result<bool, VectorStoreError> {
        let collections = client
            .list_collections()
            .await
            .map_err(|e| VectorStoreError::ConnectionFailed(e.to_string()))?;

        Ok(collections
            .collections
            .iter()
            .any(|c| c.name == self.collection))
    }
}

#[async_trait::async_trait]
impl VectorStore for QdrantVectorStore {
    async fn init(&self, dimension: usize) -> Result<(), VectorStoreError> {
        let Some(client) = &self.client else {
            return Ok(());
        };

        if self.collection_exists(client).await? {
            tracing::info!("Collection '{}' already exists", self.collection);
            return Ok(());
        }

        tracing::info!(
            "Creating collection '{}' with dimension {}",
            self.collection,
            dimension
        );

        client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection).vectors_config(VectorsConfig {
                    config: Some(Config::Params(VectorParams {
                        size: dimension as u64,
                        distance: Distance::Cosine.into(),
                        ..Default::default()
                    })),
                }),
            )
            .await
            .map_err(|e| VectorStoreError::CollectionCreationFailed {
                collection: self.collection.clone(),
                reason: e.to_string(),
            })?;

        // Keyword index on source_path enables filtered search and
        // per-file deletion without a full scan
        client
            .create_field_index(CreateFieldIndexCollectionBuilder::new(
                &self.collection,
                "source_path",
                FieldType::Keyword,
            ))
            .await
            .map_err(|e| VectorStoreError::CollectionCreationFailed {
                collection: self.collection.clone(),
                reason: format!("payload index: {}", e),
            })?;

        Ok(())
    }

    async fn upsert(&self, points: Vec<VectorPoint>) -> Result<usize, VectorStoreError> {
        let Some(client) = &self.client else {
            tracing::debug!("Degraded mode: skipping upsert of {} points", points.len());
            return Ok(points.len());
        };

        if points.is_empty() {
            return Ok(0);
        }

        let count = points.len();
        tracing::debug!("Upserting {} points", count);

        let mut structs = Vec::with_capacity(count);
        for point in points {
            let payload: Payload = serde_json::json!({
                "chunk_id": point.payload.chunk_id,
                "content": point.payload.content,
                "content_preview": point.payload.content_preview,
                "source_path": point.payload.source_path,
                "source_section": point.payload.source_section,
                "created_at": point.payload.created_at.to_rfc3339(),
                "updated_at": point.payload.updated_at.to_rfc3339(),
            })
            .try_into()
            .map_err(|e| VectorStoreError::UpsertFailed(format!("payload: {}", e)))?;

            structs.push(PointStruct::new(point_uuid(&point.id), point.vector, payload));
        }

        client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, structs))
            .await
            .map_err(|e| VectorStoreError::UpsertFailed(e.to_string()))?;

        Ok(count)
    }

    async fn search(
        &self,
        vector: Vec<f32>,
        limit: usize,
        source_filter: Option<&str>,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError> {
        let Some(client) = &self.client else {
            tracing::debug!("Degraded mode: returning empty search results");
            return Ok(Vec::new());
        };

        let mut builder =
            SearchPointsBuilder::new(&self.collection, vector, limit as u64).with_payload(true);

        if let Some(source) = source_filter {
            builder = builder.filter(Filter::must([Condition::matches(
                "source_path",
                source.to_string(),
            )]));
        }

        let response = client
            .search_points(builder)
            .await
            .map_err(|e| VectorStoreError::SearchFailed(e.to_string()))?;

        let results = response
            .result
            .into_iter()
            .map(|point| {
                let payload = point.payload;
                let field = |key: &str| {
                    payload
                        .get(key)
                        .and_then(|v| v.as_str().map(String::from))
                        .unwrap_or_default()
                };

                ScoredChunk {
                    id: field("chunk_id"),
                    score: point.score,
                    content: field("content"),
                    source_path: field("source_path"),
                    source_section: field("source_section"),
                    content_preview: field("content_preview"),
                }
            })
            .collect();

        Ok(results)
    }

    async fn delete(&self, ids: &[String]) -> Result<(), VectorStoreError> {
        let Some(client) = &self.client else {
            return Ok(());
        };

        if ids.is_empty() {
            return Ok(());
        }

        tracing::debug!("Deleting {} points", ids.len());
        let point_ids = PointsIdsList {
            ids: ids.iter().map(|id| point_uuid(id).into()).collect(),
        };

        client
            .delete_points(DeletePointsBuilder::new(&self.collection).points(point_ids))
            .await
            .map_err(|e| VectorStoreError::DeleteFailed(e.to_string()))?;

        Ok(())
    }

    async fn delete_by_source(&self, source_path: &str) -> Result<(), VectorStoreError> {
        let Some(client) = &self.client else {
            return Ok(());
        };

        tracing::debug!("Deleting points for source: {}", source_path);
        let filter = Filter::must([Condition::matches("source_path", source_path.to_string())]);

        client
            .delete_points(DeletePointsBuilder::new(&self.collection).points(filter))
            .await
            .map_err(|e| VectorStoreError::DeleteFailed(e.to_string()))?;

        Ok(())
    }

    async fn count(&self) -> Result<usize, VectorStoreError> {
        let Some(client) = &self.client else {
            return Ok(0);
        };

        let response = client
            .count(CountPointsBuilder::new(&self.collection).exact(true))
            .await
            .map_err(|e| VectorStoreError::CountFailed(e.to_string()))?;

        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }

    fn is_degraded(&self) -> bool {
        self.client.is_none()
    }
}
