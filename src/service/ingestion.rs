//! Ingestion job entrypoint for collaborator API layers
//!
//! Submitting a document returns a job id immediately; the pipeline runs in
//! the background, reporting progress through the job table.

use super::RagService;
use crate::embedding;
use crate::error::{RagError, ValidationError};
use crate::ingest::{ContentHasher, DocumentParser, SemanticChunker};
use crate::registry::ChunkRecord;
use crate::types::{
    EmbeddingStatus, IngestJob, IngestRequest, JobStatus, ProcessingStatus,
};
use crate::vector_db::VectorPoint;
use chrono::Utc;
use std::time::Duration;
use uuid::Uuid;

impl RagService {
    /// Submit a document for ingestion, returning the job identifier
    pub async fn ingest_document(&self, request: IngestRequest) -> Result<Uuid, RagError> {
        if request.document_path.trim().is_empty() {
            return Err(ValidationError::Empty("document_path".to_string()).into());
        }
        if request.content_text.trim().is_empty() {
            return Err(ValidationError::Empty("content_text".to_string()).into());
        }

        let job_id = Uuid::new_v4();
        self.update_job(job_id, JobStatus::Processing, 0, "Starting content processing")
            .await;

        let service = self.clone();
        tokio::spawn(async move {
            run_ingest_job(service, job_id, request).await;
        });

        Ok(job_id)
    }

    /// Status snapshot of an ingestion job
    pub async fn job_status(&self, job_id: &Uuid) -> Option<IngestJob> {
        self.jobs.read().await.get(job_id).cloned()
    }

    pub(crate) async fn update_job(
        &self,
        job_id: Uuid,
        status: JobStatus,
        progress: u8,
        details: &str,
    ) {
        let mut jobs = self.jobs.write().await;
        jobs.insert(
            job_id,
            IngestJob {
                id: job_id,
                status,
                progress,
                details: details.to_string(),
                updated_at: Utc::now(),
            },
        );
    }
}

/// Parse -> chunk -> hash -> embed -> store, with staged progress updates
async fn run_ingest_job(service: RagService, job_id: Uuid, request: IngestRequest) {
    match ingest_pipeline(&service, job_id, &request).await {
        Ok(stored) => {
            service
                .update_job(
                    job_id,
                    JobStatus::Completed,
                    100,
                    &format!("Successfully processed and stored {} chunks", stored),
                )
                .await;
            tracing::info!("Ingestion job {} completed: {} chunks stored", job_id, stored);
        }
        Err(e) => {
            service
                .update_job(
                    job_id,
                    JobStatus::Failed,
                    100,
                    &format!("Error during processing: {}", e),
                )
                .await;
            tracing::error!("Ingestion job {} failed: {}", job_id, e);
        }
    }
}

async fn ingest_pipeline(
    service: &RagService,
    job_id: Uuid,
    request: &IngestRequest,
) -> Result<usize, RagError> {
    let config = service.config();

    service
        .update_job(job_id, JobStatus::Processing, 10, "Parsing content")
        .await;

    let parser = DocumentParser::new(
        config.sync.docs_root.clone(),
        config.sync.extensions.clone(),
    );
    let mut doc = parser.parse_content(&request.content_text, &request.document_path);
    if !request.title.is_empty() {
        doc.title = request.title.clone();
    }

    service
        .update_job(job_id, JobStatus::Processing, 30, "Chunking content")
        .await;

    let chunker = SemanticChunker::new(config.chunking.max_chunk_size, config.chunking.overlap);
    let mut chunks = chunker.chunk_document(&doc);
    ContentHasher::assign_identities(&mut chunks);
    let mut chunks = ContentHasher::filter_unique(chunks);

    service
        .update_job(
            job_id,
            JobStatus::Processing,
            50,
            &format!("Generating embeddings for {} chunks", chunks.len()),
        )
        .await;

    for chunk in &mut chunks {
        chunk.advance_status(EmbeddingStatus::InProgress);
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
    let results = embedding::embed_batch_parallel(
        service.embedding.clone(),
        texts,
        config.embedding.concurrency,
        Duration::from_millis(config.embedding.rate_limit_delay_ms),
    )
    .await;

    let mut points = Vec::new();
    for (chunk, result) in chunks.iter_mut().zip(results) {
        match result {
            Ok(vector) => {
                chunk.advance_status(EmbeddingStatus::Processed);
                points.push(VectorPoint::from_chunk(chunk, vector));
            }
            Err(e) => {
                tracing::warn!("Embedding failed for ingested chunk: {}", e);
                chunk.advance_status(EmbeddingStatus::Failed);
            }
        }
    }

    service
        .update_job(
            job_id,
            JobStatus::Processing,
            80,
            &format!("Storing {} chunks in vector storage", points.len()),
        )
        .await;

    let stored = service.store.upsert(points).await?;

    let records: Vec<ChunkRecord> = chunks.iter().map(ChunkRecord::from_chunk).collect();
    let chunk_count = records.len();
    {
        let mut registry = service.registry.write().await;
        registry.begin_cycle(&request.document_path);
        registry.replace_chunks_for_source(&request.document_path, records);
        registry.finish_cycle(
            &request.document_path,
            ProcessingStatus::Completed,
            chunk_count,
            ContentHasher::file_hash(&request.content_text),
        );
        if let Err(e) = registry.save(&config.cache.registry_path) {
            tracing::warn!("Failed to save registry: {}", e);
        }
    }

    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support::answering_fixture;
    use crate::vector_db::VectorStore;

    async fn wait_for_terminal(
        service: &RagService,
        job_id: Uuid,
    ) -> IngestJob {
        for _ in 0..100 {
            if let Some(job) = service.job_status(&job_id).await
                && job.status != JobStatus::Processing
            {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("ingestion job did not finish");
    }

    fn ingest_request() -> IngestRequest {
        IngestRequest {
            document_path: "/ros2/nodes.mdx".to_string(),
            title: "Nodes".to_string(),
            content_text: "# Understanding Nodes\n\nA node is an independent process.".to_string(),
            metadata: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn test_ingest_document_completes_and_stores_chunks() {
        let f = answering_fixture("unused");

        let job_id = f.service.ingest_document(ingest_request()).await.unwrap();
        let job = wait_for_terminal(&f.service, job_id).await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert!(job.details.contains("stored"));
        assert!(f.store.count().await.unwrap() > 0);

        let registry = f.service.registry.read().await;
        let mapping = registry.mapping("/ros2/nodes.mdx").unwrap();
        assert_eq!(mapping.processing_status, ProcessingStatus::Completed);
        assert!(!registry.chunk_ids_for_source("/ros2/nodes.mdx").is_empty());
    }

    #[tokio::test]
    async fn test_ingest_document_validates_input() {
        let f = answering_fixture("unused");

        let mut empty_path = ingest_request();
        empty_path.document_path = "  ".to_string();
        assert!(f.service.ingest_document(empty_path).await.is_err());

        let mut empty_content = ingest_request();
        empty_content.content_text = String::new();
        assert!(f.service.ingest_document(empty_content).await.is_err());
    }

    #[tokio::test]
    async fn test_job_status_unknown_id_is_none() {
        let f = answering_fixture("unused");
        assert!(f.service.job_status(&Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn test_job_visible_immediately_after_submit() {
        let f = answering_fixture("unused");
        let job_id = f.service.ingest_document(ingest_request()).await.unwrap();

        let job = f.service.job_status(&job_id).await.unwrap();
        assert_eq!(job.id, job_id);
        // Either still processing or already terminal, never absent
        wait_for_terminal(&f.service, job_id).await;
    }
}
