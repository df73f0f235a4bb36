//! Content synchronization: watches the docs tree and incrementally
//! re-ingests changed files
//!
//! A debounced watcher feeds `FileChangeEvent`s into a bounded queue; a
//! single consumer loop drains it, re-running the parse -> chunk -> hash ->
//! embed -> store pipeline per file. Every per-file failure is local to
//! that file and recorded in its `FileMapping`.

mod watcher;

pub use watcher::DocWatcher;

use crate::config::Config;
use crate::embedding::{self, EmbeddingProvider};
use crate::error::{ParseError, RagError};
use crate::ingest::{ContentHasher, DocumentParser, SemanticChunker};
use crate::registry::{ChunkRecord, SyncRegistry};
use crate::types::{
    ChangeKind, EmbeddingStatus, FileChangeEvent, ProcessingStatus, SyncStatus,
};
use crate::vector_db::{VectorPoint, VectorStore};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex, RwLock};

/// Capacity of the change-event queue between the watcher and the consumer
const CHANGE_QUEUE_CAPACITY: usize = 256;

/// Outcome of a full-tree resync
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

struct RunningWatch {
    watcher: DocWatcher,
    consumer: tokio::task::JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

/// Drives incremental re-ingestion of the watched document tree
#[derive(Clone)]
pub struct ContentSyncService {
    parser: Arc<DocumentParser>,
    chunker: Arc<SemanticChunker>,
    embedding: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    registry: Arc<RwLock<SyncRegistry>>,
    registry_path: PathBuf,
    docs_root: PathBuf,
    debounce: Duration,
    extensions: Vec<String>,
    embed_concurrency: usize,
    rate_limit_delay: Duration,
    running: Arc<Mutex<Option<RunningWatch>>>,
}

impl ContentSyncService {
    pub fn new(
        config: &Config,
        embedding: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        registry: Arc<RwLock<SyncRegistry>>,
    ) -> Self {
        let parser = DocumentParser::new(
            config.sync.docs_root.clone(),
            config.sync.extensions.clone(),
        );
        let chunker = SemanticChunker::new(
            config.chunking.max_chunk_size,
            config.chunking.overlap,
        );

        Self {
            parser: Arc::new(parser),
            chunker: Arc::new(chunker),
            embedding,
            store,
            registry,
            registry_path: config.cache.registry_path.clone(),
            docs_root: config.sync.docs_root.clone(),
            debounce: Duration::from_millis(config.sync.debounce_ms),
            extensions: config.sync.extensions.clone(),
            embed_concurrency: config.embedding.concurrency,
            rate_limit_delay: Duration::from_millis(config.embedding.rate_limit_delay_ms),
            running: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the watcher and the consumer loop; starting twice is a no-op
    pub async fn start(&self) -> Result<(), RagError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            tracing::info!("Content sync service already running");
            return Ok(());
        }

        let (tx, mut rx) = mpsc::channel(CHANGE_QUEUE_CAPACITY);
        let watcher = DocWatcher::spawn(&self.docs_root, self.debounce, self.extensions.clone(), tx)?;

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let service = self.clone();
        let consumer = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    event = rx.recv() => match event {
                        Some(event) => service.handle_event(event).await,
                        None => break,
                    },
                }
            }
            tracing::debug!("Sync consumer loop stopped");
        });

        *running = Some(RunningWatch {
            watcher,
            consumer,
            shutdown: shutdown_tx,
        });

        tracing::info!("Started content sync for {}", self.docs_root.display());
        Ok(())
    }

    /// Stop the watcher and join the consumer; stopping twice is a no-op
    pub async fn stop(&self) {
        let taken = self.running.lock().await.take();
        let Some(run) = taken else {
            return;
        };

        let RunningWatch {
            watcher,
            consumer,
            shutdown,
        } = run;

        let _ = shutdown.send(true);
        drop(watcher);
        if let Err(e) = consumer.await {
            tracing::warn!("Sync consumer did not shut down cleanly: {}", e);
        }

        tracing::info!("Stopped content sync");
    }

    pub async fn is_watching(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Dispatch one change event; failures stay local to the file
    pub async fn handle_event(&self, event: FileChangeEvent) {
        match event.kind {
            ChangeKind::Created | ChangeKind::Modified => {
                if let Err(e) = self.process_update(&event.path).await {
                    tracing::error!(
                        "Failed to process update for {}: {}",
                        event.path.display(),
                        e
                    );
                }
            }
            ChangeKind::Deleted => {
                if let Err(e) = self.process_deletion(&event.path).await {
                    tracing::error!(
                        "Failed to process deletion for {}: {}",
                        event.path.display(),
                        e
                    );
                }
            }
        }
    }

    /// Re-ingest one file, updating its mapping through a full cycle
    pub async fn process_update(&self, path: &Path) -> Result<usize, RagError> {
        let key = path.to_string_lossy().to_string();
        tracing::info!("Processing content update for {}", key);

        self.registry.write().await.begin_cycle(&key);

        match self.ingest_file(path).await {
            Ok((chunk_count, file_hash)) => {
                let mut registry = self.registry.write().await;
                registry.finish_cycle(&key, ProcessingStatus::Completed, chunk_count, file_hash);
                if let Err(e) = registry.save(&self.registry_path) {
                    tracing::warn!("Failed to save registry: {}", e);
                }
                tracing::info!("Processed {} chunks for {}", chunk_count, key);
                Ok(chunk_count)
            }
            Err(e) => {
                let mut registry = self.registry.write().await;
                registry.finish_cycle(&key, ProcessingStatus::Failed, 0, String::new());
                if let Err(save_err) = registry.save(&self.registry_path) {
                    tracing::warn!("Failed to save registry: {}", save_err);
                }
                Err(e)
            }
        }
    }

    /// Remove a deleted file's vectors and records, tombstoning its mapping
    pub async fn process_deletion(&self, path: &Path) -> Result<(), RagError> {
        let key = path.to_string_lossy().to_string();
        let source_path = self.parser.source_path_for(path);
        tracing::info!("Processing content deletion for {}", key);

        let removed = {
            let mut registry = self.registry.write().await;
            registry.remove_chunks_for_source(&source_path)
        };

        self.store.delete_by_source(&source_path).await?;

        let mut registry = self.registry.write().await;
        registry.mark_deleted(&key);
        if let Err(e) = registry.save(&self.registry_path) {
            tracing::warn!("Failed to save registry: {}", e);
        }

        tracing::info!("Removed {} chunks for deleted file {}", removed.len(), key);
        Ok(())
    }

    /// Walk the whole tree and re-ingest every file
    ///
    /// Resumable: files whose content hash is unchanged since their last
    /// completed cycle are skipped unless `force` is set. Per-file
    /// failures do not stop the sweep.
    pub async fn sync_all(&self, force: bool) -> SyncReport {
        let files = self.parser.walk_documents();
        tracing::info!("Syncing {} files (force={})", files.len(), force);

        let mut report = SyncReport::default();
        for file in files {
            if !force && !self.needs_update(&file).await {
                report.skipped += 1;
                continue;
            }

            match self.process_update(&file).await {
                Ok(_) => report.processed += 1,
                Err(e) => {
                    tracing::error!("Sync failed for {}: {}", file.display(), e);
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            "Sync complete: {} processed, {} skipped, {} failed",
            report.processed,
            report.skipped,
            report.failed
        );
        report
    }

    /// Re-ingest one file immediately, bypassing the event queue
    pub async fn force_resync_file(&self, path: &Path) -> Result<usize, RagError> {
        self.process_update(path).await
    }

    /// Current synchronization status
    pub async fn status(&self) -> SyncStatus {
        let vector_count = self.store.count().await.unwrap_or(0);
        let registry = self.registry.read().await;

        SyncStatus {
            total_files: registry.mappings.len(),
            completed_files: registry.count_by_status(ProcessingStatus::Completed),
            in_progress_files: registry.count_by_status(ProcessingStatus::InProgress),
            failed_files: registry.count_by_status(ProcessingStatus::Failed),
            deleted_files: registry.count_by_status(ProcessingStatus::Deleted),
            vector_count,
            is_watching: self.is_watching().await,
        }
    }

    /// Whether a file changed since its last completed cycle
    async fn needs_update(&self, path: &Path) -> bool {
        let Ok(raw) = std::fs::read_to_string(path) else {
            return true;
        };
        let file_hash = ContentHasher::file_hash(&raw);
        let key = path.to_string_lossy().to_string();

        let registry = self.registry.read().await;
        match registry.mapping(&key) {
            Some(mapping) => {
                mapping.processing_status != ProcessingStatus::Completed
                    || mapping.file_hash != file_hash
            }
            None => true,
        }
    }

    /// The parse -> chunk -> hash -> embed -> store pipeline for one file
    ///
    /// Per-chunk embedding failures mark that chunk failed and continue;
    /// only read and store-level errors abort the file.
    async fn ingest_file(&self, path: &Path) -> Result<(usize, String), RagError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ParseError::ReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let file_hash = ContentHasher::file_hash(&raw);
        let source_path = self.parser.source_path_for(path);

        let doc = self.parser.parse_content(&raw, &source_path);
        let mut chunks = self.chunker.chunk_document(&doc);
        ContentHasher::assign_identities(&mut chunks);
        let mut chunks = ContentHasher::filter_unique(chunks);

        for chunk in &mut chunks {
            chunk.advance_status(EmbeddingStatus::InProgress);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let results = embedding::embed_batch_parallel(
            self.embedding.clone(),
            texts,
            self.embed_concurrency,
            self.rate_limit_delay,
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
                    tracing::warn!(
                        "Embedding failed for chunk {}: {}",
                        &chunk.content_hash[..8.min(chunk.content_hash.len())],
                        e
                    );
                    chunk.advance_status(EmbeddingStatus::Failed);
                }
            }
        }

        // Drop vectors that belonged to the previous version of this file
        let new_ids: HashSet<&str> = chunks.iter().map(|c| c.content_hash.as_str()).collect();
        let stale: Vec<String> = {
            let registry = self.registry.read().await;
            registry
                .chunk_ids_for_source(&source_path)
                .into_iter()
                .filter(|id| !new_ids.contains(id.as_str()))
                .collect()
        };
        if !stale.is_empty() {
            self.store.delete(&stale).await?;
        }

        self.store.upsert(points).await?;

        let records: Vec<ChunkRecord> = chunks.iter().map(ChunkRecord::from_chunk).collect();
        let chunk_count = records.len();
        self.registry
            .write()
            .await
            .replace_chunks_for_source(&source_path, records);

        Ok((chunk_count, file_hash))
    }
}
