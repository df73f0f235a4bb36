//! Persisted sync registry: file mappings and the chunk-metadata mirror
//!
//! This is the pipeline's durable record of what was ingested: one
//! `FileMapping` per source file and one `ChunkRecord` per stored chunk,
//! serialized as JSON. Chat sessions and chat logs live with an external
//! collaborator and are not mirrored here.

use crate::error::RegistryError;
use crate::types::{Chunk, EmbeddingStatus, FileMapping, ProcessingStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Mirror record for one stored chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub content_hash: String,
    pub source_path: String,
    pub source_section: String,
    pub embedding_status: EmbeddingStatus,
    pub updated_at: DateTime<Utc>,
}

impl ChunkRecord {
    pub fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            content_hash: chunk.content_hash.clone(),
            source_path: chunk.source_path.clone(),
            source_section: chunk.source_section.clone(),
            embedding_status: chunk.embedding_status,
            updated_at: chunk.updated_at,
        }
    }
}

/// On-disk registry of file mappings and chunk records
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SyncRegistry {
    /// Map of original file path -> mapping record
    pub mappings: HashMap<String, FileMapping>,
    /// Map of content hash -> chunk record
    pub chunks: HashMap<String, ChunkRecord>,
}

impl SyncRegistry {
    /// Load the registry from disk, starting empty when the file is absent
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        if !path.exists() {
            tracing::debug!("Registry file not found, starting with empty registry");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| RegistryError::LoadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let registry: SyncRegistry = serde_json::from_str(&content)
            .map_err(|e| RegistryError::ParseFailed(e.to_string()))?;

        tracing::info!(
            "Loaded registry with {} file mappings and {} chunk records",
            registry.mappings.len(),
            registry.chunks.len()
        );
        Ok(registry)
    }

    /// Save the registry to disk
    pub fn save(&self, path: &Path) -> Result<(), RegistryError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| RegistryError::SaveFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| RegistryError::SaveFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        fs::write(path, content).map_err(|e| RegistryError::SaveFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        tracing::debug!("Saved registry to {:?}", path);
        Ok(())
    }

    pub fn mapping(&self, original_path: &str) -> Option<&FileMapping> {
        self.mappings.get(original_path)
    }

    /// Create or update the mapping for a file entering a fresh ingestion
    /// cycle
    pub fn begin_cycle(&mut self, original_path: &str) {
        let entry = self
            .mappings
            .entry(original_path.to_string())
            .or_insert_with(|| FileMapping {
                original_path: original_path.to_string(),
                chunk_count: 0,
                file_hash: String::new(),
                last_processed: Utc::now(),
                processing_status: ProcessingStatus::Pending,
            });
        entry.processing_status = ProcessingStatus::InProgress;
        entry.last_processed = Utc::now();
    }

    /// Finish an ingestion cycle with a terminal status
    pub fn finish_cycle(
        &mut self,
        original_path: &str,
        status: ProcessingStatus,
        chunk_count: usize,
        file_hash: String,
    ) {
        if let Some(entry) = self.mappings.get_mut(original_path) {
            entry.processing_status = status;
            entry.chunk_count = chunk_count;
            entry.file_hash = file_hash;
            entry.last_processed = Utc::now();
        }
    }

    /// Tombstone a mapping; the entry stays for audit, marked deleted
    pub fn mark_deleted(&mut self, original_path: &str) {
        if let Some(entry) = self.mappings.get_mut(original_path) {
            entry.processing_status = ProcessingStatus::Deleted;
            entry.chunk_count = 0;
            entry.last_processed = Utc::now();
        }
    }

    /// Chunk identities currently recorded for a source path
    pub fn chunk_ids_for_source(&self, source_path: &str) -> Vec<String> {
        self.chunks
            .values()
            .filter(|record| record.source_path == source_path)
            .map(|record| record.content_hash.clone())
            .collect()
    }

    /// Replace every chunk record of a source path with a fresh set
    pub fn replace_chunks_for_source(&mut self, source_path: &str, records: Vec<ChunkRecord>) {
        self.chunks
            .retain(|_, record| record.source_path != source_path);
        for record in records {
            self.chunks.insert(record.content_hash.clone(), record);
        }
    }

    /// Drop every chunk record of a source path, returning the removed ids
    pub fn remove_chunks_for_source(&mut self, source_path: &str) -> Vec<String> {
        let ids = self.chunk_ids_for_source(source_path);
        for id in &ids {
            self.chunks.remove(id);
        }
        ids
    }

    pub fn set_chunk_status(&mut self, content_hash: &str, status: EmbeddingStatus) {
        if let Some(record) = self.chunks.get_mut(content_hash) {
            record.embedding_status = status;
            record.updated_at = Utc::now();
        }
    }

    /// Count mappings in the given processing status
    pub fn count_by_status(&self, status: ProcessingStatus) -> usize {
        self.mappings
            .values()
            .filter(|m| m.processing_status == status)
            .count()
    }
}
