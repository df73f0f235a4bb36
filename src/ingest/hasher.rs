use crate::types::Chunk;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Deterministic chunk identity and batch deduplication
///
/// A chunk's identity is a pure function of (content, source path, source
/// section): identical inputs always produce the same hash, which is what
/// makes re-ingestion of an unchanged file idempotent.
pub struct ContentHasher;

impl ContentHasher {
    /// Hash of the canonical `content::source_path::source_section` string
    pub fn content_hash(content: &str, source_path: &str, source_section: &str) -> String {
        let combined = format!("{}::{}::{}", content, source_path, source_section);
        let digest = Sha256::digest(combined.as_bytes());
        format!("{:x}", digest)
    }

    /// Hash of a whole file's raw content, used for change detection
    pub fn file_hash(raw: &str) -> String {
        format!("{:x}", Sha256::digest(raw.as_bytes()))
    }

    /// Assign identities to a batch of chunks
    ///
    /// Idempotent: chunks that already carry an identity are left untouched.
    pub fn assign_identities(chunks: &mut [Chunk]) {
        for chunk in chunks.iter_mut() {
            if chunk.content_hash.is_empty() {
                chunk.content_hash = Self::content_hash(
                    &chunk.content,
                    &chunk.source_path,
                    &chunk.source_section,
                );
            }
        }
    }

    /// Keep only the first occurrence per identity, in input order
    pub fn filter_unique(chunks: Vec<Chunk>) -> Vec<Chunk> {
        let mut seen = HashSet::new();
        chunks
            .into_iter()
            .filter(|chunk| seen.insert(chunk.content_hash.clone()))
            .collect()
    }

    /// Return every subsequent occurrence per identity, for auditing
    pub fn detect_duplicates(chunks: &[Chunk]) -> Vec<Chunk> {
        let mut seen = HashSet::new();
        chunks
            .iter()
            .filter(|chunk| !seen.insert(chunk.content_hash.clone()))
            .cloned()
            .collect()
    }
}
