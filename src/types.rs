use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of characters kept as a chunk's content preview
pub const PREVIEW_LEN: usize = 200;

/// A heading extracted from a source document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    /// Heading level (1-6)
    pub level: usize,
    /// Heading title text
    pub text: String,
    /// Character offset of the heading line in the raw document
    pub offset: usize,
}

/// A parsed source document, immutable once produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedDocument {
    /// Source path, rooted at the watch directory (e.g. "/ros2/nodes.mdx")
    pub source_path: String,
    /// Title from front-matter, or empty if absent
    pub title: String,
    /// Ordered headings with their offsets in the raw content
    pub headings: Vec<Heading>,
    /// Cleaned body text (code and markup stripped, whitespace collapsed)
    pub content: String,
}

/// Embedding lifecycle of a chunk
///
/// Transitions are monotonic: pending -> in_progress -> {processed, failed}.
/// No path leads back to pending once left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingStatus {
    Pending,
    InProgress,
    Processed,
    Failed,
}

impl EmbeddingStatus {
    /// Whether a transition to `next` is allowed
    pub fn can_advance_to(self, next: EmbeddingStatus) -> bool {
        use EmbeddingStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress) | (InProgress, Processed) | (InProgress, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, EmbeddingStatus::Processed | EmbeddingStatus::Failed)
    }
}

/// A bounded unit of source text, embedded and stored independently
///
/// Identity is `content_hash`, a pure function of
/// (content, source_path, source_section); see `ingest::hasher`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Content hash identity; empty until assigned by the hasher
    #[serde(default)]
    pub content_hash: String,
    /// Full chunk text
    pub content: String,
    /// First `PREVIEW_LEN` characters of the content
    pub content_preview: String,
    /// Source document path
    pub source_path: String,
    /// Nearest preceding heading, or the document title
    pub source_section: String,
    /// Document title at chunking time
    pub document_title: String,
    /// Position of this chunk within its document
    pub chunk_index: usize,
    pub embedding_status: EmbeddingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chunk {
    /// Advance the embedding status, ignoring illegal transitions
    ///
    /// Returns true when the transition was applied.
    pub fn advance_status(&mut self, next: EmbeddingStatus) -> bool {
        if self.embedding_status.can_advance_to(next) {
            self.embedding_status = next;
            self.updated_at = Utc::now();
            true
        } else {
            false
        }
    }
}

/// Processing lifecycle of a source file
///
/// Monotonic within one ingestion cycle; a later modify event re-enters
/// in_progress for a fresh cycle. Deleted entries are tombstones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Deleted,
}

/// Per-file ingestion record, keyed by the original file path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMapping {
    pub original_path: String,
    /// Number of chunks produced by the last completed ingestion
    pub chunk_count: usize,
    /// Content hash of the whole file at last processing, for resumable resync
    #[serde(default)]
    pub file_hash: String,
    pub last_processed: DateTime<Utc>,
    pub processing_status: ProcessingStatus,
}

/// Kind of filesystem change observed by the watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

/// A change event queued by the watcher and drained by the sync loop
#[derive(Debug, Clone)]
pub struct FileChangeEvent {
    pub path: std::path::PathBuf,
    pub kind: ChangeKind,
    pub timestamp: DateTime<Utc>,
}

/// Canonical query modes
///
/// Global answers from the whole corpus; Local answers only from the
/// user-selected excerpt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    #[default]
    Global,
    Local,
}

/// A query against the corpus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub session_id: String,
    #[serde(default)]
    pub mode: QueryMode,
    /// User-selected excerpt, required for Local mode to take effect
    #[serde(default)]
    pub selected_text: Option<String>,
    /// Optional post-filter restricting retrieval to one source path
    #[serde(default)]
    pub source_filter: Option<String>,
}

/// A citation attached to an answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub source: String,
    pub section: String,
    pub excerpt: String,
}

/// The answer produced by the query pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<String>,
    pub citations: Vec<Citation>,
    pub retrieved_chunk_count: usize,
    /// True when the answer came from the context-echo fallback path
    #[serde(default)]
    pub degraded: bool,
    /// Best-effort follow-up questions, possibly empty
    #[serde(default)]
    pub follow_up_questions: Vec<String>,
    /// Best-effort tone/quality score in [0, 1], if derived
    #[serde(default)]
    pub tone_score: Option<f32>,
}

/// Request to ingest a single document through the job entrypoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    pub document_path: String,
    #[serde(default)]
    pub title: String,
    pub content_text: String,
    /// Opaque collaborator-supplied metadata, carried but not interpreted
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Lifecycle of an ingestion job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
}

/// Status snapshot of an ingestion job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestJob {
    pub id: Uuid,
    pub status: JobStatus,
    /// Progress 0-100
    pub progress: u8,
    pub details: String,
    pub updated_at: DateTime<Utc>,
}

/// A ranked search result returned by the vector store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    /// Chunk identity (content hash)
    pub id: String,
    /// Cosine similarity score, higher is more similar
    pub score: f32,
    /// Full chunk content
    pub content: String,
    pub source_path: String,
    pub source_section: String,
    pub content_preview: String,
}

/// Aggregate synchronization status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStatus {
    pub total_files: usize,
    pub completed_files: usize,
    pub in_progress_files: usize,
    pub failed_files: usize,
    pub deleted_files: usize,
    pub vector_count: usize,
    pub is_watching: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_status_transitions() {
        use EmbeddingStatus::*;
        assert!(Pending.can_advance_to(InProgress));
        assert!(InProgress.can_advance_to(Processed));
        assert!(InProgress.can_advance_to(Failed));

        // No path reverts to pending after leaving it
        assert!(!InProgress.can_advance_to(Pending));
        assert!(!Processed.can_advance_to(Pending));
        assert!(!Failed.can_advance_to(Pending));
        // Terminal states do not advance
        assert!(!Processed.can_advance_to(Failed));
        assert!(!Failed.can_advance_to(Processed));
        assert!(!Pending.can_advance_to(Processed));
    }

    #[test]
    fn test_chunk_advance_status() {
        let now = Utc::now();
        let mut chunk = Chunk {
            content_hash: "abc".into(),
            content: "text".into(),
            content_preview: "text".into(),
            source_path: "/intro.mdx".into(),
            source_section: "Introduction".into(),
            document_title: "Intro".into(),
            chunk_index: 0,
            embedding_status: EmbeddingStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        assert!(chunk.advance_status(EmbeddingStatus::InProgress));
        assert!(chunk.advance_status(EmbeddingStatus::Processed));
        // Illegal regression is ignored
        assert!(!chunk.advance_status(EmbeddingStatus::Pending));
        assert_eq!(chunk.embedding_status, EmbeddingStatus::Processed);
    }

    #[test]
    fn test_query_mode_serialization() {
        assert_eq!(serde_json::to_string(&QueryMode::Global).unwrap(), "\"global\"");
        assert_eq!(serde_json::to_string(&QueryMode::Local).unwrap(), "\"local\"");

        let mode: QueryMode = serde_json::from_str("\"local\"").unwrap();
        assert_eq!(mode, QueryMode::Local);
    }

    #[test]
    fn test_query_request_defaults() {
        let req: QueryRequest =
            serde_json::from_str(r#"{"query": "what is a node?", "session_id": "s1"}"#).unwrap();
        assert_eq!(req.mode, QueryMode::Global);
        assert!(req.selected_text.is_none());
        assert!(req.source_filter.is_none());
    }

    #[test]
    fn test_processing_status_serialization() {
        assert_eq!(
            serde_json::to_string(&ProcessingStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        let status: ProcessingStatus = serde_json::from_str("\"deleted\"").unwrap();
        assert_eq!(status, ProcessingStatus::Deleted);
    }

    #[test]
    fn test_query_response_roundtrip() {
        let resp = QueryResponse {
            answer: "Nodes are processes.".into(),
            sources: vec!["/ros2/nodes.mdx".into()],
            citations: vec![Citation {
                source: "/ros2/nodes.mdx".into(),
                section: "Understanding Nodes".into(),
                excerpt: "A node is...".into(),
            }],
            retrieved_chunk_count: 1,
            degraded: false,
            follow_up_questions: vec![],
            tone_score: Some(0.8),
        };

        let json = serde_json::to_string(&resp).unwrap();
        let back: QueryResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back.answer, resp.answer);
        assert_eq!(back.citations, resp.citations);
        assert!(!back.degraded);
    }
}
