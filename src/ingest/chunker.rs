use crate::types::{Chunk, EmbeddingStatus, ParsedDocument, PREVIEW_LEN};
use chrono::Utc;

/// Splits parsed documents into bounded, overlap-aware chunks aligned to
/// paragraph boundaries, tagging each chunk with its nearest preceding heading.
pub struct SemanticChunker {
    max_chunk_size: usize,
    overlap: usize,
}

/// A chunk's text plus the document offset it starts at, before identity
/// assignment
struct PendingChunk {
    text: String,
    offset: usize,
}

impl SemanticChunker {
    pub fn new(max_chunk_size: usize, overlap: usize) -> Self {
        Self {
            max_chunk_size,
            overlap,
        }
    }

    /// Chunk a parsed document into ordered chunk records
    ///
    /// Identities are left unassigned; see `ingest::hasher`.
    pub fn chunk_document(&self, doc: &ParsedDocument) -> Vec<Chunk> {
        if doc.content.trim().is_empty() {
            return Vec::new();
        }

        let pending = self.split_paragraph_groups(&doc.content);
        let now = Utc::now();

        pending
            .into_iter()
            .enumerate()
            .map(|(index, chunk)| {
                let preview: String = chunk.text.chars().take(PREVIEW_LEN).collect();
                Chunk {
                    content_hash: String::new(),
                    content_preview: preview,
                    source_path: doc.source_path.clone(),
                    source_section: self.section_for(doc, chunk.offset),
                    document_title: doc.title.clone(),
                    chunk_index: index,
                    content: chunk.text,
                    embedding_status: EmbeddingStatus::Pending,
                    created_at: now,
                    updated_at: now,
                }
            })
            .collect()
    }

    /// Chunk a batch of parsed documents
    pub fn chunk_all_documents(&self, docs: &[ParsedDocument]) -> Vec<Chunk> {
        docs.iter().flat_map(|doc| self.chunk_document(doc)).collect()
    }

    /// Greedily accumulate blank-line-delimited paragraphs into chunks
    fn split_paragraph_groups(&self, content: &str) -> Vec<PendingChunk> {
        let mut chunks: Vec<PendingChunk> = Vec::new();
        let mut current = String::new();
        let mut current_offset = 0usize;

        let mut offset = 0usize;
        for paragraph in content.split("\n\n") {
            let paragraph_offset = offset;
            offset += paragraph.chars().count() + 2;

            let paragraph = paragraph.trim();
            if paragraph.is_empty() {
                continue;
            }

            let para_len = paragraph.chars().count();
            let joined_len = if current.is_empty() {
                para_len
            } else {
                current.chars().count() + 2 + para_len
            };

            if joined_len <= self.max_chunk_size {
                if current.is_empty() {
                    current_offset = paragraph_offset;
                } else {
                    current.push_str("\n\n");
                }
                current.push_str(paragraph);
                continue;
            }

            if !current.is_empty() {
                chunks.push(PendingChunk {
                    text: std::mem::take(&mut current),
                    offset: current_offset,
                });
            }

            if para_len > self.max_chunk_size {
                let mut parts = self.split_large_paragraph(paragraph);
                // Keep the tail open so following paragraphs may join it
                let last = parts.pop();
                for part in parts {
                    chunks.push(PendingChunk {
                        text: part,
                        offset: paragraph_offset,
                    });
                }
                current = last.unwrap_or_default();
                current_offset = paragraph_offset;
            } else {
                current = paragraph.to_string();
                current_offset = paragraph_offset;
            }
        }

        if !current.is_empty() {
            chunks.push(PendingChunk {
                text: current,
                offset: current_offset,
            });
        }

        chunks
    }

    /// Hard-split an oversize paragraph at sentence, then word, then raw
    /// character boundaries, carrying `overlap` tail characters forward
    fn split_large_paragraph(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        if chars.len() <= self.max_chunk_size {
            return vec![text.to_string()];
        }

        let mut parts = Vec::new();
        let mut start = 0usize;

        while start < chars.len() {
            let mut end = start + self.max_chunk_size;

            if end < chars.len() {
                end = find_break_point(&chars, start, end);
            } else {
                end = chars.len();
            }

            let part: String = chars[start..end].iter().collect();
            let part = part.trim().to_string();
            if !part.is_empty() {
                parts.push(part);
            }

            if end >= chars.len() {
                break;
            }

            // Carry overlap into the next sub-chunk, always making progress
            start = end.saturating_sub(self.overlap).max(start + 1);
        }

        parts
    }

    /// Nearest preceding heading, falling back to the title, then "Introduction"
    fn section_for(&self, doc: &ParsedDocument, chunk_offset: usize) -> String {
        let heading = doc
            .headings
            .iter()
            .filter(|h| h.offset <= chunk_offset)
            .next_back()
            .map(|h| h.text.clone());

        match heading {
            Some(text) => text,
            None if !doc.title.is_empty() => doc.title.clone(),
            None => "Introduction".to_string(),
        }
    }
}

/// Best split position within (start, end]: after a sentence end, else at the
/// last space, else the raw limit
fn find_break_point(chars: &[char], start: usize, end: usize) -> usize {
    for i in (start + 1..=end).rev() {
        if matches!(chars[i], '.' | '!' | '?') && i + 2 < chars.len() && chars[i + 1] == ' ' {
            return i + 1;
        }
    }

    for i in (start + 1..=end).rev() {
        if chars[i] == ' ' {
            return i;
        }
    }

    end
}
