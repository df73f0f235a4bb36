use crate::error::ParseError;
use crate::types::{Heading, ParsedDocument};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use walkdir::WalkDir;

static FENCED_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)```.*?```").unwrap());
static INLINE_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`[^`]*`").unwrap());
static MARKUP_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static MD_LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").unwrap());
static BOLD_STARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap());
static ITALIC_STAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*([^*]+)\*").unwrap());
static BOLD_UNDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"__([^_]+)__").unwrap());
static ITALIC_UNDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_([^_]+)_").unwrap());
static HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.+)$").unwrap());
static SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Extracts plain text, title, and heading structure from MDX/Markdown sources
///
/// Fails soft: malformed front-matter falls back to treating the whole file
/// as body text, and a document without headings is not an error.
pub struct DocumentParser {
    docs_root: PathBuf,
    extensions: Vec<String>,
}

impl DocumentParser {
    pub fn new(docs_root: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        Self {
            docs_root: docs_root.into(),
            extensions,
        }
    }

    /// List every recognized document under the docs root
    pub fn walk_documents(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(&self.docs_root)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| self.is_recognized(entry.path()))
            .map(|entry| entry.into_path())
            .collect();
        files.sort();
        files
    }

    /// Whether a path carries one of the recognized extensions
    pub fn is_recognized(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.extensions.iter().any(|e| e == &ext)
            })
            .unwrap_or(false)
    }

    /// Read and parse a single file from disk
    pub fn parse_file(&self, path: &Path) -> Result<ParsedDocument, ParseError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ParseError::ReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Ok(self.parse_content(&raw, &self.source_path_for(path)))
    }

    /// Source path rooted at the docs root, e.g. "/ros2/nodes.mdx"
    pub fn source_path_for(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.docs_root).unwrap_or(path);
        let mut source = String::from("/");
        source.push_str(&relative.to_string_lossy().replace('\\', "/"));
        source
    }

    /// Parse raw document text into a cleaned, structured document
    pub fn parse_content(&self, raw: &str, source_path: &str) -> ParsedDocument {
        let (title, body) = split_front_matter(raw);

        // Strip code first so stray '#' inside fences never becomes a heading
        let text_only = strip_code_and_markup(&body);

        let mut headings = Vec::new();
        let mut paragraphs: Vec<String> = Vec::new();
        let mut offset = 0usize;

        for paragraph in text_only.split("\n\n") {
            let mut kept_lines: Vec<String> = Vec::new();
            for line in paragraph.lines() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if let Some(caps) = HEADING.captures(line) {
                    headings.push(Heading {
                        level: caps[1].len(),
                        text: clean_inline(&caps[2]),
                        offset,
                    });
                }
                kept_lines.push(clean_inline(line));
            }

            if kept_lines.is_empty() {
                continue;
            }

            let cleaned = kept_lines.join(" ");
            // +2 accounts for the blank-line separator re-inserted below
            offset += cleaned.chars().count() + 2;
            paragraphs.push(cleaned);
        }

        ParsedDocument {
            source_path: source_path.to_string(),
            title,
            headings,
            content: paragraphs.join("\n\n"),
        }
    }
}

/// Split optional front-matter off, returning (title, body)
///
/// Malformed front-matter (no closing fence) falls back to treating the
/// whole input as body text with an empty title.
fn split_front_matter(raw: &str) -> (String, String) {
    let Some(rest) = raw.strip_prefix("---") else {
        return (String::new(), raw.to_string());
    };
    let Some(rest) = rest.strip_prefix('\n').or_else(|| rest.strip_prefix("\r\n")) else {
        return (String::new(), raw.to_string());
    };

    let Some(end) = rest.find("\n---") else {
        return (String::new(), raw.to_string());
    };

    let meta_block = &rest[..end];
    let body_start = match rest[end + 1..].find('\n') {
        Some(nl) => end + 1 + nl + 1,
        None => rest.len(),
    };
    let body = rest[body_start..].to_string();

    let mut title = String::new();
    for line in meta_block.lines() {
        if let Some(value) = line.strip_prefix("title:") {
            title = value.trim().trim_matches('"').trim_matches('\'').to_string();
            break;
        }
    }

    (title, body)
}

fn strip_code_and_markup(text: &str) -> String {
    let text = FENCED_CODE.replace_all(text, "");
    let text = INLINE_CODE.replace_all(&text, "");
    MARKUP_TAG.replace_all(&text, "").into_owned()
}

/// Unwrap links and emphasis, collapse runs of whitespace
fn clean_inline(text: &str) -> String {
    let text = MD_LINK.replace_all(text, "$1");
    let text = BOLD_STARS.replace_all(&text, "$1");
    let text = ITALIC_STAR.replace_all(&text, "$1");
    let text = BOLD_UNDER.replace_all(&text, "$1");
    let text = ITALIC_UNDER.replace_all(&text, "$1");
    SPACES.replace_all(&text, " ").trim().to_string()
}
