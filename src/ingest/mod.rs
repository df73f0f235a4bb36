//! Document ingestion: parsing, semantic chunking, and identity assignment

mod chunker;
mod hasher;
mod parser;

pub use chunker::SemanticChunker;
pub use hasher::ContentHasher;
pub use parser::DocumentParser;
