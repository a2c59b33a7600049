//! Retrieval for prompt augmentation
//!
//! Features:
//! - Sentence-based chunking with a character budget
//! - Append-only fragment index scored by lexical overlap
//! - Plain text, Markdown, JSON and CSV document loading

pub mod chunker;
pub mod index;
pub mod loader;

pub use chunker::{ChunkConfig, SentenceChunker};
pub use index::{Fragment, FragmentMetadata, IndexStats, QueryResult, RetrievalIndex};
pub use loader::{DocumentKind, DocumentLoader, LoadedDocument};

use thiserror::Error;

/// Retrieval errors
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Document is empty")]
    EmptyDocument,

    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for RagError {
    fn from(err: std::io::Error) -> Self {
        RagError::Io(err.to_string())
    }
}

impl From<RagError> for voice_agent_core::Error {
    fn from(err: RagError) -> Self {
        voice_agent_core::Error::Retrieval(err.to_string())
    }
}
