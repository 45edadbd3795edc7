//! Text processing for TTS: normalization and chunking.

pub mod chunker;
pub mod normalizer;

pub use chunker::{DEFAULT_MAX_CHUNK_LENGTH, split_into_chunks, truncate_to_limit};
pub use normalizer::normalize;

/// A chunk of text ready for TTS processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Position of the chunk in the document
    pub index: usize,
    /// The normalized text content
    pub text: String,
}

impl TextChunk {
    /// Create a new text chunk.
    pub fn new(index: usize, text: String) -> Self {
        Self { index, text }
    }
}
