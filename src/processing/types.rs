//! Core data types and error definitions for the indexing pipeline.

use crate::{embedding::EmbeddingClientError, index::IndexError};
use anyhow::Error as TokenizerError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while turning text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Ingestion configured an impossible budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Tokenizer tables could not be loaded.
    #[error("failed to initialize tokenizer '{encoding}': {source}")]
    Tokenizer {
        /// Encoding we attempted to load.
        encoding: String,
        /// Underlying error raised by the tokenizer library.
        #[source]
        source: TokenizerError,
    },
}

/// Errors emitted while building an index from a directory.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Supplied path does not exist or is not a directory.
    #[error("not a valid directory: {0}")]
    NotADirectory(PathBuf),
    /// Chunker could not be constructed.
    #[error("Failed to chunk documents: {0}")]
    Chunking(#[from] ChunkingError),
    /// Embedding provider failed to produce vectors for the chunks.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Index could not be assembled or persisted.
    #[error("Failed to write index: {0}")]
    Index(#[from] IndexError),
    /// Background extraction task failed to complete.
    #[error("Extraction task failed: {0}")]
    Task(String),
}

/// Summary of a completed index build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Sorted, de-duplicated base names of files that contributed chunks.
    pub files: Vec<String>,
    /// Number of chunks embedded into the index.
    pub chunk_count: usize,
    /// Dimension of the stored vectors (0 when nothing was indexed).
    pub dimension: usize,
}

impl BuildReport {
    /// Whether the build found no processable content.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
