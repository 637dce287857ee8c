//! Exact vector index, chunk metadata, and their on-disk representation.

mod flat;
mod metadata;
mod store;

use std::path::PathBuf;
use thiserror::Error;

pub use flat::{FlatL2Index, Neighbor};
pub use metadata::{ChunkRecord, IndexManifest, MetadataStore, source_name};
pub use store::{IndexPaths, LoadedIndex, RetrievedChunk, load, save};

/// Errors raised while building, saving, or loading an index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// A vector did not match the index dimension.
    #[error("vector dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension the index was created with.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },
    /// Filesystem operation failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File or directory being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// Vector file header or body is malformed.
    #[error("corrupt vector file: {0}")]
    Corrupt(String),
    /// Metadata file could not be encoded or decoded.
    #[error("invalid metadata file: {0}")]
    Json(#[from] serde_json::Error),
    /// Vector file contents differ from what the manifest recorded.
    #[error("vector file checksum mismatch: expected {expected}, found {actual}")]
    ChecksumMismatch {
        /// Digest stored in the manifest.
        expected: String,
        /// Digest of the file on disk.
        actual: String,
    },
    /// Vector and metadata record counts disagree.
    #[error("index holds {vectors} vectors but metadata has {records} records")]
    CountMismatch {
        /// Number of stored vectors.
        vectors: usize,
        /// Number of metadata records.
        records: usize,
    },
}

impl IndexError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
