//! Per-vector chunk records and the build manifest.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Text and origin of one indexed chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Path of the file the chunk was extracted from.
    pub source: PathBuf,
    /// Chunk text.
    pub content: String,
}

impl ChunkRecord {
    /// Base name of the source file.
    pub fn source_name(&self) -> String {
        source_name(&self.source)
    }
}

/// Base name of `path`, falling back to the full path when it has none.
pub fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Chunk records aligned with index positions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataStore(Vec<ChunkRecord>);

impl MetadataStore {
    /// Wrap records; position `i` describes vector `i`.
    pub fn new(records: Vec<ChunkRecord>) -> Self {
        Self(records)
    }

    /// Record at `position`.
    pub fn get(&self, position: usize) -> Option<&ChunkRecord> {
        self.0.get(position)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no records.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All records in index order.
    pub fn records(&self) -> &[ChunkRecord] {
        &self.0
    }

    /// Sorted, de-duplicated base names of every source.
    pub fn indexed_files(&self) -> Vec<String> {
        self.0
            .iter()
            .map(ChunkRecord::source_name)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Facts recorded alongside the metadata when an index is saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexManifest {
    /// RFC 3339 build timestamp.
    pub built_at: String,
    /// Embedding model that produced the vectors.
    pub embedding_model: String,
    /// Vector dimension.
    pub dimension: usize,
    /// Number of chunks in the index.
    pub chunk_count: usize,
    /// Hex SHA-256 of the vector file.
    pub vectors_sha256: String,
}

impl IndexManifest {
    /// Manifest stamped with the current UTC time.
    pub fn now(
        embedding_model: impl Into<String>,
        dimension: usize,
        chunk_count: usize,
        vectors_sha256: String,
    ) -> Self {
        let built_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string());
        Self {
            built_at,
            embedding_model: embedding_model.into(),
            dimension,
            chunk_count,
            vectors_sha256,
        }
    }
}
