//! Saving and loading an index under a data directory.
//!
//! Two files live in the data directory: `vectors.bin` holds the binary vector table and
//! `metadata.json` holds the manifest plus one chunk record per vector. Each is written to a
//! temporary sibling and renamed into place. The metadata file is written last and records
//! the SHA-256 of the vector file, so a half-finished save is detected on load.

use super::{ChunkRecord, FlatL2Index, IndexError, IndexManifest, MetadataStore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const VECTORS_FILE: &str = "vectors.bin";
const METADATA_FILE: &str = "metadata.json";

/// Locations of the persisted index files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPaths {
    /// Directory containing both files.
    pub data_dir: PathBuf,
    /// Binary vector table.
    pub vectors: PathBuf,
    /// JSON manifest and chunk records.
    pub metadata: PathBuf,
}

impl IndexPaths {
    /// Standard file names under `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            vectors: data_dir.join(VECTORS_FILE),
            metadata: data_dir.join(METADATA_FILE),
            data_dir,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct MetadataFile {
    manifest: IndexManifest,
    chunks: MetadataStore,
}

/// An index and its metadata, ready to answer queries.
#[derive(Debug, Clone)]
pub struct LoadedIndex {
    /// Vector table.
    pub index: FlatL2Index,
    /// Chunk records aligned with `index`.
    pub metadata: MetadataStore,
    /// Build facts.
    pub manifest: IndexManifest,
}

/// A chunk returned by a similarity search.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    /// Stored record.
    pub record: ChunkRecord,
    /// Squared L2 distance to the query vector.
    pub distance: f32,
}

impl LoadedIndex {
    /// Pair an index with its records, checking they line up.
    pub fn new(
        index: FlatL2Index,
        metadata: MetadataStore,
        manifest: IndexManifest,
    ) -> Result<Self, IndexError> {
        if index.len() != metadata.len() {
            return Err(IndexError::CountMismatch {
                vectors: index.len(),
                records: metadata.len(),
            });
        }
        Ok(Self {
            index,
            metadata,
            manifest,
        })
    }

    /// Whether there is nothing to search.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Nearest `k` chunks to `query`, closest first.
    pub fn retrieve(&self, query: &[f32], k: usize) -> Result<Vec<RetrievedChunk>, IndexError> {
        let hits = self.index.search(query, k)?;
        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                self.metadata.get(hit.position).map(|record| RetrievedChunk {
                    record: record.clone(),
                    distance: hit.distance,
                })
            })
            .collect())
    }
}

/// Write the index and metadata, returning the manifest that was recorded.
pub fn save(
    paths: &IndexPaths,
    index: &FlatL2Index,
    metadata: &MetadataStore,
    embedding_model: &str,
) -> Result<IndexManifest, IndexError> {
    if index.len() != metadata.len() {
        return Err(IndexError::CountMismatch {
            vectors: index.len(),
            records: metadata.len(),
        });
    }
    fs::create_dir_all(&paths.data_dir).map_err(|e| IndexError::io(&paths.data_dir, e))?;

    let vector_bytes = index.to_bytes();
    let manifest = IndexManifest::now(
        embedding_model,
        index.dimension(),
        index.len(),
        sha256_hex(&vector_bytes),
    );
    write_atomic(&paths.vectors, &vector_bytes)?;

    let file = MetadataFile {
        manifest: manifest.clone(),
        chunks: metadata.clone(),
    };
    let json = serde_json::to_vec_pretty(&file)?;
    write_atomic(&paths.metadata, &json)?;

    tracing::info!(
        path = %paths.data_dir.display(),
        chunks = manifest.chunk_count,
        dimension = manifest.dimension,
        "Saved index"
    );
    Ok(manifest)
}

/// Load a saved index. Returns `Ok(None)` when either file is absent.
pub fn load(paths: &IndexPaths) -> Result<Option<LoadedIndex>, IndexError> {
    let Some(vector_bytes) = read_optional(&paths.vectors)? else {
        return Ok(None);
    };
    let Some(metadata_bytes) = read_optional(&paths.metadata)? else {
        return Ok(None);
    };

    let file: MetadataFile = serde_json::from_slice(&metadata_bytes)?;
    let actual = sha256_hex(&vector_bytes);
    if actual != file.manifest.vectors_sha256 {
        return Err(IndexError::ChecksumMismatch {
            expected: file.manifest.vectors_sha256,
            actual,
        });
    }

    let index = FlatL2Index::from_bytes(&vector_bytes)?;
    if index.dimension() != file.manifest.dimension {
        return Err(IndexError::Corrupt(format!(
            "manifest dimension {} does not match vector file dimension {}",
            file.manifest.dimension,
            index.dimension()
        )));
    }
    let loaded = LoadedIndex::new(index, file.chunks, file.manifest)?;
    tracing::info!(
        path = %paths.data_dir.display(),
        chunks = loaded.metadata.len(),
        built_at = %loaded.manifest.built_at,
        "Loaded index"
    );
    Ok(Some(loaded))
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, IndexError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
        Err(error) => Err(IndexError::io(path, error)),
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), IndexError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let mut file = fs::File::create(&tmp).map_err(|e| IndexError::io(&tmp, e))?;
    file.write_all(bytes).map_err(|e| IndexError::io(&tmp, e))?;
    file.sync_all().map_err(|e| IndexError::io(&tmp, e))?;
    drop(file);
    fs::rename(&tmp, path).map_err(|e| IndexError::io(path, e))
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
