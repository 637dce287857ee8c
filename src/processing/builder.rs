//! Directory-to-index pipeline: extract, chunk, embed, save.

use crate::{
    config::Config,
    embedding::{SharedEmbeddingClient, embed_in_batches},
    extract::scan_directory,
    index::{self, ChunkRecord, FlatL2Index, IndexPaths, LoadedIndex, MetadataStore},
    processing::{
        chunking::{ChunkingSettings, TextChunker},
        types::{BuildError, BuildReport},
    },
};
use std::path::{Path, PathBuf};

/// Knobs for a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSettings {
    /// Directory the index is written to.
    pub data_dir: PathBuf,
    /// Chunk budget.
    pub chunking: ChunkingSettings,
    /// Texts per embedding request.
    pub batch_size: usize,
}

impl BuildSettings {
    /// Settings derived from runtime configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            chunking: ChunkingSettings {
                chunk_size: config.chunk_size,
                overlap: config.chunk_overlap,
                unit: config.chunk_unit,
            },
            batch_size: config.embedding_batch_size,
        }
    }
}

/// Result of [`IndexBuilder::build`].
#[derive(Debug)]
pub struct BuildOutcome {
    /// What went into the index.
    pub report: BuildReport,
    /// The freshly saved index, or `None` when nothing was processable.
    pub index: Option<LoadedIndex>,
}

/// Builds and persists a complete index from a directory tree.
pub struct IndexBuilder {
    embedding_client: SharedEmbeddingClient,
    settings: BuildSettings,
}

impl IndexBuilder {
    /// Create a builder that embeds with `embedding_client`.
    pub fn new(embedding_client: SharedEmbeddingClient, settings: BuildSettings) -> Self {
        Self {
            embedding_client,
            settings,
        }
    }

    /// Settings this builder writes with.
    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    /// Replace the on-disk index with one built from every supported file under `directory`.
    ///
    /// When no file yields any text the existing index is left untouched and the returned
    /// report is empty.
    pub async fn build(&self, directory: &Path) -> Result<BuildOutcome, BuildError> {
        if !directory.is_dir() {
            return Err(BuildError::NotADirectory(directory.to_path_buf()));
        }
        tracing::info!(directory = %directory.display(), "Building index");

        let chunker = TextChunker::new(self.settings.chunking)?;
        let root = directory.to_path_buf();
        let records = tokio::task::spawn_blocking(move || collect_chunks(&root, &chunker))
            .await
            .map_err(|error| BuildError::Task(error.to_string()))?;

        if records.is_empty() {
            tracing::warn!(directory = %directory.display(), "No processable files found");
            return Ok(BuildOutcome {
                report: BuildReport::default(),
                index: None,
            });
        }

        let texts: Vec<String> = records.iter().map(|record| record.content.clone()).collect();
        let vectors = embed_in_batches(
            self.embedding_client.as_ref(),
            texts,
            self.settings.batch_size,
        )
        .await?;

        let dimension = vectors.first().map(Vec::len).unwrap_or(0);
        let mut flat = FlatL2Index::new(dimension);
        flat.add(&vectors)?;
        let metadata = MetadataStore::new(records);

        let paths = IndexPaths::new(&self.settings.data_dir);
        let manifest = index::save(&paths, &flat, &metadata, self.embedding_client.model())?;

        let report = BuildReport {
            files: metadata.indexed_files(),
            chunk_count: metadata.len(),
            dimension,
        };
        tracing::info!(
            files = report.files.len(),
            chunks = report.chunk_count,
            dimension,
            "Index build complete"
        );

        Ok(BuildOutcome {
            report,
            index: Some(LoadedIndex::new(flat, metadata, manifest)?),
        })
    }
}

fn collect_chunks(root: &Path, chunker: &TextChunker) -> Vec<ChunkRecord> {
    let mut records = Vec::new();
    for (path, text) in scan_directory(root) {
        if text.is_empty() {
            tracing::debug!(file = %path.display(), "Skipping file with no text");
            continue;
        }
        let chunks = chunker.chunk(&text);
        tracing::debug!(file = %path.display(), chunks = chunks.len(), "Chunked document");
        records.extend(chunks.into_iter().map(|content| ChunkRecord {
            source: path.clone(),
            content,
        }));
    }
    records
}
