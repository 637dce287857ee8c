//! Question-answering service coordinating retrieval, prompting, and index rebuilds.

use super::{Answer, BLANK_QUERY_ANSWER, EMPTY_INDEX_ANSWER, QaApi, QaError};
use super::prompt::{assemble_context, build_prompt, unique_sources};
use crate::{
    config::{Config, get_config},
    embedding::{EmbeddingClientError, SharedEmbeddingClient, get_embedding_client},
    index::{self, IndexPaths, LoadedIndex},
    llm::{SharedLanguageModel, get_llm_client},
    metrics::{MetricsSnapshot, QaMetrics},
    processing::{BuildReport, BuildSettings, IndexBuilder},
};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Retrieval limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QaSettings {
    /// Chunks retrieved when the caller does not ask for a specific number.
    pub default_k: usize,
    /// Upper bound on requested chunks.
    pub max_k: usize,
}

impl Default for QaSettings {
    fn default() -> Self {
        Self {
            default_k: 4,
            max_k: 50,
        }
    }
}

impl QaSettings {
    /// Settings derived from runtime configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_k: config.search_default_k,
            max_k: config.search_max_k,
        }
    }

    /// Resolve a requested `k` into `[1, max_k]`.
    pub fn effective_k(&self, requested: Option<usize>) -> usize {
        let max_k = self.max_k.max(1);
        requested.unwrap_or(self.default_k).clamp(1, max_k)
    }
}

/// Answers questions against the current index and swaps in rebuilt indexes.
///
/// One instance is shared by the HTTP handlers and the CLI. Readers hold the index lock only
/// while checking for an index and while searching it. Neither the query embedding nor the
/// language model call happens under the lock. Rebuilds run one at a time and replace the index
/// only after the new one is saved.
pub struct QaService {
    embedding_client: SharedEmbeddingClient,
    llm: SharedLanguageModel,
    builder: IndexBuilder,
    settings: QaSettings,
    index: RwLock<Option<LoadedIndex>>,
    rebuild: Mutex<()>,
    metrics: Arc<QaMetrics>,
}

impl QaService {
    /// Assemble a service from explicit components. The index starts empty.
    pub fn with_components(
        embedding_client: SharedEmbeddingClient,
        llm: SharedLanguageModel,
        build_settings: BuildSettings,
        settings: QaSettings,
    ) -> Self {
        let builder = IndexBuilder::new(embedding_client.clone(), build_settings);
        Self {
            embedding_client,
            llm,
            builder,
            settings,
            index: RwLock::new(None),
            rebuild: Mutex::new(()),
            metrics: Arc::new(QaMetrics::new()),
        }
    }

    /// Build a service from the global configuration and load any saved index.
    pub async fn from_config() -> Result<Self, QaError> {
        let config = get_config();
        tracing::info!("Initializing embedding client");
        let embedding_client = get_embedding_client()?;
        tracing::info!(model = %config.llm_model, "Initializing language model client");
        let llm = get_llm_client()?;

        let service = Self::with_components(
            embedding_client,
            llm,
            BuildSettings::from_config(config),
            QaSettings::from_config(config),
        );
        service.load_from_disk().await;
        Ok(service)
    }

    /// Load the saved index from the data directory, if any.
    ///
    /// A missing index leaves the service empty. A corrupt one is logged and also leaves the
    /// service empty so that a rebuild can replace it. Returns whether an index was loaded.
    pub async fn load_from_disk(&self) -> bool {
        let paths = IndexPaths::new(&self.builder.settings().data_dir);
        let loaded = match tokio::task::spawn_blocking(move || index::load(&paths)).await {
            Ok(result) => result,
            Err(error) => {
                tracing::error!(error = %error, "Index load task failed");
                return false;
            }
        };

        match loaded {
            Ok(Some(loaded)) => {
                if loaded.manifest.embedding_model != self.embedding_client.model() {
                    tracing::warn!(
                        index_model = %loaded.manifest.embedding_model,
                        configured_model = %self.embedding_client.model(),
                        "Index was built with a different embedding model; re-index for accurate results"
                    );
                }
                self.install(loaded).await;
                true
            }
            Ok(None) => {
                tracing::info!(
                    path = %self.builder.settings().data_dir.display(),
                    "No index found. Starting empty; use the re-index endpoint"
                );
                false
            }
            Err(error) => {
                tracing::error!(error = %error, "Failed to load saved index; starting empty");
                false
            }
        }
    }

    /// Answer `query` from the `k` most relevant chunks.
    pub async fn ask(&self, query: &str, k: Option<usize>) -> Result<Answer, QaError> {
        if query.trim().is_empty() {
            return Ok(Answer::unsourced(BLANK_QUERY_ANSWER));
        }
        let k = self.settings.effective_k(k);
        tracing::info!(k, "Received query");

        if !self.has_index().await {
            return Ok(Answer::unsourced(EMPTY_INDEX_ANSWER));
        }
        let vector = self.embed_query(query).await?;

        // The index may have been swapped while the query was embedded.
        let retrieved = {
            let guard = self.index.read().await;
            let Some(loaded) = guard.as_ref().filter(|loaded| !loaded.is_empty()) else {
                return Ok(Answer::unsourced(EMPTY_INDEX_ANSWER));
            };
            loaded.retrieve(&vector, k)?
        };
        tracing::debug!(retrieved = retrieved.len(), "Retrieved context chunks");

        let sources = unique_sources(&retrieved);
        let prompt = build_prompt(&assemble_context(&retrieved), query);

        tracing::info!(model = self.llm.model(), "Sending prompt to language model");
        let answer = match self.llm.chat(&prompt).await {
            Ok(answer) => {
                self.metrics.record_query();
                answer
            }
            Err(error) => {
                self.metrics.record_model_failure();
                tracing::error!(error = %error, "Language model call failed");
                format!("Error communicating with model: {error}")
            }
        };

        Ok(Answer { answer, sources })
    }

    /// Sorted base names of the files in the current index.
    pub async fn indexed_files(&self) -> Vec<String> {
        self.index
            .read()
            .await
            .as_ref()
            .map(|loaded| loaded.metadata.indexed_files())
            .unwrap_or_default()
    }

    /// Rebuild from `directory` and swap the new index in.
    ///
    /// When the directory holds nothing processable the current index stays in place and an
    /// empty report is returned.
    pub async fn reindex(&self, directory: &Path) -> Result<BuildReport, QaError> {
        let _rebuild = self.rebuild.lock().await;
        let outcome = self.builder.build(directory).await?;
        if let Some(loaded) = outcome.index {
            self.install(loaded).await;
            self.metrics.record_build();
        }
        Ok(outcome.report)
    }

    /// Retrieve the current metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    async fn has_index(&self) -> bool {
        self.index
            .read()
            .await
            .as_ref()
            .is_some_and(|loaded| !loaded.is_empty())
    }

    async fn install(&self, loaded: LoadedIndex) {
        let files = loaded.metadata.indexed_files().len() as u64;
        let chunks = loaded.metadata.len() as u64;
        *self.index.write().await = Some(loaded);
        self.metrics.set_index_size(files, chunks);
        tracing::info!(files, chunks, "Serving index");
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, QaError> {
        let mut vectors = self
            .embedding_client
            .generate_embeddings(vec![query.to_string()])
            .await?;
        vectors.pop().ok_or_else(|| {
            QaError::Embedding(EmbeddingClientError::InvalidResponse(
                "no vector returned for query".into(),
            ))
        })
    }
}

#[async_trait]
impl QaApi for QaService {
    async fn ask(&self, query: &str, k: Option<usize>) -> Result<Answer, QaError> {
        QaService::ask(self, query, k).await
    }

    async fn indexed_files(&self) -> Vec<String> {
        QaService::indexed_files(self).await
    }

    async fn reindex(&self, directory: &Path) -> Result<BuildReport, QaError> {
        QaService::reindex(self, directory).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        QaService::metrics_snapshot(self)
    }
}
