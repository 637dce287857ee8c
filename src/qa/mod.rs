//! Retrieval-augmented question answering over the document index.

mod prompt;
mod service;

use crate::{
    embedding::EmbeddingClientError, index::IndexError, llm::LlmClientError,
    metrics::MetricsSnapshot, processing::BuildError, processing::BuildReport,
};
use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

pub use prompt::{assemble_context, build_prompt, unique_sources};
pub use service::{QaService, QaSettings};

/// Reply to a blank question.
pub const BLANK_QUERY_ANSWER: &str = "provide a valid question";
/// Reply when no index is loaded.
pub const EMPTY_INDEX_ANSWER: &str =
    "The search index is empty. Please re-index a directory first.";

/// Generated answer with the files it was grounded on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    /// Model reply, or an explanation when no answer could be produced.
    pub answer: String,
    /// Base names of the retrieved sources, most relevant first.
    pub sources: Vec<String>,
}

impl Answer {
    /// Answer that cites nothing.
    pub fn unsourced(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            sources: Vec::new(),
        }
    }
}

/// Errors surfaced by the question-answering service.
#[derive(Debug, Error)]
pub enum QaError {
    /// Query embedding or client construction failed.
    #[error(transparent)]
    Embedding(#[from] EmbeddingClientError),
    /// Language model client could not be constructed.
    #[error(transparent)]
    Llm(#[from] LlmClientError),
    /// Index search failed.
    #[error(transparent)]
    Index(#[from] IndexError),
    /// Rebuilding the index failed.
    #[error(transparent)]
    Build(#[from] BuildError),
}

/// Abstraction over the question-answering service used by external surfaces.
#[async_trait]
pub trait QaApi: Send + Sync {
    /// Answer `query` from the `k` most relevant chunks (`None` uses the default).
    async fn ask(&self, query: &str, k: Option<usize>) -> Result<Answer, QaError>;

    /// Sorted base names of the files in the current index.
    async fn indexed_files(&self) -> Vec<String>;

    /// Rebuild the index from `directory` and start serving it.
    async fn reindex(&self, directory: &Path) -> Result<BuildReport, QaError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}
