//! Embedding client abstraction and HTTP adapters.
//!
//! Both adapters talk to their provider directly over `reqwest`. Callers that embed many texts
//! go through [`embed_in_batches`], which keeps request bodies bounded and checks that every
//! batch agrees on the vector dimension.

mod ollama;
mod openai;

use crate::config::{EmbeddingProvider, get_config};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub use ollama::OllamaEmbeddingClient;
pub use openai::OpenAiEmbeddingClient;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider could not be reached or the HTTP client could not be built.
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed or did not match the request.
    #[error("Malformed embedding response: {0}")]
    InvalidResponse(String),
    /// Caller supplied nothing to embed.
    #[error("no texts provided")]
    EmptyInput,
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Model identifier sent to the provider.
    fn model(&self) -> &str;

    /// Produce one embedding vector per input text, in input order.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;
}

/// Shared handle to an embedding backend.
pub type SharedEmbeddingClient = Arc<dyn EmbeddingClient>;

/// Embed `texts` in batches of at most `batch_size`, concatenating results in order.
pub async fn embed_in_batches(
    client: &dyn EmbeddingClient,
    texts: Vec<String>,
    batch_size: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
    if texts.is_empty() {
        return Err(EmbeddingClientError::EmptyInput);
    }
    let batch_size = batch_size.max(1);
    let total = texts.len();
    let mut vectors = Vec::with_capacity(total);
    let mut dimension = None;

    let mut remaining = texts.into_iter().peekable();
    while remaining.peek().is_some() {
        let batch: Vec<String> = remaining.by_ref().take(batch_size).collect();
        let expected = batch.len();
        let embeddings = client.generate_embeddings(batch).await?;
        if embeddings.len() != expected {
            return Err(EmbeddingClientError::InvalidResponse(format!(
                "expected {expected} vectors, got {}",
                embeddings.len()
            )));
        }
        let batch_dimension = uniform_dimension(&embeddings)?;
        match dimension {
            None => dimension = Some(batch_dimension),
            Some(known) if known != batch_dimension => {
                return Err(EmbeddingClientError::InvalidResponse(format!(
                    "dimension changed between batches: {known} then {batch_dimension}"
                )));
            }
            Some(_) => {}
        }
        vectors.extend(embeddings);
        tracing::debug!(
            model = client.model(),
            embedded = vectors.len(),
            total,
            "Embedded batch"
        );
    }

    Ok(vectors)
}

/// Return the shared dimension of `vectors`, rejecting empty or ragged responses.
pub(crate) fn uniform_dimension(vectors: &[Vec<f32>]) -> Result<usize, EmbeddingClientError> {
    let dimension = vectors.first().map(Vec::len).unwrap_or(0);
    if dimension == 0 {
        return Err(EmbeddingClientError::InvalidResponse(
            "provider returned empty vectors".into(),
        ));
    }
    if vectors.iter().any(|vector| vector.len() != dimension) {
        return Err(EmbeddingClientError::InvalidResponse(
            "provider returned vectors of differing dimensions".into(),
        ));
    }
    Ok(dimension)
}

/// Build an embedding client for the current configuration.
pub fn get_embedding_client() -> Result<SharedEmbeddingClient, EmbeddingClientError> {
    let config = get_config();
    tracing::debug!(
        provider = ?config.embedding_provider,
        model = %config.embedding_model,
        "Building embedding client"
    );
    let timeout = Duration::from_secs(config.embedding_timeout_secs);
    match config.embedding_provider {
        EmbeddingProvider::Ollama => Ok(Arc::new(OllamaEmbeddingClient::new(
            config.ollama_url.clone(),
            config.embedding_model.clone(),
            timeout,
        )?)),
        EmbeddingProvider::OpenAI => {
            let api_key = config.openai_api_key.clone().ok_or_else(|| {
                EmbeddingClientError::ProviderUnavailable("OPENAI_API_KEY is not set".into())
            })?;
            Ok(Arc::new(OpenAiEmbeddingClient::new(
                config.openai_base_url.clone(),
                api_key,
                config.embedding_model.clone(),
                timeout,
            )?))
        }
    }
}
