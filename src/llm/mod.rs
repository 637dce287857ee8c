//! Language model access for answer generation.
//!
//! Answers come from a single non-streaming chat turn against the Ollama runtime. The client
//! talks to `/api/chat` directly with `reqwest`, mirroring the embedding adapters.

use crate::config::get_config;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced while asking the language model for a completion.
#[derive(Debug, Error)]
pub enum LlmClientError {
    /// Runtime was unreachable or the model is not installed.
    #[error("Language model unavailable: {0}")]
    ProviderUnavailable(String),
    /// Runtime returned an error response.
    #[error("Failed to generate answer: {0}")]
    GenerationFailed(String),
    /// Response could not be parsed.
    #[error("Malformed model response: {0}")]
    InvalidResponse(String),
}

/// Interface implemented by chat-capable language models.
#[async_trait]
pub trait LanguageModelClient: Send + Sync {
    /// Model identifier used for completions.
    fn model(&self) -> &str;

    /// Send `prompt` as a single user message and return the reply text.
    async fn chat(&self, prompt: &str) -> Result<String, LlmClientError>;
}

/// Shared handle to a language model.
pub type SharedLanguageModel = Arc<dyn LanguageModelClient>;

/// Build the chat client described by the current configuration.
pub fn get_llm_client() -> Result<SharedLanguageModel, LlmClientError> {
    let config = get_config();
    Ok(Arc::new(OllamaChatClient::new(
        config.ollama_url.clone(),
        config.llm_model.clone(),
        Duration::from_secs(config.llm_timeout_secs),
    )?))
}

/// Chat client for a local Ollama runtime.
pub struct OllamaChatClient {
    http: Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

impl OllamaChatClient {
    /// Create a client for `model` at `base_url`; requests give up after `timeout`.
    pub fn new(base_url: String, model: String, timeout: Duration) -> Result<Self, LlmClientError> {
        let http = Client::builder()
            .user_agent("docqa/chat")
            .timeout(timeout)
            .build()
            .map_err(|error| LlmClientError::ProviderUnavailable(error.to_string()))?;
        Ok(Self {
            http,
            base_url,
            model,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/chat", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl LanguageModelClient for OllamaChatClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, prompt: &str) -> Result<String, LlmClientError> {
        let payload = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "stream": false,
        });

        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                LlmClientError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmClientError::ProviderUnavailable(format!(
                "model '{}' not available at {}: {body}",
                self.model,
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmClientError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: ChatResponse = response.json().await.map_err(|error| {
            LlmClientError::InvalidResponse(format!("failed to decode Ollama response: {error}"))
        })?;

        Ok(body.message.content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn client(server: &MockServer) -> OllamaChatClient {
        OllamaChatClient::new(
            server.base_url(),
            "llama3.2:3b".into(),
            Duration::from_secs(5),
        )
        .expect("client")
    }

    #[tokio::test]
    async fn sends_single_user_message() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/chat").json_body(json!({
                    "model": "llama3.2:3b",
                    "messages": [{"role": "user", "content": "Why?"}],
                    "stream": false
                }));
                then.status(200).json_body(json!({
                    "model": "llama3.2:3b",
                    "message": {"role": "assistant", "content": "  Because. \n"},
                    "done": true
                }));
            })
            .await;

        let reply = client(&server).chat("Why?").await.expect("reply");

        mock.assert_async().await;
        assert_eq!(reply, "Because.");
    }

    #[tokio::test]
    async fn error_status_is_generation_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/chat");
                then.status(500).body("boom");
            })
            .await;

        let error = client(&server).chat("q").await.expect_err("error response");
        assert!(
            matches!(error, LlmClientError::GenerationFailed(ref message) if message.contains("500"))
        );
    }

    #[tokio::test]
    async fn missing_model_is_unavailable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/chat");
                then.status(404).body("model not found");
            })
            .await;

        let error = client(&server).chat("q").await.expect_err("404");
        assert!(matches!(error, LlmClientError::ProviderUnavailable(_)));
    }

    #[tokio::test]
    async fn unexpected_body_is_invalid() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/chat");
                then.status(200).json_body(json!({"response": "wrong shape"}));
            })
            .await;

        let error = client(&server).chat("q").await.expect_err("bad body");
        assert!(matches!(error, LlmClientError::InvalidResponse(_)));
    }
}
