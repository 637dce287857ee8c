//! HTTP surface for docqa.
//!
//! This module exposes a compact Axum router:
//!
//! - `GET /` – Liveness probe returning `{"status": "API is running"}`.
//! - `POST /search` – Answer a question from the indexed documents. Accepts `query` and an
//!   optional `k` (number of chunks to retrieve) and returns `answer` plus cited `sources`.
//! - `GET /indexed-files` – Sorted base names of every file in the current index.
//! - `POST /reindex` – Rebuild the index from `directory_path` and start serving it.
//! - `GET /metrics` – Query and indexing counters.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools/hosts.
//!
//! Errors are returned as `{"detail": "..."}` with a matching status code. Every origin is
//! allowed so a browser frontend served elsewhere can call the API.

use crate::metrics::MetricsSnapshot;
use crate::processing::BuildError;
use crate::qa::{Answer, QaApi, QaError};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Build the HTTP router exposing the question-answering API.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: QaApi + 'static,
{
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(read_root))
        .route("/search", post(search_documents::<S>))
        .route("/indexed-files", get(get_indexed_files::<S>))
        .route("/reindex", post(reindex_directory::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .layer(cors)
        .with_state(service)
}

async fn read_root() -> Json<serde_json::Value> {
    Json(json!({"status": "API is running"}))
}

/// Request body for `POST /search`.
#[derive(Deserialize)]
struct SearchRequest {
    /// Natural-language question.
    query: String,
    /// Number of chunks to retrieve (defaults to `SEARCH_DEFAULT_K`).
    #[serde(default)]
    k: Option<usize>,
}

/// Answer a question from the indexed documents.
async fn search_documents<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<Answer>, ApiError>
where
    S: QaApi,
{
    let answer = service.ask(&request.query, request.k).await?;
    tracing::info!(sources = answer.sources.len(), "Search request completed");
    Ok(Json(answer))
}

/// Response body for `GET /indexed-files`.
#[derive(Serialize)]
struct IndexedFilesResponse {
    files: Vec<String>,
}

async fn get_indexed_files<S>(State(service): State<Arc<S>>) -> Json<IndexedFilesResponse>
where
    S: QaApi,
{
    Json(IndexedFilesResponse {
        files: service.indexed_files().await,
    })
}

/// Request body for `POST /reindex`.
#[derive(Deserialize)]
struct ReindexRequest {
    /// Directory to scan recursively.
    directory_path: String,
}

/// Response body for `POST /reindex`.
#[derive(Serialize)]
struct ReindexResponse {
    message: String,
    indexed_files: Vec<String>,
}

/// Rebuild the index from a directory.
///
/// Returns 404 when the directory holds nothing processable; the previous index keeps serving
/// in that case.
async fn reindex_directory<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<ReindexRequest>,
) -> Result<Json<ReindexResponse>, ApiError>
where
    S: QaApi,
{
    let directory = PathBuf::from(&request.directory_path);
    let report = service.reindex(&directory).await?;
    if report.is_empty() {
        return Err(ApiError::new(
            StatusCode::NOT_FOUND,
            format!(
                "No processable files were found in directory: {}",
                request.directory_path
            ),
        ));
    }
    tracing::info!(
        directory = %request.directory_path,
        files = report.files.len(),
        chunks = report.chunk_count,
        "Reindex request completed"
    );
    Ok(Json(ReindexResponse {
        message: format!("Successfully re-indexed {} files.", report.files.len()),
        indexed_files: report.files,
    }))
}

/// Return query and indexing counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: QaApi,
{
    Json(service.metrics_snapshot())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "search",
                method: "POST",
                path: "/search",
                description: "Answer a question using only the indexed documents. Response returns { \"answer\": string, \"sources\": [filename] }.",
                request_example: Some(json!({
                    "query": "What were the Q4 revenue drivers?",
                    "k": 4
                })),
            },
            CommandDescriptor {
                name: "indexed_files",
                method: "GET",
                path: "/indexed-files",
                description: "Return the sorted file names contained in the current index.",
                request_example: None,
            },
            CommandDescriptor {
                name: "reindex",
                method: "POST",
                path: "/reindex",
                description: "Extract, chunk, and embed every supported file under a directory, replacing the current index.",
                request_example: Some(json!({
                    "directory_path": "/data/documents"
                })),
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return query and indexing counters useful for observability dashboards.",
                request_example: None,
            },
        ],
    })
}

/// Error rendered as `{"detail": message}`.
struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({"detail": self.detail}))).into_response()
    }
}

impl From<QaError> for ApiError {
    fn from(error: QaError) -> Self {
        let status = match &error {
            QaError::Build(BuildError::NotADirectory(_)) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %error, "Request failed");
        }
        Self::new(status, error.to_string())
    }
}
