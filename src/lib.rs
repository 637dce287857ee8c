#![deny(missing_docs)]

//! Core library for docqa, a local document question-answering service.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Text extraction from supported document formats.
pub mod extract;
/// Vector index, chunk metadata, and persistence.
pub mod index;
/// Language model client used for answer generation.
pub mod llm;
/// Structured logging and tracing setup.
pub mod logging;
/// Query and indexing counters.
pub mod metrics;
/// Chunking and index build pipeline.
pub mod processing;
/// Retrieval-augmented question answering.
pub mod qa;
