//! Document processing pipeline: extraction, chunking, embedding, and index builds.

mod builder;
pub mod chunking;
pub mod types;

pub use builder::{BuildOutcome, BuildSettings, IndexBuilder};
pub use chunking::{ChunkingSettings, TextChunker, chunk_text};
pub use types::{BuildError, BuildReport, ChunkingError};
