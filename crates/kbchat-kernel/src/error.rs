//! Error taxonomy for the retrieval-augmented pipeline
//!
//! Each variant carries a propagation policy:
//!
//! - [`RagError::Embedding`] is propagated; a request cannot proceed without a
//!   query vector.
//! - [`RagError::GenerationBackend`] is produced by chat backends and consumed
//!   by the response generator, which substitutes the fallback answer.
//! - [`RagError::Orchestration`] is surfaced to the caller as a failed result.

use thiserror::Error;

/// Result type used across kbchat crates
pub type RagResult<T> = Result<T, RagError>;

/// kbchat error type
#[derive(Debug, Clone, Error)]
pub enum RagError {
    /// The embedding model could not process the input
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// The external language-model call failed
    #[error("Generation backend error: {0}")]
    GenerationBackend(String),

    /// Malformed input or a failure around generation
    #[error("Orchestration error: {0}")]
    Orchestration(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl RagError {
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::GenerationBackend(message.into())
    }

    pub fn orchestration(message: impl Into<String>) -> Self {
        Self::Orchestration(message.into())
    }

    /// Whether the caller should ever observe this error.
    ///
    /// Backend failures are masked by the fallback generator.
    pub fn is_masked(&self) -> bool {
        matches!(self, Self::GenerationBackend(_))
    }
}

impl From<std::io::Error> for RagError {
    fn from(err: std::io::Error) -> Self {
        RagError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for RagError {
    fn from(err: serde_json::Error) -> Self {
        RagError::Serialization(err.to_string())
    }
}
