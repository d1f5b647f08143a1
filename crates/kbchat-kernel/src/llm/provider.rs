use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use super::types::GenerationRequest;
use crate::error::RagResult;

/// Incremental text fragments produced by a streaming backend call
pub type FragmentStream = Pin<Box<dyn Stream<Item = RagResult<String>> + Send>>;

/// External language-model backend.
///
/// Implementations must be safe for concurrent use through `&self`; one
/// instance is shared by every in-flight request. Failures are reported as
/// [`RagError::GenerationBackend`](crate::RagError::GenerationBackend) and
/// are never retried by the caller.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Backend name used in logs
    fn name(&self) -> &str;

    /// Model identifier
    fn model(&self) -> &str {
        ""
    }

    /// Single-shot completion
    async fn complete(&self, request: &GenerationRequest) -> RagResult<String>;

    /// Streaming completion.
    ///
    /// The returned stream yields fragments in backend order; an `Err` item
    /// ends the useful part of the stream.
    async fn complete_stream(&self, request: &GenerationRequest) -> RagResult<FragmentStream>;

    /// Connectivity check run once at startup
    async fn health_check(&self) -> RagResult<bool> {
        Ok(true)
    }
}
