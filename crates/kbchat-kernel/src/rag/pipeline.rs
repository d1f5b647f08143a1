//! RAG pipeline contracts

use crate::error::RagResult;
use crate::rag::types::StreamEvent;
use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;

/// Ordered, finite sequence of events for one streamed answer
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Turns text into a fixed-length vector.
///
/// Implementations are deterministic: the same text under the same model
/// yields the same vector. Input is not validated here; rejecting blank text
/// is the caller's job. Failures are [`RagError::Embedding`](crate::RagError::Embedding).
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier, for logs
    fn model(&self) -> &str;

    /// Dimensionality of every vector this embedder produces
    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str) -> RagResult<Vec<f32>>;

    /// Embed several texts, preserving order.
    async fn embed_batch(&self, texts: &[&str]) -> RagResult<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}
