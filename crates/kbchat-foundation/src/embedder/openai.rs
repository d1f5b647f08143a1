//! OpenAI embeddings endpoint

use async_openai::{Client, config::OpenAIConfig as AsyncOpenAIConfig, types::CreateEmbeddingRequestArgs};
use async_trait::async_trait;
use kbchat_kernel::rag::Embedder;
use kbchat_kernel::{RagError, RagResult};
use tracing::debug;

use crate::llm::OpenAiConfig;

pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Vector size requested from the endpoint unless configured otherwise
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 1536;

/// Embedder backed by `/v1/embeddings`
pub struct OpenAiEmbedder {
    client: Client<AsyncOpenAIConfig>,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbedder {
    /// Connect using the same credentials as the chat backend
    pub fn new(connection: &OpenAiConfig, model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            client: connection.client(),
            model: model.into(),
            dimensions,
        }
    }

    pub fn with_defaults(connection: &OpenAiConfig) -> Self {
        Self::new(connection, DEFAULT_EMBEDDING_MODEL, DEFAULT_EMBEDDING_DIMENSIONS)
    }

    async fn request(&self, input: Vec<String>) -> RagResult<Vec<Vec<f32>>> {
        let expected = input.len();
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(input)
            .dimensions(self.dimensions as u32)
            .build()
            .map_err(|e| RagError::embedding(e.to_string()))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| RagError::embedding(e.to_string()))?;

        let mut data = response.data;
        data.sort_by_key(|embedding| embedding.index);
        if data.len() != expected {
            return Err(RagError::embedding(format!(
                "expected {expected} embeddings, got {}",
                data.len()
            )));
        }

        debug!(model = %self.model, count = expected, "Embedded texts");
        Ok(data.into_iter().map(|embedding| embedding.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> RagResult<Vec<f32>> {
        let mut vectors = self.request(vec![text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| RagError::embedding("empty embedding response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> RagResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts.iter().map(|text| text.to_string()).collect())
            .await
    }
}
