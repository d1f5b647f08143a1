//! On-device embeddings with fastembed (AllMiniLML6V2, 384 dimensions)
//!
//! Inference is CPU-bound, so every call runs on the blocking thread pool.

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use kbchat_kernel::rag::Embedder;
use kbchat_kernel::{RagError, RagResult};
use std::sync::{Arc, Mutex};
use tracing::info;

pub const LOCAL_MODEL: &str = "all-MiniLM-L6-v2";
pub const LOCAL_DIMENSIONS: usize = 384;

/// Embedder running a sentence-transformer model in process.
///
/// `TextEmbedding::embed` needs exclusive access, so the model sits behind a
/// `Mutex` shared with the blocking tasks.
pub struct FastEmbedder {
    model: Arc<Mutex<TextEmbedding>>,
}

impl FastEmbedder {
    /// Load the model, downloading it into the fastembed cache on first use.
    pub fn load() -> RagResult<Self> {
        let model = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(false),
        )
        .map_err(|e| RagError::embedding(format!("failed to load {LOCAL_MODEL}: {e}")))?;

        info!(model = LOCAL_MODEL, "Local embedding model loaded");
        Ok(Self {
            model: Arc::new(Mutex::new(model)),
        })
    }

    async fn run(&self, texts: Vec<String>) -> RagResult<Vec<Vec<f32>>> {
        let model = Arc::clone(&self.model);
        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| RagError::embedding("embedding model lock poisoned"))?;
            model
                .embed(texts, None)
                .map_err(|e| RagError::embedding(e.to_string()))
        })
        .await
        .map_err(|e| RagError::embedding(format!("embedding task failed: {e}")))?
    }
}

#[async_trait]
impl Embedder for FastEmbedder {
    fn model(&self) -> &str {
        LOCAL_MODEL
    }

    fn dimensions(&self) -> usize {
        LOCAL_DIMENSIONS
    }

    async fn embed(&self, text: &str) -> RagResult<Vec<f32>> {
        let mut vectors = self.run(vec![text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| RagError::embedding("empty embedding output"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> RagResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.run(texts.iter().map(|text| text.to_string()).collect())
            .await
    }
}
