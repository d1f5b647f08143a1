//! Embedder implementations
//!
//! - [`HashingEmbedder`]: deterministic feature hashing, no model needed
//! - [`OpenAiEmbedder`]: OpenAI-compatible `/v1/embeddings`
//! - `FastEmbedder` (feature `local-model`): AllMiniLML6V2 via fastembed

pub mod hashing;
pub mod openai;

#[cfg(feature = "local-model")]
pub mod local;

pub use hashing::HashingEmbedder;
pub use openai::{DEFAULT_EMBEDDING_MODEL, OpenAiEmbedder};

#[cfg(feature = "local-model")]
pub use local::FastEmbedder;
