//! kbchat foundation
//!
//! Concrete building blocks for the retrieval-augmented chat pipeline:
//! ranking, prompt assembly, response generation with a template fallback,
//! embedders, the OpenAI chat backend, an in-memory knowledge store and the
//! service and configuration that wire them together.

// rag module - ranking, assembly, generation, orchestration
pub mod rag;

// embedder module
pub mod embedder;

// llm module - chat backends
pub mod llm;

// store module
pub mod store;

// service module
pub mod service;

// config module
pub mod config;

pub use config::{EmbeddingProvider, KbChatConfig};
pub use rag::{GenerationMode, RagOrchestrator, ResponseGenerator, RetrievalSettings};
pub use service::{ChatReply, KnowledgeService};
pub use store::InMemoryKnowledgeStore;

// Re-export kernel crate
pub use kbchat_kernel;
