//! kbchat kernel
//!
//! Contracts shared by every kbchat crate: the document and conversation data
//! model, the error taxonomy, and the traits the retrieval-augmented pipeline
//! is assembled from. Concrete implementations live in `kbchat-foundation`.

// error module
pub mod error;

// llm module
pub mod llm;

// rag module
pub mod rag;

// config module
#[cfg(feature = "config")]
pub mod config;

pub use error::{RagError, RagResult};
pub use llm::{ChatBackend, ChatMessage, DecodingParams, FragmentStream, GenerationRequest, Role};
pub use rag::{
    ChatRecord, ConversationTurn, Document, DocumentPatch, Embedder, EventStream, KnowledgeStore,
    NewDocument, RankedMatch, Session, SourceType, StreamEvent,
};
