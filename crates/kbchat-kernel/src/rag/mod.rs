//! RAG (Retrieval-Augmented Generation) traits and types
//!
//! Defines the data model and the embedder and storage abstractions used by
//! the pipeline. Concrete implementations live in kbchat-foundation.

pub mod pipeline;
pub mod store;
pub mod types;

pub use pipeline::{Embedder, EventStream};
pub use store::KnowledgeStore;
pub use types::{
    ChatRecord, ConversationTurn, DEFAULT_CATEGORY, Document, DocumentPatch, NewDocument,
    RankedMatch, Session, SourceType, StreamEvent,
};
