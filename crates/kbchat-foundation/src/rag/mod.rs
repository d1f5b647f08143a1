//! Retrieval-augmented answering
//!
//! Ranking, prompt assembly, fallback templates, response generation and the
//! orchestrator that ties them together.

pub mod assembler;
pub mod fallback;
pub mod generator;
pub mod orchestrator;
pub mod similarity;

pub use assembler::{ContextAssembler, DEFAULT_HISTORY_WINDOW, SYSTEM_PROMPT};
pub use fallback::{NO_MATCH_ANSWER, fallback_answer, word_fragments};
pub use generator::{GenerationMode, ResponseGenerator};
pub use orchestrator::{RagOrchestrator, RetrievalSettings};
pub use similarity::{CHAT_THRESHOLD, DEFAULT_TOP_K, SEARCH_THRESHOLD, cosine_similarity, rank};

// Re-export kernel types for convenience
pub use kbchat_kernel::rag::{
    ConversationTurn, Document, Embedder, EventStream, RankedMatch, StreamEvent,
};
