//! Knowledge store implementations

pub mod memory;

pub use memory::InMemoryKnowledgeStore;

// Re-export kernel types for convenience
pub use kbchat_kernel::rag::KnowledgeStore;
