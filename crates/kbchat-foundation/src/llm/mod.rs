//! Chat backends

pub mod openai;

pub use openai::{DEFAULT_CHAT_MODEL, OpenAiChatBackend, OpenAiConfig};

// Re-export kernel types for convenience
pub use kbchat_kernel::llm::{ChatBackend, DecodingParams, GenerationRequest};
