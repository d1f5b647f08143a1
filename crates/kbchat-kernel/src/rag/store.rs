//! KnowledgeStore trait definition
//!
//! Defines the storage collaborator the pipeline reads documents and chat
//! history from. Concrete implementations live in kbchat-foundation.

use crate::error::RagResult;
use crate::rag::types::{ChatRecord, ConversationTurn, Document, Session};
use async_trait::async_trait;

/// Document and chat-history storage.
///
/// # Example
///
/// ```rust,ignore
/// use kbchat_kernel::rag::KnowledgeStore;
///
/// let documents = store.list_documents_with_embeddings().await?;
/// let history = store.list_recent_turns("session-1", 10).await?;
/// let (answer, matches) = orchestrator.answer(query, &documents, &history, Some(3)).await?;
/// ```
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Every document that carries a non-empty embedding
    async fn list_documents_with_embeddings(&self) -> RagResult<Vec<Document>>;

    /// The most recent `limit` turns of a session, oldest first
    async fn list_recent_turns(
        &self,
        session_id: &str,
        limit: usize,
    ) -> RagResult<Vec<ConversationTurn>> {
        let records = self.chat_history(session_id, limit).await?;
        Ok(records.iter().map(ConversationTurn::from).collect())
    }

    /// Insert a new document. Fails if the id is already taken.
    async fn insert_document(&self, document: Document) -> RagResult<()>;

    async fn get_document(&self, id: &str) -> RagResult<Option<Document>>;

    /// All documents, newest first
    async fn list_documents(&self) -> RagResult<Vec<Document>>;

    /// Replace an existing document. Fails with `NotFound` if it is missing.
    async fn replace_document(&self, document: Document) -> RagResult<()>;

    /// Returns true if the document existed
    async fn delete_document(&self, id: &str) -> RagResult<bool>;

    async fn append_chat_record(&self, record: ChatRecord) -> RagResult<()>;

    /// The most recent `limit` records of a session, oldest first
    async fn chat_history(&self, session_id: &str, limit: usize) -> RagResult<Vec<ChatRecord>>;

    /// Store a new session. Returns false if the id is already taken.
    async fn create_session(&self, session: Session) -> RagResult<bool>;

    /// Mark a session as used now, creating it if it does not exist yet
    async fn touch_session(&self, session_id: &str) -> RagResult<Session>;

    async fn get_session(&self, session_id: &str) -> RagResult<Option<Session>>;

    /// All sessions, most recently active first
    async fn list_sessions(&self) -> RagResult<Vec<Session>>;
}
