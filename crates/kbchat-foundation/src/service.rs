//! Knowledge and chat service
//!
//! Wires a [`KnowledgeStore`] to the [`RagOrchestrator`]: document CRUD with
//! embedding on write, chat sessions with history and provenance, and
//! semantic search.

use chrono::{DateTime, Utc};
use futures::StreamExt;
use kbchat_kernel::rag::{
    ChatRecord, DEFAULT_CATEGORY, Document, DocumentPatch, EventStream, KnowledgeStore,
    NewDocument, RankedMatch, Session, StreamEvent,
};
use kbchat_kernel::{RagError, RagResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::rag::RagOrchestrator;

/// Turns loaded from the store for each chat request
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Result of one non-streamed chat exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub session_id: String,
    pub response: String,
    pub context_used: Vec<RankedMatch>,
    pub timestamp: DateTime<Utc>,
}

/// Application-level facade over the store and the pipeline
#[derive(Clone)]
pub struct KnowledgeService {
    store: Arc<dyn KnowledgeStore>,
    orchestrator: RagOrchestrator,
    history_limit: usize,
}

impl KnowledgeService {
    pub fn new(store: Arc<dyn KnowledgeStore>, orchestrator: RagOrchestrator) -> Self {
        Self {
            store,
            orchestrator,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn orchestrator(&self) -> &RagOrchestrator {
        &self.orchestrator
    }

    pub fn store(&self) -> &Arc<dyn KnowledgeStore> {
        &self.store
    }

    /// Embed and store a new document
    #[instrument(skip(self, input), fields(title = %input.title))]
    pub async fn add_document(&self, input: NewDocument) -> RagResult<Document> {
        let title = require_text("title", &input.title)?;
        let content = require_text("content", &input.content)?;

        let embedding = self.orchestrator.embedder().embed(&content).await?;
        let category = input
            .category
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

        let mut document = Document::new(Uuid::new_v4().to_string(), title, content, embedding)
            .with_category(category)
            .with_source(input.source_type, input.source_url);
        document.metadata = input.metadata;

        self.store.insert_document(document.clone()).await?;
        info!(id = %document.id, "Document added");
        Ok(document)
    }

    /// Apply a partial update. The embedding is recomputed only when the
    /// content actually changes.
    #[instrument(skip(self, patch))]
    pub async fn update_document(&self, id: &str, patch: DocumentPatch) -> RagResult<Document> {
        if patch.is_empty() {
            return Err(RagError::orchestration("update contains no fields"));
        }

        let mut document = self
            .store
            .get_document(id)
            .await?
            .ok_or_else(|| RagError::NotFound(format!("document {id}")))?;

        if let Some(title) = patch.title {
            document.title = require_text("title", &title)?;
        }
        if let Some(category) = patch.category {
            document.category = category;
        }
        if let Some(metadata) = patch.metadata {
            document.metadata = metadata;
        }
        if let Some(content) = patch.content {
            let content = require_text("content", &content)?;
            if content != document.content || !document.has_embedding() {
                document.embedding = self.orchestrator.embedder().embed(&content).await?;
                document.content = content;
                debug!(id, "Content changed, document re-embedded");
            }
        }
        document.updated_at = Utc::now();

        self.store.replace_document(document.clone()).await?;
        info!(id, "Document updated");
        Ok(document)
    }

    /// Returns false if there was no such document
    pub async fn delete_document(&self, id: &str) -> RagResult<bool> {
        let removed = self.store.delete_document(id).await?;
        if removed {
            info!(id, "Document deleted");
        }
        Ok(removed)
    }

    pub async fn get_document(&self, id: &str) -> RagResult<Option<Document>> {
        self.store.get_document(id).await
    }

    pub async fn list_documents(&self) -> RagResult<Vec<Document>> {
        self.store.list_documents().await
    }

    /// Answer `query` within a session and record the exchange.
    ///
    /// A new session id is generated when `session_id` is `None`. The session
    /// is created on first use and its last activity updated on every call.
    #[instrument(skip(self, query))]
    pub async fn chat(
        &self,
        session_id: Option<&str>,
        query: &str,
        top_k: Option<usize>,
    ) -> RagResult<ChatReply> {
        let session_id = resolve_session(session_id);
        self.store.touch_session(&session_id).await?;
        let documents = self.store.list_documents_with_embeddings().await?;
        let history = self
            .store
            .list_recent_turns(&session_id, self.history_limit)
            .await?;

        let (response, matches) = self
            .orchestrator
            .answer(query, &documents, &history, top_k)
            .await?;

        let record = new_record(&session_id, query, &response, &matches);
        let timestamp = record.created_at;
        self.store.append_chat_record(record).await?;

        Ok(ChatReply {
            session_id,
            response,
            context_used: matches,
            timestamp,
        })
    }

    /// Streamed variant of [`chat`](Self::chat).
    ///
    /// The session is marked active before answering. Events are forwarded
    /// unchanged. The exchange is recorded when the pipeline reports `Done`,
    /// before `Done` is passed on; if recording fails an `Error` event is
    /// sent in its place. Nothing is recorded for a stream that is dropped
    /// early or ends in `Error`.
    pub fn chat_stream(
        &self,
        session_id: impl Into<String>,
        query: impl Into<String>,
        top_k: Option<usize>,
    ) -> EventStream {
        let this = self.clone();
        let session_id = session_id.into();
        let query = query.into();

        Box::pin(async_stream::stream! {
            let loaded = async {
                this.store.touch_session(&session_id).await?;
                let documents = this.store.list_documents_with_embeddings().await?;
                let history = this.store.list_recent_turns(&session_id, this.history_limit).await?;
                Ok::<_, RagError>((documents, history))
            }
            .await;

            let (documents, history) = match loaded {
                Ok(loaded) => loaded,
                Err(e) => {
                    yield StreamEvent::error(e.to_string());
                    return;
                }
            };

            let mut events = this
                .orchestrator
                .answer_stream(query.clone(), documents, history, top_k);
            let mut response = String::new();
            let mut matches = Vec::new();

            while let Some(event) = events.next().await {
                match event {
                    StreamEvent::Context { context } => {
                        matches = context.clone();
                        yield StreamEvent::Context { context };
                    }
                    StreamEvent::Content { content } => {
                        response.push_str(&content);
                        yield StreamEvent::Content { content };
                    }
                    StreamEvent::Done => {
                        let record = new_record(&session_id, &query, &response, &matches);
                        match this.store.append_chat_record(record).await {
                            Ok(()) => {
                                info!(session_id = %session_id, "Chat exchange recorded");
                                yield StreamEvent::Done;
                            }
                            Err(e) => {
                                warn!(session_id = %session_id, error = %e, "Failed to record chat exchange");
                                yield StreamEvent::error(format!("failed to save chat history: {e}"));
                            }
                        }
                        return;
                    }
                    StreamEvent::Error { message } => {
                        yield StreamEvent::Error { message };
                        return;
                    }
                }
            }
        })
    }

    /// Rank stored documents against `query` using the search threshold
    pub async fn search(&self, query: &str, top_k: Option<usize>) -> RagResult<Vec<RankedMatch>> {
        let documents = self.store.list_documents_with_embeddings().await?;
        self.orchestrator.search(query, &documents, top_k).await
    }

    /// The most recent `limit` exchanges of a session, oldest first
    pub async fn history(&self, session_id: &str, limit: usize) -> RagResult<Vec<ChatRecord>> {
        self.store.chat_history(session_id, limit).await
    }

    /// Start a session with a fresh id
    pub async fn create_session(&self) -> RagResult<Session> {
        let session = Session::new(new_session_id());
        self.store.create_session(session.clone()).await?;
        info!(session_id = %session.id, "Session created");
        Ok(session)
    }

    pub async fn get_session(&self, session_id: &str) -> RagResult<Option<Session>> {
        self.store.get_session(session_id).await
    }

    /// Every session, most recently active first
    pub async fn list_sessions(&self) -> RagResult<Vec<Session>> {
        self.store.list_sessions().await
    }
}

/// A fresh session id
pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

fn resolve_session(session_id: Option<&str>) -> String {
    match session_id.map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => new_session_id(),
    }
}

fn require_text(field: &str, value: &str) -> RagResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RagError::orchestration(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

fn new_record(session_id: &str, query: &str, response: &str, matches: &[RankedMatch]) -> ChatRecord {
    ChatRecord {
        id: Uuid::new_v4().to_string(),
        session_id: session_id.to_string(),
        user_message: query.to_string(),
        bot_response: response.to_string(),
        context_used: matches.to_vec(),
        created_at: Utc::now(),
    }
}

impl std::fmt::Debug for KnowledgeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeService")
            .field("orchestrator", &self.orchestrator)
            .field("history_limit", &self.history_limit)
            .finish()
    }
}
