mod common;

use std::sync::Arc;

use futures::StreamExt;
use kbchat_foundation::embedder::HashingEmbedder;
use kbchat_foundation::rag::{RagOrchestrator, ResponseGenerator};
use kbchat_foundation::{InMemoryKnowledgeStore, KnowledgeService};
use async_trait::async_trait;
use kbchat_kernel::rag::{
    ChatRecord, Document, DocumentPatch, KnowledgeStore, NewDocument, Session, StreamEvent,
};
use kbchat_kernel::{RagError, RagResult};
use tempfile::TempDir;

use common::mock_backend::MockChatBackend;
use common::table_embedder::TableEmbedder;

fn hashing_service(store: Arc<InMemoryKnowledgeStore>) -> KnowledgeService {
    let orchestrator = RagOrchestrator::new(
        Arc::new(HashingEmbedder::default()),
        ResponseGenerator::fallback_only(),
    );
    KnowledgeService::new(store, orchestrator)
}

#[tokio::test]
async fn test_add_document_embeds_content() {
    let store = Arc::new(InMemoryKnowledgeStore::new());
    let service = hashing_service(store.clone());

    let doc = service
        .add_document(NewDocument::new("  Refund Policy ", "Refunds are issued within 30 days."))
        .await
        .unwrap();

    assert_eq!(doc.title, "Refund Policy");
    assert_eq!(doc.category, "general");
    assert_eq!(doc.embedding.len(), 384);
    assert_eq!(store.list_documents_with_embeddings().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_blank_fields_are_rejected() {
    let service = hashing_service(Arc::new(InMemoryKnowledgeStore::new()));
    let err = service
        .add_document(NewDocument::new("Title", "   "))
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::Orchestration(_)));
    assert!(service.list_documents().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_update_re_embeds_only_on_content_change() {
    let embedder = Arc::new(
        TableEmbedder::new(2)
            .with("Open 9-5", vec![1.0, 0.0])
            .with("Open 9-6", vec![0.0, 1.0]),
    );
    let orchestrator = RagOrchestrator::new(embedder.clone(), ResponseGenerator::fallback_only());
    let service = KnowledgeService::new(Arc::new(InMemoryKnowledgeStore::new()), orchestrator);

    let doc = service
        .add_document(NewDocument::new("Hours", "Open 9-5").with_category("faq"))
        .await
        .unwrap();
    assert_eq!(embedder.calls().len(), 1);

    let renamed = service
        .update_document(
            &doc.id,
            DocumentPatch {
                title: Some("Opening Hours".into()),
                content: Some("Open 9-5".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.title, "Opening Hours");
    assert_eq!(renamed.embedding, vec![1.0, 0.0]);
    assert_eq!(embedder.calls().len(), 1);

    let changed = service
        .update_document(
            &doc.id,
            DocumentPatch {
                content: Some("Open 9-6".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(changed.embedding, vec![0.0, 1.0]);
    assert_eq!(changed.category, "faq");
    assert_eq!(embedder.calls(), vec!["Open 9-5", "Open 9-6"]);
}

#[tokio::test]
async fn test_update_missing_document_is_not_found() {
    let service = hashing_service(Arc::new(InMemoryKnowledgeStore::new()));
    let patch = DocumentPatch {
        title: Some("x".into()),
        ..Default::default()
    };
    assert!(matches!(
        service.update_document("missing", patch).await,
        Err(RagError::NotFound(_))
    ));
    assert!(matches!(
        service.update_document("missing", DocumentPatch::default()).await,
        Err(RagError::Orchestration(_))
    ));
}

#[tokio::test]
async fn test_chat_records_exchange_with_provenance() {
    let service = hashing_service(Arc::new(InMemoryKnowledgeStore::new()));
    service
        .add_document(NewDocument::new(
            "Refund Policy",
            "Refund requests are accepted within 30 days of purchase.",
        ))
        .await
        .unwrap();

    let reply = service
        .chat(Some("s1"), "Are refund requests accepted within 30 days?", None)
        .await
        .unwrap();

    assert_eq!(reply.session_id, "s1");
    assert_eq!(reply.context_used.len(), 1);
    assert!(reply.response.contains("Refund Policy"));

    let history = service.history("s1", 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].user_message, "Are refund requests accepted within 30 days?");
    assert_eq!(history[0].bot_response, reply.response);
    assert_eq!(history[0].context_used, reply.context_used);
}

#[tokio::test]
async fn test_chat_without_session_starts_one() {
    let service = hashing_service(Arc::new(InMemoryKnowledgeStore::new()));
    let reply = service.chat(None, "Hello?", None).await.unwrap();
    assert!(!reply.session_id.is_empty());
    assert!(reply.response.contains("couldn't find"));
    assert_eq!(service.history(&reply.session_id, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_chat_history_feeds_the_prompt() {
    let backend = Arc::new(
        MockChatBackend::builder()
            .respond_with("First answer")
            .respond_with("Second answer")
            .build(),
    );
    let orchestrator = RagOrchestrator::new(
        Arc::new(HashingEmbedder::default()),
        ResponseGenerator::with_backend(backend.clone()),
    );
    let service = KnowledgeService::new(Arc::new(InMemoryKnowledgeStore::new()), orchestrator);

    service.chat(Some("s1"), "First question", None).await.unwrap();
    service.chat(Some("s1"), "Second question", None).await.unwrap();

    let request = backend.last_request().unwrap();
    let contents: Vec<&str> = request.messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(&contents[1..], &["First question", "First answer", "Second question"]);
}

#[tokio::test]
async fn test_chat_stream_persists_after_done() {
    let store = Arc::new(InMemoryKnowledgeStore::new());
    let service = hashing_service(store.clone());

    let events: Vec<StreamEvent> = service.chat_stream("s1", "Anything there?", None).collect().await;

    assert!(matches!(events.first(), Some(StreamEvent::Context { .. })));
    assert_eq!(events.last(), Some(&StreamEvent::Done));
    let streamed: String = events.iter().filter_map(StreamEvent::as_content).collect();

    let history = service.history("s1", 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].bot_response, streamed);
}

#[tokio::test]
async fn test_abandoned_chat_stream_records_nothing() {
    let service = hashing_service(Arc::new(InMemoryKnowledgeStore::new()));

    let mut stream = service.chat_stream("s1", "Anything there?", None);
    assert!(matches!(stream.next().await, Some(StreamEvent::Context { .. })));
    assert!(matches!(stream.next().await, Some(StreamEvent::Content { .. })));
    drop(stream);

    assert!(service.history("s1", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_chat_stream_blank_query_records_nothing() {
    let service = hashing_service(Arc::new(InMemoryKnowledgeStore::new()));
    let events: Vec<StreamEvent> = service.chat_stream("s1", "  ", None).collect().await;

    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], StreamEvent::Error { .. }));
    assert!(service.history("s1", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_search_ranks_stored_documents() {
    let embedder = Arc::new(
        TableEmbedder::new(2)
            .with("Open 9-5", vec![1.0, 0.0])
            .with("When do you open?", vec![0.97, 0.25]),
    );
    let orchestrator = RagOrchestrator::new(embedder, ResponseGenerator::fallback_only());
    let service = KnowledgeService::new(Arc::new(InMemoryKnowledgeStore::new()), orchestrator);
    service.add_document(NewDocument::new("Hours", "Open 9-5")).await.unwrap();

    let results = service.search("When do you open?", Some(5)).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].title, "Hours");
}

#[tokio::test]
async fn test_documents_and_history_survive_restart() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("kbchat-store.json");

    let id = {
        let store = Arc::new(InMemoryKnowledgeStore::open(&path).await.unwrap());
        let service = hashing_service(store);
        let doc = service
            .add_document(NewDocument::new("Shipping", "Orders ship within two business days."))
            .await
            .unwrap();
        service.chat(Some("s1"), "How fast is shipping?", None).await.unwrap();
        doc.id
    };

    let store = Arc::new(InMemoryKnowledgeStore::open(&path).await.unwrap());
    let service = hashing_service(store);
    assert!(service.get_document(&id).await.unwrap().is_some());
    assert_eq!(service.history("s1", 10).await.unwrap().len(), 1);
    assert!(service.delete_document(&id).await.unwrap());
    assert!(!service.delete_document(&id).await.unwrap());
}

/// In-memory store whose chat-record writes always fail
#[derive(Default)]
struct RejectingChatStore {
    inner: InMemoryKnowledgeStore,
}

#[async_trait]
impl KnowledgeStore for RejectingChatStore {
    async fn list_documents_with_embeddings(&self) -> RagResult<Vec<Document>> {
        self.inner.list_documents_with_embeddings().await
    }

    async fn insert_document(&self, document: Document) -> RagResult<()> {
        self.inner.insert_document(document).await
    }

    async fn get_document(&self, id: &str) -> RagResult<Option<Document>> {
        self.inner.get_document(id).await
    }

    async fn list_documents(&self) -> RagResult<Vec<Document>> {
        self.inner.list_documents().await
    }

    async fn replace_document(&self, document: Document) -> RagResult<()> {
        self.inner.replace_document(document).await
    }

    async fn delete_document(&self, id: &str) -> RagResult<bool> {
        self.inner.delete_document(id).await
    }

    async fn append_chat_record(&self, _record: ChatRecord) -> RagResult<()> {
        Err(RagError::Storage("disk full".into()))
    }

    async fn chat_history(&self, session_id: &str, limit: usize) -> RagResult<Vec<ChatRecord>> {
        self.inner.chat_history(session_id, limit).await
    }

    async fn create_session(&self, session: Session) -> RagResult<bool> {
        self.inner.create_session(session).await
    }

    async fn touch_session(&self, session_id: &str) -> RagResult<Session> {
        self.inner.touch_session(session_id).await
    }

    async fn get_session(&self, session_id: &str) -> RagResult<Option<Session>> {
        self.inner.get_session(session_id).await
    }

    async fn list_sessions(&self) -> RagResult<Vec<Session>> {
        self.inner.list_sessions().await
    }
}

#[tokio::test]
async fn test_chat_stream_failed_save_ends_in_error() {
    let service = hashing_service(Arc::new(InMemoryKnowledgeStore::new()));
    let store = Arc::new(RejectingChatStore::default());
    let service = KnowledgeService::new(store, service.orchestrator().clone());

    let events: Vec<StreamEvent> = service.chat_stream("s1", "Anything there?", None).collect().await;

    assert!(matches!(events.first(), Some(StreamEvent::Context { .. })));
    assert!(matches!(
        events.last(),
        Some(StreamEvent::Error { message }) if message.contains("disk full")
    ));
    assert!(!events.contains(&StreamEvent::Done));
    assert!(service.history("s1", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_chat_failed_save_is_an_error() {
    let service = hashing_service(Arc::new(InMemoryKnowledgeStore::new()));
    let service = KnowledgeService::new(
        Arc::new(RejectingChatStore::default()),
        service.orchestrator().clone(),
    );

    let err = service.chat(Some("s1"), "Anything there?", None).await.unwrap_err();
    assert!(matches!(err, RagError::Storage(_)));
    assert!(service.history("s1", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_chat_creates_and_touches_session() {
    let service = hashing_service(Arc::new(InMemoryKnowledgeStore::new()));

    service.chat(Some("s1"), "First question", None).await.unwrap();
    let first = service.get_session("s1").await.unwrap().unwrap();

    let _: Vec<StreamEvent> = service.chat_stream("s1", "Second question", None).collect().await;
    let second = service.get_session("s1").await.unwrap().unwrap();

    assert_eq!(second.created_at, first.created_at);
    assert!(second.last_activity >= first.last_activity);
    assert_eq!(service.list_sessions().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_session_then_chat_in_it() {
    let service = hashing_service(Arc::new(InMemoryKnowledgeStore::new()));
    let session = service.create_session().await.unwrap();
    assert!(service.get_session(&session.id).await.unwrap().is_some());

    let reply = service.chat(Some(&session.id), "Hello?", None).await.unwrap();
    assert_eq!(reply.session_id, session.id);

    let sessions = service.list_sessions().await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert!(service.get_session("missing").await.unwrap().is_none());
}
