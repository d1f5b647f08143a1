mod common;

use std::sync::Arc;

use futures::StreamExt;
use kbchat_foundation::rag::{
    NO_MATCH_ANSWER, RagOrchestrator, ResponseGenerator, SYSTEM_PROMPT, fallback_answer,
};
use kbchat_kernel::llm::Role;
use kbchat_kernel::rag::{ConversationTurn, Document, StreamEvent};

use common::mock_backend::MockChatBackend;
use common::table_embedder::TableEmbedder;

const HOURS_QUERY: &str = "What are your business hours?";

fn hours_document() -> Document {
    Document::new(
        "hours",
        "Business Hours",
        "We are open Monday through Friday, 9-6 EST.",
        vec![0.95, 0.05, 0.0],
    )
    .with_category("faq")
}

fn knowledge_base() -> Vec<Document> {
    vec![
        hours_document(),
        Document::new("returns", "Return Policy", "Returns are accepted within 30 days.", vec![0.0, 1.0, 0.0]),
        Document::new("unembedded", "Draft", "Not embedded yet.", vec![]),
    ]
}

fn embedder() -> Arc<TableEmbedder> {
    Arc::new(
        TableEmbedder::new(3)
            .with(HOURS_QUERY, vec![1.0, 0.0, 0.0])
            .with("Tell me about returns", vec![0.0, 1.0, 0.0]),
    )
}

fn fallback_orchestrator() -> RagOrchestrator {
    RagOrchestrator::new(embedder(), ResponseGenerator::fallback_only())
}

fn backend_orchestrator(backend: MockChatBackend) -> (RagOrchestrator, Arc<MockChatBackend>) {
    let backend = Arc::new(backend);
    let orchestrator = RagOrchestrator::new(embedder(), ResponseGenerator::with_backend(backend.clone()));
    (orchestrator, backend)
}

fn content_of(events: &[StreamEvent]) -> String {
    events.iter().filter_map(StreamEvent::as_content).collect()
}

fn assert_well_formed(events: &[StreamEvent]) {
    assert!(matches!(events.first(), Some(StreamEvent::Context { .. })));
    assert_eq!(events.iter().filter(|e| matches!(e, StreamEvent::Context { .. })).count(), 1);
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    assert!(events.last().is_some_and(StreamEvent::is_terminal));
}

#[tokio::test]
async fn test_business_hours_fallback_answer() {
    let (answer, matches) = fallback_orchestrator()
        .answer(HOURS_QUERY, &knowledge_base(), &[], None)
        .await
        .unwrap();

    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].document_id, "hours");
    assert!(matches[0].score > 0.9);
    assert!(answer.contains("Business Hours"));
    assert!(answer.contains("We are open Monday through Friday, 9-6 EST."));
}

#[tokio::test]
async fn test_empty_document_set_gives_no_match_answer() {
    let (answer, matches) = fallback_orchestrator()
        .answer(HOURS_QUERY, &[], &[], None)
        .await
        .unwrap();

    assert!(matches.is_empty());
    assert_eq!(answer, NO_MATCH_ANSWER);
    assert!(answer.contains("couldn't find"));
}

#[tokio::test]
async fn test_unrelated_query_falls_below_threshold() {
    // Unknown text embeds to the zero vector, so every score is 0.0
    let (answer, matches) = fallback_orchestrator()
        .answer("Do you sell gift cards?", &knowledge_base(), &[], None)
        .await
        .unwrap();

    assert!(matches.is_empty());
    assert!(answer.contains("couldn't find"));
}

#[tokio::test]
async fn test_fallback_stream_concatenates_to_single_answer() {
    let orchestrator = fallback_orchestrator();
    let (single, matches) = orchestrator
        .answer(HOURS_QUERY, &knowledge_base(), &[], None)
        .await
        .unwrap();

    let events: Vec<StreamEvent> = orchestrator
        .answer_stream(HOURS_QUERY, knowledge_base(), vec![], None)
        .collect()
        .await;

    assert_well_formed(&events);
    assert_eq!(events[0], StreamEvent::context(matches));
    assert_eq!(events.last(), Some(&StreamEvent::Done));
    assert_eq!(content_of(&events), single);
    // Fallback text is streamed word by word
    assert!(events.iter().filter(|e| e.as_content().is_some()).count() > 5);
}

#[tokio::test]
async fn test_backend_receives_assembled_prompt() {
    let (orchestrator, backend) =
        backend_orchestrator(MockChatBackend::builder().respond_with("  We're open 9-6 EST!  ").build());
    let history = vec![ConversationTurn::new("Hi", "Hello! How can I help?")];

    let (answer, matches) = orchestrator
        .answer(HOURS_QUERY, &knowledge_base(), &history, None)
        .await
        .unwrap();

    assert_eq!(answer, "We're open 9-6 EST!");
    assert_eq!(matches.len(), 1);

    let request = backend.last_request().unwrap();
    let roles: Vec<Role> = request.messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
    assert_eq!(request.messages[0].content, SYSTEM_PROMPT);
    let last = request.last_user_message().unwrap();
    assert!(last.starts_with("Context from knowledge base:\n\n[Business Hours]\n"));
    assert!(last.ends_with(&format!("User question: {HOURS_QUERY}")));
}

#[tokio::test]
async fn test_backend_failure_is_masked_in_answer() {
    let (orchestrator, backend) =
        backend_orchestrator(MockChatBackend::builder().fail_with("503 Service Unavailable").build());

    let (answer, matches) = orchestrator
        .answer(HOURS_QUERY, &knowledge_base(), &[], None)
        .await
        .unwrap();

    assert_eq!(backend.complete_call_count(), 1);
    assert_eq!(answer, fallback_answer(&matches));
}

#[tokio::test]
async fn test_backend_stream_is_forwarded() {
    let (orchestrator, backend) = backend_orchestrator(
        MockChatBackend::builder()
            .stream_fragments(["We're ", "", "open ", "9-6 EST."])
            .build(),
    );

    let events: Vec<StreamEvent> = orchestrator
        .answer_stream(HOURS_QUERY, knowledge_base(), vec![], None)
        .collect()
        .await;

    assert_well_formed(&events);
    assert_eq!(backend.stream_call_count(), 1);
    let fragments: Vec<&str> = events.iter().filter_map(StreamEvent::as_content).collect();
    assert_eq!(fragments, vec!["We're ", "open ", "9-6 EST."]);
    assert_eq!(events.last(), Some(&StreamEvent::Done));
}

#[tokio::test]
async fn test_stream_refused_by_backend_replays_fallback() {
    let (orchestrator, _backend) =
        backend_orchestrator(MockChatBackend::builder().refuse_stream("connection refused").build());

    let events: Vec<StreamEvent> = orchestrator
        .answer_stream(HOURS_QUERY, knowledge_base(), vec![], None)
        .collect()
        .await;

    assert_well_formed(&events);
    let StreamEvent::Context { context } = &events[0] else {
        panic!("first event must be Context");
    };
    assert_eq!(content_of(&events), fallback_answer(context));
    assert_eq!(events.last(), Some(&StreamEvent::Done));
}

#[tokio::test]
async fn test_mid_stream_failure_keeps_partial_output() {
    let (orchestrator, _backend) = backend_orchestrator(
        MockChatBackend::builder()
            .stream_then_fail(["We're ", "open "], "stream reset")
            .build(),
    );

    let events: Vec<StreamEvent> = orchestrator
        .answer_stream(HOURS_QUERY, knowledge_base(), vec![], None)
        .collect()
        .await;

    assert_well_formed(&events);
    let StreamEvent::Context { context } = &events[0] else {
        panic!("first event must be Context");
    };
    assert_eq!(content_of(&events), format!("We're open {}", fallback_answer(context)));
    assert!(!events.iter().any(|e| matches!(e, StreamEvent::Error { .. })));
}

#[tokio::test]
async fn test_stream_embedding_failure_is_single_error() {
    let orchestrator = RagOrchestrator::new(
        Arc::new(TableEmbedder::new(3).strict()),
        ResponseGenerator::fallback_only(),
    );

    let events: Vec<StreamEvent> = orchestrator
        .answer_stream("anything", knowledge_base(), vec![], None)
        .collect()
        .await;

    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], StreamEvent::Error { message } if message.contains("Embedding error")));
}

#[tokio::test]
async fn test_dropped_stream_stops_early() {
    let (orchestrator, backend) = backend_orchestrator(
        MockChatBackend::builder()
            .stream_fragments(["one ", "two ", "three"])
            .build(),
    );

    let mut stream = orchestrator.answer_stream(HOURS_QUERY, knowledge_base(), vec![], None);
    assert!(matches!(stream.next().await, Some(StreamEvent::Context { .. })));
    assert_eq!(stream.next().await, Some(StreamEvent::content("one ")));
    assert!(!backend.stream_released());

    drop(stream);

    assert!(backend.stream_released());
    assert_eq!(backend.fragments_pulled(), 1);
}

#[tokio::test]
async fn test_concurrent_sessions_do_not_interfere() {
    let orchestrator = fallback_orchestrator();
    let documents = knowledge_base();

    let (hours, returns) = tokio::join!(
        orchestrator.answer(HOURS_QUERY, &documents, &[], None),
        orchestrator.answer("Tell me about returns", &documents, &[], None),
    );

    assert_eq!(hours.unwrap().1[0].document_id, "hours");
    assert_eq!(returns.unwrap().1[0].document_id, "returns");
}
