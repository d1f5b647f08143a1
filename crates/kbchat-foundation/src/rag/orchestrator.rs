//! End-to-end retrieval-augmented answering
//!
//! One request runs embed, rank, assemble and generate in sequence. The
//! orchestrator holds no per-request state, so a single instance serves any
//! number of concurrent sessions.

use futures::StreamExt;
use kbchat_kernel::rag::{ConversationTurn, Document, Embedder, EventStream, RankedMatch, StreamEvent};
use kbchat_kernel::{RagError, RagResult};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::assembler::ContextAssembler;
use super::generator::ResponseGenerator;
use super::similarity::{self, CHAT_THRESHOLD, DEFAULT_TOP_K, SEARCH_THRESHOLD};

/// Retrieval settings applied to every request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalSettings {
    /// Matches kept when the caller passes no `top_k`
    pub top_k: usize,
    /// Minimum score for a chat answer's context
    pub chat_threshold: f32,
    /// Minimum score for search results
    pub search_threshold: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            chat_threshold: CHAT_THRESHOLD,
            search_threshold: SEARCH_THRESHOLD,
        }
    }
}

/// Coordinates the embedder, the ranker, the assembler and the generator.
///
/// # Example
///
/// ```rust,ignore
/// let orchestrator = RagOrchestrator::new(embedder, ResponseGenerator::fallback_only());
/// let (answer, matches) = orchestrator
///     .answer("What are your business hours?", &documents, &history, None)
///     .await?;
/// ```
#[derive(Clone)]
pub struct RagOrchestrator {
    embedder: Arc<dyn Embedder>,
    generator: ResponseGenerator,
    assembler: ContextAssembler,
    settings: RetrievalSettings,
}

impl RagOrchestrator {
    pub fn new(embedder: Arc<dyn Embedder>, generator: ResponseGenerator) -> Self {
        Self {
            embedder,
            generator,
            assembler: ContextAssembler::default(),
            settings: RetrievalSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: RetrievalSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_assembler(mut self, assembler: ContextAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn generator(&self) -> &ResponseGenerator {
        &self.generator
    }

    pub fn settings(&self) -> &RetrievalSettings {
        &self.settings
    }

    /// Answer `query` in one piece.
    ///
    /// Returns the answer text together with the matches it was grounded
    /// on. Fails only when the input is malformed or the query cannot be
    /// embedded; backend failures are answered from the fallback template.
    #[instrument(skip(self, documents, history), fields(query_len = query.len(), documents = documents.len()))]
    pub async fn answer(
        &self,
        query: &str,
        documents: &[Document],
        history: &[ConversationTurn],
        top_k: Option<usize>,
    ) -> RagResult<(String, Vec<RankedMatch>)> {
        let top_k = self.resolve_top_k(top_k);
        validate(query, top_k)?;

        let matches = self
            .retrieve(query, documents, top_k, self.settings.chat_threshold)
            .await?;
        let request = self.assembler.build(query, &matches, history);
        let answer = self.generator.generate(&request, &matches).await;

        info!(
            matches = matches.len(),
            mode = self.generator.mode().as_str(),
            "Answered query"
        );
        Ok((answer, matches))
    }

    /// Answer `query` as a stream of events.
    ///
    /// The stream yields `Context`, then `Content` fragments, then `Done`.
    /// Malformed input or an embedding failure yields a single `Error`
    /// event instead. Nothing runs until the stream is first polled.
    pub fn answer_stream(
        &self,
        query: impl Into<String>,
        documents: Vec<Document>,
        history: Vec<ConversationTurn>,
        top_k: Option<usize>,
    ) -> EventStream {
        let this = self.clone();
        let query = query.into();

        Box::pin(async_stream::stream! {
            let top_k = this.resolve_top_k(top_k);
            if let Err(e) = validate(&query, top_k) {
                yield StreamEvent::error(e.to_string());
                return;
            }

            let matches = match this
                .retrieve(&query, &documents, top_k, this.settings.chat_threshold)
                .await
            {
                Ok(matches) => matches,
                Err(e) => {
                    yield StreamEvent::error(e.to_string());
                    return;
                }
            };

            let request = this.assembler.build(&query, &matches, &history);
            let mut events = this.generator.generate_stream(request, matches);
            while let Some(event) = events.next().await {
                yield event;
            }
        })
    }

    /// Rank `documents` against `query` without generating an answer.
    ///
    /// Uses the search threshold, which is lower than the chat threshold.
    #[instrument(skip(self, documents), fields(query_len = query.len(), documents = documents.len()))]
    pub async fn search(
        &self,
        query: &str,
        documents: &[Document],
        top_k: Option<usize>,
    ) -> RagResult<Vec<RankedMatch>> {
        let top_k = self.resolve_top_k(top_k);
        validate(query, top_k)?;
        self.retrieve(query, documents, top_k, self.settings.search_threshold)
            .await
    }

    async fn retrieve(
        &self,
        query: &str,
        documents: &[Document],
        top_k: usize,
        threshold: f32,
    ) -> RagResult<Vec<RankedMatch>> {
        let vector = self.embedder.embed(query).await?;
        let matches = similarity::rank(&vector, documents, top_k, threshold);
        debug!(
            model = self.embedder.model(),
            candidates = documents.len(),
            matches = matches.len(),
            threshold,
            "Ranked documents"
        );
        Ok(matches)
    }

    fn resolve_top_k(&self, top_k: Option<usize>) -> usize {
        top_k.unwrap_or(self.settings.top_k)
    }
}

fn validate(query: &str, top_k: usize) -> RagResult<()> {
    if query.trim().is_empty() {
        return Err(RagError::orchestration("query must not be empty"));
    }
    if top_k == 0 {
        return Err(RagError::orchestration("top_k must be at least 1"));
    }
    Ok(())
}

impl std::fmt::Debug for RagOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagOrchestrator")
            .field("embedder", &self.embedder.model())
            .field("generator", &self.generator)
            .field("settings", &self.settings)
            .finish()
    }
}
