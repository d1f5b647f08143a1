//! Response generation with a deterministic fallback
//!
//! [`ResponseGenerator`] calls the configured [`ChatBackend`] when there is
//! one. Any backend failure is logged and answered with the template text
//! from [`fallback`](super::fallback) instead, so callers never observe a
//! [`RagError::GenerationBackend`](kbchat_kernel::RagError::GenerationBackend).

use futures::StreamExt;
use kbchat_kernel::llm::{ChatBackend, GenerationRequest};
use kbchat_kernel::rag::{EventStream, RankedMatch, StreamEvent};
use std::sync::Arc;
use tracing::{debug, warn};

use super::fallback::{fallback_answer, word_fragments};

/// Which path answers are produced by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    Backend,
    Fallback,
}

impl GenerationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationMode::Backend => "backend",
            GenerationMode::Fallback => "fallback",
        }
    }
}

/// Produces answers for an assembled request.
///
/// Cloning is cheap; clones share the backend client.
#[derive(Clone, Default)]
pub struct ResponseGenerator {
    backend: Option<Arc<dyn ChatBackend>>,
}

impl ResponseGenerator {
    /// Generator that calls `backend`
    pub fn with_backend(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    /// Generator that only ever uses the template answers
    pub fn fallback_only() -> Self {
        Self { backend: None }
    }

    pub fn mode(&self) -> GenerationMode {
        if self.backend.is_some() {
            GenerationMode::Backend
        } else {
            GenerationMode::Fallback
        }
    }

    pub fn backend(&self) -> Option<&Arc<dyn ChatBackend>> {
        self.backend.as_ref()
    }

    /// Produce a complete answer.
    ///
    /// `matches` are only read on the fallback path.
    pub async fn generate(&self, request: &GenerationRequest, matches: &[RankedMatch]) -> String {
        let Some(backend) = &self.backend else {
            return fallback_answer(matches);
        };

        match backend.complete(request).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!(
                    backend = backend.name(),
                    error = %e,
                    "Chat backend failed, answering from fallback template"
                );
                fallback_answer(matches)
            }
        }
    }

    /// Produce an answer as a stream of events.
    ///
    /// The stream yields `Context(matches)` first, then content fragments,
    /// then `Done`. If the backend fails before or during the stream, the
    /// complete fallback text is emitted word by word after whatever was
    /// already sent, followed by `Done`. Dropping the stream drops the
    /// backend stream with it.
    pub fn generate_stream(&self, request: GenerationRequest, matches: Vec<RankedMatch>) -> EventStream {
        let backend = self.backend.clone();

        Box::pin(async_stream::stream! {
            yield StreamEvent::context(matches.clone());

            let use_fallback = match backend {
                None => true,
                Some(backend) => match backend.complete_stream(&request).await {
                    Ok(mut fragments) => {
                        let mut failed = false;
                        let mut emitted = 0usize;
                        while let Some(item) = fragments.next().await {
                            match item {
                                Ok(fragment) => {
                                    if !fragment.is_empty() {
                                        emitted += 1;
                                        yield StreamEvent::content(fragment);
                                    }
                                }
                                Err(e) => {
                                    warn!(
                                        backend = backend.name(),
                                        emitted,
                                        error = %e,
                                        "Chat backend stream failed, replaying fallback answer"
                                    );
                                    failed = true;
                                    break;
                                }
                            }
                        }
                        debug!(backend = backend.name(), emitted, "Backend stream finished");
                        failed
                    }
                    Err(e) => {
                        warn!(
                            backend = backend.name(),
                            error = %e,
                            "Chat backend stream could not start, answering from fallback template"
                        );
                        true
                    }
                },
            };

            if use_fallback {
                for fragment in word_fragments(&fallback_answer(&matches)) {
                    yield StreamEvent::content(fragment);
                }
            }

            yield StreamEvent::Done;
        })
    }
}

impl std::fmt::Debug for ResponseGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseGenerator")
            .field("mode", &self.mode())
            .field("backend", &self.backend.as_ref().map(|b| b.name().to_string()))
            .finish()
    }
}
