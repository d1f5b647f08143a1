//! Scripted chat backend for integration tests.
//!
//! [`MockChatBackend`] returns queued results in FIFO order and records every
//! request it receives. When a queue is empty it answers with a default
//! canned text.
//!
//! ```rust,ignore
//! let backend = MockChatBackend::builder()
//!     .respond_with("We open at 9.")
//!     .stream_fragments(["We ", "open ", "at 9."])
//!     .build();
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::{StreamExt, stream};

use kbchat_kernel::llm::{ChatBackend, FragmentStream, GenerationRequest};
use kbchat_kernel::{RagError, RagResult};

pub const DEFAULT_RESPONSE: &str = "This is a mock response.";

/// One scripted streaming call
#[derive(Clone)]
enum StreamScript {
    /// The call itself fails before any fragment
    Refuse(String),
    /// Items yielded in order; an `Err` item breaks the stream
    Items(Vec<RagResult<String>>),
}

#[derive(Default)]
struct MockState {
    complete_calls: Vec<GenerationRequest>,
    stream_calls: Vec<GenerationRequest>,
    complete_responses: VecDeque<RagResult<String>>,
    stream_scripts: VecDeque<StreamScript>,
    health: Option<bool>,
    health_error: Option<String>,
}

/// Observes how far a scripted stream was consumed and whether it was dropped
#[derive(Clone, Default)]
struct StreamTracker {
    pulled: Arc<AtomicUsize>,
    released: Arc<AtomicBool>,
}

/// Moved into the scripted stream; marks the stream released when dropped
struct ReleaseGuard {
    tracker: StreamTracker,
}

impl ReleaseGuard {
    fn record_pull(&self) {
        self.tracker.pulled.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.tracker.released.store(true, Ordering::SeqCst);
    }
}

pub struct MockChatBackend {
    state: Arc<Mutex<MockState>>,
    tracker: StreamTracker,
}

impl MockChatBackend {
    pub fn builder() -> MockChatBackendBuilder {
        MockChatBackendBuilder::default()
    }

    pub fn complete_call_count(&self) -> usize {
        self.state.lock().expect("mock state mutex poisoned").complete_calls.len()
    }

    pub fn stream_call_count(&self) -> usize {
        self.state.lock().expect("mock state mutex poisoned").stream_calls.len()
    }

    /// Items handed out by scripted streams so far
    pub fn fragments_pulled(&self) -> usize {
        self.tracker.pulled.load(Ordering::SeqCst)
    }

    /// True once a scripted stream has been dropped
    pub fn stream_released(&self) -> bool {
        self.tracker.released.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<GenerationRequest> {
        let state = self.state.lock().expect("mock state mutex poisoned");
        state
            .complete_calls
            .last()
            .or(state.stream_calls.last())
            .cloned()
    }
}

#[async_trait]
impl ChatBackend for MockChatBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, request: &GenerationRequest) -> RagResult<String> {
        let mut state = self.state.lock().expect("mock state mutex poisoned");
        state.complete_calls.push(request.clone());
        state
            .complete_responses
            .pop_front()
            .unwrap_or_else(|| Ok(DEFAULT_RESPONSE.to_string()))
    }

    async fn complete_stream(&self, request: &GenerationRequest) -> RagResult<FragmentStream> {
        let script = {
            let mut state = self.state.lock().expect("mock state mutex poisoned");
            state.stream_calls.push(request.clone());
            state
                .stream_scripts
                .pop_front()
                .unwrap_or_else(|| StreamScript::Items(vec![Ok(DEFAULT_RESPONSE.to_string())]))
        };

        match script {
            StreamScript::Refuse(message) => Err(RagError::backend(message)),
            StreamScript::Items(items) => {
                let guard = ReleaseGuard {
                    tracker: self.tracker.clone(),
                };
                Ok(Box::pin(stream::iter(items).inspect(move |_| guard.record_pull())))
            }
        }
    }

    async fn health_check(&self) -> RagResult<bool> {
        let state = self.state.lock().expect("mock state mutex poisoned");
        match &state.health_error {
            Some(message) => Err(RagError::backend(message.clone())),
            None => Ok(state.health.unwrap_or(true)),
        }
    }
}

#[derive(Default)]
pub struct MockChatBackendBuilder {
    state: MockState,
}

impl MockChatBackendBuilder {
    /// Queue a successful single-shot answer
    pub fn respond_with(mut self, text: impl Into<String>) -> Self {
        self.state.complete_responses.push_back(Ok(text.into()));
        self
    }

    /// Queue a failing single-shot call
    pub fn fail_with(mut self, message: impl Into<String>) -> Self {
        self.state
            .complete_responses
            .push_back(Err(RagError::backend(message)));
        self
    }

    /// Queue a stream that yields `fragments` and ends normally
    pub fn stream_fragments<I, S>(mut self, fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items = fragments.into_iter().map(|f| Ok(f.into())).collect();
        self.state.stream_scripts.push_back(StreamScript::Items(items));
        self
    }

    /// Queue a stream that yields `fragments` and then fails
    pub fn stream_then_fail<I, S>(mut self, fragments: I, message: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut items: Vec<RagResult<String>> = fragments.into_iter().map(|f| Ok(f.into())).collect();
        items.push(Err(RagError::backend(message)));
        self.state.stream_scripts.push_back(StreamScript::Items(items));
        self
    }

    /// Queue a streaming call that fails before opening
    pub fn refuse_stream(mut self, message: impl Into<String>) -> Self {
        self.state
            .stream_scripts
            .push_back(StreamScript::Refuse(message.into()));
        self
    }

    pub fn healthy(mut self, healthy: bool) -> Self {
        self.state.health = Some(healthy);
        self
    }

    /// Make the health check itself return an error
    pub fn health_check_fails(mut self, message: impl Into<String>) -> Self {
        self.state.health_error = Some(message.into());
        self
    }

    pub fn build(self) -> MockChatBackend {
        MockChatBackend {
            state: Arc::new(Mutex::new(self.state)),
            tracker: StreamTracker::default(),
        }
    }
}
