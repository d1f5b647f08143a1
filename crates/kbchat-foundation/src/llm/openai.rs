//! OpenAI chat backend
//!
//! Uses the `async-openai` crate, so any OpenAI-compatible endpoint works
//! (api.openai.com, Azure deployments, Ollama, vLLM, LocalAI).
//!
//! # Example
//!
//! ```rust,ignore
//! use kbchat_foundation::llm::{OpenAiChatBackend, OpenAiConfig};
//!
//! let backend = OpenAiChatBackend::new(
//!     OpenAiConfig::new("sk-xxx").with_model("gpt-4o-mini"),
//! );
//! let answer = backend.complete(&request).await?;
//! ```

use async_openai::{
    Client,
    config::OpenAIConfig as AsyncOpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use futures::StreamExt;
use kbchat_kernel::llm::{
    ChatBackend, ChatMessage, DecodingParams, FragmentStream, GenerationRequest, Role,
};
use kbchat_kernel::{RagError, RagResult};
use tracing::{debug, warn};

/// Model used when none is configured
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";

/// Connection settings shared by the chat backend and the embedder
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    /// Custom endpoint; `None` means api.openai.com
    pub base_url: Option<String>,
    pub org_id: Option<String>,
    /// Chat model
    pub model: String,
    pub params: DecodingParams,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: None,
            org_id: None,
            model: DEFAULT_CHAT_MODEL.to_string(),
            params: DecodingParams::default(),
        }
    }
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// Read `OPENAI_API_KEY`, `OPENAI_BASE_URL` and `OPENAI_MODEL`
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            base_url: std::env::var("OPENAI_BASE_URL").ok().filter(|url| !url.trim().is_empty()),
            model: std::env::var("OPENAI_MODEL")
                .ok()
                .filter(|model| !model.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_org_id(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }

    pub fn with_params(mut self, params: DecodingParams) -> Self {
        self.params = params;
        self
    }

    /// Whether the key looks usable.
    ///
    /// Blank keys and template placeholders such as `your_api_key_here`
    /// count as missing.
    pub fn has_api_key(&self) -> bool {
        let key = self.api_key.trim();
        !key.is_empty() && !key.starts_with("your_")
    }

    /// Build an `async-openai` client for these settings
    pub fn client(&self) -> Client<AsyncOpenAIConfig> {
        let mut openai_config = AsyncOpenAIConfig::new().with_api_key(&self.api_key);

        if let Some(ref base_url) = self.base_url {
            openai_config = openai_config.with_api_base(base_url);
        }

        if let Some(ref org_id) = self.org_id {
            openai_config = openai_config.with_org_id(org_id);
        }

        Client::with_config(openai_config)
    }
}

/// Chat backend for OpenAI and compatible APIs
pub struct OpenAiChatBackend {
    client: Client<AsyncOpenAIConfig>,
    config: OpenAiConfig,
}

impl OpenAiChatBackend {
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            client: config.client(),
            config,
        }
    }

    pub fn from_env() -> Self {
        Self::new(OpenAiConfig::from_env())
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    fn convert_message(message: &ChatMessage) -> RagResult<ChatCompletionRequestMessage> {
        let content = message.content.clone();
        let converted: Result<ChatCompletionRequestMessage, OpenAIError> = match message.role {
            Role::System => ChatCompletionRequestSystemMessageArgs::default()
                .content(content)
                .build()
                .map(Into::into),
            Role::User => ChatCompletionRequestUserMessageArgs::default()
                .content(content)
                .build()
                .map(Into::into),
            Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                .content(content)
                .build()
                .map(Into::into),
        };
        converted.map_err(|e| RagError::backend(e.to_string()))
    }

    fn build_request(
        &self,
        request: &GenerationRequest,
        stream: bool,
    ) -> RagResult<CreateChatCompletionRequest> {
        let messages = request
            .messages
            .iter()
            .map(Self::convert_message)
            .collect::<RagResult<Vec<_>>>()?;
        let params = &self.config.params;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&self.config.model)
            .messages(messages)
            .temperature(params.temperature)
            .max_tokens(params.max_tokens)
            .top_p(params.top_p)
            .frequency_penalty(params.frequency_penalty)
            .presence_penalty(params.presence_penalty)
            .stream(stream);

        builder.build().map_err(|e| RagError::backend(e.to_string()))
    }

    /// Map an `async-openai` error to a backend error with a short category
    fn convert_error(err: OpenAIError) -> RagError {
        match err {
            OpenAIError::ApiError(api_err) => {
                let message = api_err.message;
                let category = if message.contains("rate limit") {
                    "rate limited"
                } else if message.contains("quota") || message.contains("billing") {
                    "quota exceeded"
                } else if message.contains("model") && message.contains("not found") {
                    "model not found"
                } else if message.contains("context") || message.contains("tokens") {
                    "context length exceeded"
                } else {
                    "api error"
                };
                RagError::backend(format!("{category}: {message}"))
            }
            OpenAIError::Reqwest(e) => {
                if e.is_timeout() {
                    RagError::backend(format!("timeout: {e}"))
                } else {
                    RagError::backend(format!("network error: {e}"))
                }
            }
            other => RagError::backend(other.to_string()),
        }
    }
}

#[async_trait]
impl ChatBackend for OpenAiChatBackend {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, request: &GenerationRequest) -> RagResult<String> {
        let openai_request = self.build_request(request, false)?;

        let response = self
            .client
            .chat()
            .create(openai_request)
            .await
            .map_err(Self::convert_error)?;

        if let Some(usage) = &response.usage {
            debug!(
                model = %self.config.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Chat completion finished"
            );
        }

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| RagError::backend("response contained no message content"))
    }

    async fn complete_stream(&self, request: &GenerationRequest) -> RagResult<FragmentStream> {
        let openai_request = self.build_request(request, true)?;

        let stream = self
            .client
            .chat()
            .create_stream(openai_request)
            .await
            .map_err(Self::convert_error)?;

        // Some compatible servers emit chunks that are not valid UTF-8; skip
        // those and keep reading.
        let fragments = stream.filter_map(|result| async move {
            match result {
                Ok(chunk) => {
                    let text: String = chunk
                        .choices
                        .into_iter()
                        .filter_map(|choice| choice.delta.content)
                        .collect();
                    (!text.is_empty()).then_some(Ok(text))
                }
                Err(e) => {
                    let err_str = e.to_string();
                    if err_str.contains("stream did not contain valid UTF-8") || err_str.contains("utf8") {
                        warn!("Skipping invalid UTF-8 chunk from stream");
                        None
                    } else {
                        Some(Err(Self::convert_error(e)))
                    }
                }
            }
        });

        Ok(Box::pin(fragments))
    }

    /// Sends a five-token request and reports whether it succeeded
    async fn health_check(&self) -> RagResult<bool> {
        let ping = GenerationRequest::new().system("Say 'ok'");
        let mut openai_request = self.build_request(&ping, false)?;
        openai_request.max_tokens = Some(5);

        match self.client.chat().create(openai_request).await {
            Ok(_) => Ok(true),
            Err(e) => {
                warn!(model = %self.config.model, error = %e, "OpenAI health check failed");
                Ok(false)
            }
        }
    }
}
