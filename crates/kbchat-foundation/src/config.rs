//! Typed application configuration
//!
//! Loaded from a YAML/TOML/JSON file through `kbchat_kernel::config`, then
//! overridden by `KBCHAT_*` variables (nested with `__`) and by the
//! conventional `OPENAI_API_KEY`, `OPENAI_MODEL` and `OPENAI_BASE_URL`.
//! Every field has a default, so an empty file or no file at all is valid.

use kbchat_kernel::config::{load_from_env, load_with_env};
use kbchat_kernel::llm::{ChatBackend, DecodingParams};
use kbchat_kernel::rag::{Embedder, KnowledgeStore};
use kbchat_kernel::{RagError, RagResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::embedder::{HashingEmbedder, OpenAiEmbedder, hashing, openai as openai_embedder};
use crate::llm::{DEFAULT_CHAT_MODEL, OpenAiChatBackend, OpenAiConfig};
use crate::rag::{
    CHAT_THRESHOLD, ContextAssembler, DEFAULT_HISTORY_WINDOW, DEFAULT_TOP_K, RagOrchestrator,
    ResponseGenerator, RetrievalSettings, SEARCH_THRESHOLD,
};
use crate::service::{DEFAULT_HISTORY_LIMIT, KnowledgeService};

/// Prefix for environment overrides, e.g. `KBCHAT_RETRIEVAL__TOP_K=5`
pub const ENV_PREFIX: &str = "KBCHAT";

/// Config file picked up from the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "kbchat.toml";

pub const DEFAULT_STORE_PATH: &str = "kbchat-store.json";

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KbChatConfig {
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub store: StoreConfig,
}

/// Chat backend settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// No usable key means fallback mode
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: String,
    /// Send a tiny request at startup and fall back if it fails
    pub check_on_startup: bool,
    pub decoding: DecodingParams,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: DEFAULT_CHAT_MODEL.to_string(),
            check_on_startup: true,
            decoding: DecodingParams::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Feature hashing, no model or network needed
    #[default]
    Hashing,
    /// OpenAI-compatible embeddings endpoint
    OpenAi,
    /// fastembed AllMiniLML6V2; needs the `local-model` feature
    Local,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    /// Model name for the `openai` provider
    pub model: String,
    /// Vector size for the `hashing` and `openai` providers
    pub dimensions: Option<usize>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Hashing,
            model: openai_embedder::DEFAULT_EMBEDDING_MODEL.to_string(),
            dimensions: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub chat_threshold: f32,
    pub search_threshold: f32,
    /// Turns replayed into the prompt
    pub history_window: usize,
    /// Turns loaded from the store per request
    pub history_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            chat_threshold: CHAT_THRESHOLD,
            search_threshold: SEARCH_THRESHOLD,
            history_window: DEFAULT_HISTORY_WINDOW,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl RetrievalConfig {
    pub fn settings(&self) -> RetrievalSettings {
        RetrievalSettings {
            top_k: self.top_k,
            chat_threshold: self.chat_threshold,
            search_threshold: self.search_threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_STORE_PATH),
        }
    }
}

impl KbChatConfig {
    /// Load configuration.
    ///
    /// With `path` the file must exist. Without it, [`DEFAULT_CONFIG_FILE`]
    /// is used when present and the defaults otherwise. `OPENAI_*` variables
    /// are applied last.
    pub fn load(path: Option<&Path>) -> RagResult<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    fn load_with_prefix(path: Option<&Path>, env_prefix: &str) -> RagResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path, env_prefix)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE), env_prefix)?
            }
            None => {
                debug!("No config file, using defaults and environment");
                load_from_env(env_prefix)?
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path, env_prefix: &str) -> RagResult<Self> {
        let path_str = path
            .to_str()
            .ok_or_else(|| RagError::Config(format!("non UTF-8 config path: {}", path.display())))?;
        let config: Self = load_with_env(path_str, env_prefix)?;
        info!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Apply `OPENAI_API_KEY`, `OPENAI_MODEL` and `OPENAI_BASE_URL`.
    /// Blank values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(model) = lookup("OPENAI_MODEL") {
            self.llm.model = model;
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.llm.base_url = Some(url);
        }
    }

    pub fn validate(&self) -> RagResult<()> {
        if self.retrieval.top_k == 0 {
            return Err(RagError::Config("retrieval.top_k must be at least 1".into()));
        }
        if self.embedding.dimensions == Some(0) {
            return Err(RagError::Config("embedding.dimensions must be at least 1".into()));
        }
        Ok(())
    }

    /// Connection settings for the OpenAI client
    pub fn openai(&self) -> OpenAiConfig {
        let mut openai = OpenAiConfig::new(self.llm.api_key.clone().unwrap_or_default())
            .with_model(self.llm.model.clone())
            .with_params(self.llm.decoding);
        if let Some(url) = &self.llm.base_url {
            openai = openai.with_base_url(url.clone());
        }
        openai
    }

    /// Construct the configured embedder
    pub fn build_embedder(&self) -> RagResult<Arc<dyn Embedder>> {
        let embedder: Arc<dyn Embedder> = match self.embedding.provider {
            EmbeddingProvider::Hashing => Arc::new(HashingEmbedder::new(
                self.embedding.dimensions.unwrap_or(hashing::DEFAULT_DIMENSIONS),
            )),
            EmbeddingProvider::OpenAi => {
                let openai = self.openai();
                if !openai.has_api_key() {
                    return Err(RagError::Config(
                        "embedding.provider = \"openai\" requires an API key".into(),
                    ));
                }
                Arc::new(OpenAiEmbedder::new(
                    &openai,
                    self.embedding.model.clone(),
                    self.embedding
                        .dimensions
                        .unwrap_or(openai_embedder::DEFAULT_EMBEDDING_DIMENSIONS),
                ))
            }
            EmbeddingProvider::Local => build_local_embedder()?,
        };

        info!(
            model = embedder.model(),
            dimensions = embedder.dimensions(),
            "Embedder ready"
        );
        Ok(embedder)
    }

    /// Choose the generation mode.
    ///
    /// A missing or placeholder key gives fallback mode. Otherwise the
    /// OpenAI backend goes through [`select_generator`].
    pub async fn build_generator(&self) -> ResponseGenerator {
        let openai = self.openai();
        if !openai.has_api_key() {
            info!("No OpenAI API key configured, using fallback answers");
            return ResponseGenerator::fallback_only();
        }

        let backend: Arc<dyn ChatBackend> = Arc::new(OpenAiChatBackend::new(openai));
        select_generator(backend, self.llm.check_on_startup).await
    }

    /// Assemble the orchestrator from the configured parts
    pub async fn build_orchestrator(&self) -> RagResult<RagOrchestrator> {
        let embedder = self.build_embedder()?;
        let generator = self.build_generator().await;
        Ok(self.orchestrator_with(embedder, generator))
    }

    fn orchestrator_with(&self, embedder: Arc<dyn Embedder>, generator: ResponseGenerator) -> RagOrchestrator {
        RagOrchestrator::new(embedder, generator)
            .with_settings(self.retrieval.settings())
            .with_assembler(ContextAssembler::new().with_history_window(self.retrieval.history_window))
    }

    /// Build a [`KnowledgeService`] over `store`
    pub async fn build_service(&self, store: Arc<dyn KnowledgeStore>) -> RagResult<KnowledgeService> {
        let generator = self.build_generator().await;
        self.build_service_with(store, generator)
    }

    /// Like [`build_service`](Self::build_service) but never contacts the
    /// chat backend. Document management and search only need the embedder.
    pub fn build_offline_service(&self, store: Arc<dyn KnowledgeStore>) -> RagResult<KnowledgeService> {
        self.build_service_with(store, ResponseGenerator::fallback_only())
    }

    fn build_service_with(
        &self,
        store: Arc<dyn KnowledgeStore>,
        generator: ResponseGenerator,
    ) -> RagResult<KnowledgeService> {
        let orchestrator = self.orchestrator_with(self.build_embedder()?, generator);
        Ok(KnowledgeService::new(store, orchestrator).with_history_limit(self.retrieval.history_limit))
    }
}

/// Wrap `backend` in a generator, health-checking it first when `check_health` is
/// set. A backend that fails the check is dropped for fallback mode.
pub async fn select_generator(backend: Arc<dyn ChatBackend>, check_health: bool) -> ResponseGenerator {
    if check_health {
        match backend.health_check().await {
            Ok(true) => {}
            Ok(false) => {
                warn!(model = backend.model(), "Chat backend unreachable, using fallback answers");
                return ResponseGenerator::fallback_only();
            }
            Err(e) => {
                warn!(model = backend.model(), error = %e, "Chat backend health check failed, using fallback answers");
                return ResponseGenerator::fallback_only();
            }
        }
    }

    info!(model = backend.model(), "Chat backend ready");
    ResponseGenerator::with_backend(backend)
}

#[cfg(feature = "local-model")]
fn build_local_embedder() -> RagResult<Arc<dyn Embedder>> {
    Ok(Arc::new(crate::embedder::FastEmbedder::load()?))
}

#[cfg(not(feature = "local-model"))]
fn build_local_embedder() -> RagResult<Arc<dyn Embedder>> {
    Err(RagError::Config(
        "embedding.provider = \"local\" requires building with the `local-model` feature".into(),
    ))
}
