//! CLI context providing access to the knowledge service

use crate::output::OutputFormat;
use kbchat_foundation::{InMemoryKnowledgeStore, KbChatConfig, KnowledgeService};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Shared context for CLI commands
pub struct CliContext {
    pub config: KbChatConfig,
    pub service: KnowledgeService,
    /// Snapshot file backing the knowledge store
    pub store_path: PathBuf,
    pub output: OutputFormat,
}

impl CliContext {
    /// Load configuration, open the store and build the service.
    ///
    /// `store` overrides `store.path` from the configuration. Without
    /// `with_backend` the chat backend is never contacted and answers come
    /// from the fallback template.
    pub async fn new(
        config_path: Option<&Path>,
        store: Option<&Path>,
        output: OutputFormat,
        with_backend: bool,
    ) -> anyhow::Result<Self> {
        let config = KbChatConfig::load(config_path)
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

        let store_path = store
            .map(Path::to_path_buf)
            .unwrap_or_else(|| config.store.path.clone());
        debug!(path = %store_path.display(), "Opening knowledge store");
        let store = InMemoryKnowledgeStore::open(&store_path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to open knowledge store: {}", e))?;

        let store = Arc::new(store);
        let service = if with_backend {
            config.build_service(store).await
        } else {
            config.build_offline_service(store)
        }
        .map_err(|e| anyhow::anyhow!("Failed to initialize chat service: {}", e))?;

        Ok(Self {
            config,
            service,
            store_path,
            output,
        })
    }

    pub fn is_json(&self) -> bool {
        self.output == OutputFormat::Json
    }
}
