//! In-memory knowledge store with optional JSON snapshot persistence
//!
//! Documents, chat records and sessions live in memory behind one `RwLock`.
//! A store opened with [`InMemoryKnowledgeStore::open`] rewrites its snapshot
//! file on every change, and a change only becomes visible once that write
//! has succeeded. This is enough for a single-user CLI and small knowledge
//! bases.

use async_trait::async_trait;
use chrono::Utc;
use kbchat_kernel::rag::{ChatRecord, Document, KnowledgeStore, Session};
use kbchat_kernel::{RagError, RagResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Everything the store holds; also the on-disk snapshot layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreState {
    #[serde(default)]
    documents: Vec<Document>,
    #[serde(default)]
    chats: Vec<ChatRecord>,
    #[serde(default)]
    sessions: Vec<Session>,
}

/// Knowledge store kept in memory.
///
/// Documents are held in insertion order, so ranking ties resolve the same
/// way across runs.
///
/// # Example
///
/// ```rust,ignore
/// use kbchat_foundation::store::InMemoryKnowledgeStore;
///
/// let store = InMemoryKnowledgeStore::open("kbchat-store.json").await?;
/// store.insert_document(document).await?;
/// ```
#[derive(Default)]
pub struct InMemoryKnowledgeStore {
    state: RwLock<StoreState>,
    path: Option<PathBuf>,
    save_lock: Mutex<()>,
}

impl InMemoryKnowledgeStore {
    /// Empty store that is never written to disk
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the snapshot at `path`, or start empty if it does not exist.
    /// Later changes are written back to the same file.
    pub async fn open(path: impl AsRef<Path>) -> RagResult<Self> {
        let path = path.as_ref().to_path_buf();

        let state = match tokio::fs::read_to_string(&path).await {
            Ok(raw) if raw.trim().is_empty() => StoreState::default(),
            Ok(raw) => serde_json::from_str::<StoreState>(&raw)
                .map_err(|e| RagError::Storage(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No snapshot yet, starting empty");
                StoreState::default()
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            path = %path.display(),
            documents = state.documents.len(),
            chats = state.chats.len(),
            sessions = state.sessions.len(),
            "Knowledge store opened"
        );

        Ok(Self {
            state: RwLock::new(state),
            path: Some(path),
            save_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write the snapshot to `path` now.
    pub async fn save_to(&self, path: &Path) -> RagResult<()> {
        let state = self.state.read().await;
        self.write_snapshot(path, &state).await
    }

    async fn write_snapshot(&self, path: &Path, state: &StoreState) -> RagResult<()> {
        let _guard = self.save_lock.lock().await;
        let json = serde_json::to_string_pretty(state)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Write beside the target and rename so readers never see half a file
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Apply `change` to a copy of the state, persist the copy, then swap it
    /// in. A failed change or a failed write leaves the store untouched.
    async fn commit<T>(&self, change: impl FnOnce(&mut StoreState) -> RagResult<T>) -> RagResult<T> {
        let mut state = self.state.write().await;
        let Some(path) = &self.path else {
            // Changes check before they mutate, so there is nothing to undo
            return change(&mut *state);
        };

        let mut next = state.clone();
        let out = change(&mut next)?;
        self.write_snapshot(path, &next).await?;
        *state = next;
        Ok(out)
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    async fn list_documents_with_embeddings(&self) -> RagResult<Vec<Document>> {
        let state = self.state.read().await;
        Ok(state.documents.iter().filter(|d| d.has_embedding()).cloned().collect())
    }

    async fn insert_document(&self, document: Document) -> RagResult<()> {
        self.commit(|state| {
            if state.documents.iter().any(|d| d.id == document.id) {
                return Err(RagError::Storage(format!(
                    "document {} already exists",
                    document.id
                )));
            }
            state.documents.push(document);
            Ok(())
        })
        .await
    }

    async fn get_document(&self, id: &str) -> RagResult<Option<Document>> {
        let state = self.state.read().await;
        Ok(state.documents.iter().find(|d| d.id == id).cloned())
    }

    async fn list_documents(&self) -> RagResult<Vec<Document>> {
        let mut documents = self.state.read().await.documents.clone();
        // Stable sort: equal timestamps keep reverse insertion order
        documents.reverse();
        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(documents)
    }

    async fn replace_document(&self, document: Document) -> RagResult<()> {
        self.commit(|state| {
            let slot = state
                .documents
                .iter_mut()
                .find(|d| d.id == document.id)
                .ok_or_else(|| RagError::NotFound(format!("document {}", document.id)))?;
            *slot = document;
            Ok(())
        })
        .await
    }

    async fn delete_document(&self, id: &str) -> RagResult<bool> {
        if self.get_document(id).await?.is_none() {
            return Ok(false);
        }
        self.commit(|state| {
            let before = state.documents.len();
            state.documents.retain(|d| d.id != id);
            Ok(state.documents.len() != before)
        })
        .await
    }

    async fn append_chat_record(&self, record: ChatRecord) -> RagResult<()> {
        self.commit(|state| {
            state.chats.push(record);
            Ok(())
        })
        .await
    }

    async fn chat_history(&self, session_id: &str, limit: usize) -> RagResult<Vec<ChatRecord>> {
        let state = self.state.read().await;
        let mut records: Vec<ChatRecord> = state
            .chats
            .iter()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect();
        // Appends arrive in order, but snapshots may be edited by hand
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        let skip = records.len().saturating_sub(limit);
        Ok(records.split_off(skip))
    }

    async fn create_session(&self, session: Session) -> RagResult<bool> {
        if self.get_session(&session.id).await?.is_some() {
            return Ok(false);
        }
        self.commit(|state| {
            if state.sessions.iter().any(|s| s.id == session.id) {
                return Ok(false);
            }
            state.sessions.push(session);
            Ok(true)
        })
        .await
    }

    async fn touch_session(&self, session_id: &str) -> RagResult<Session> {
        self.commit(|state| {
            let now = Utc::now();
            match state.sessions.iter_mut().find(|s| s.id == session_id) {
                Some(session) => {
                    session.last_activity = now;
                    Ok(session.clone())
                }
                None => {
                    let session = Session::new(session_id);
                    state.sessions.push(session.clone());
                    Ok(session)
                }
            }
        })
        .await
    }

    async fn get_session(&self, session_id: &str) -> RagResult<Option<Session>> {
        let state = self.state.read().await;
        Ok(state.sessions.iter().find(|s| s.id == session_id).cloned())
    }

    async fn list_sessions(&self) -> RagResult<Vec<Session>> {
        let mut sessions = self.state.read().await.sessions.clone();
        sessions.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        Ok(sessions)
    }
}
