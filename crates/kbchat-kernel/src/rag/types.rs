//! RAG core data types
//!
//! Types shared by the ranker, the generator and the storage collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Category assigned to documents created without one
pub const DEFAULT_CATEGORY: &str = "general";

/// Where a document's text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    #[default]
    Text,
    Url,
    File,
}

/// A knowledge-base entry with its embedding.
///
/// Owned by the storage collaborator. The pipeline only reads documents and
/// returns new derived values; it never mutates one in place. An empty
/// `embedding` means the document has not been embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub source_type: SourceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Source-specific metadata (file name, page count, scrape date, ...)
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        embedding: Vec<f32>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            category: DEFAULT_CATEGORY.to_string(),
            embedding,
            source_type: SourceType::Text,
            source_url: None,
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_source(mut self, source_type: SourceType, source_url: Option<String>) -> Self {
        self.source_type = source_type;
        self.source_url = source_url;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn has_embedding(&self) -> bool {
        !self.embedding.is_empty()
    }
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

/// Input for creating a document; the embedding is computed on insert
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewDocument {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub source_type: SourceType,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl NewDocument {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Partial update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
}

impl DocumentPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.category.is_none()
            && self.metadata.is_none()
    }
}

/// A document that passed the similarity threshold for one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedMatch {
    pub document_id: String,
    pub title: String,
    pub content: String,
    pub category: String,
    /// Cosine similarity against the query vector
    pub score: f32,
}

impl RankedMatch {
    pub fn from_document(document: &Document, score: f32) -> Self {
        Self {
            document_id: document.id.clone(),
            title: document.title.clone(),
            content: document.content.clone(),
            category: document.category.clone(),
            score,
        }
    }
}

/// One past exchange in a chat session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub user_message: String,
    pub bot_response: String,
}

impl ConversationTurn {
    pub fn new(user_message: impl Into<String>, bot_response: impl Into<String>) -> Self {
        Self {
            user_message: user_message.into(),
            bot_response: bot_response.into(),
        }
    }
}

/// A persisted exchange, including the matches the answer was grounded on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRecord {
    pub id: String,
    pub session_id: String,
    pub user_message: String,
    pub bot_response: String,
    #[serde(default)]
    pub context_used: Vec<RankedMatch>,
    pub created_at: DateTime<Utc>,
}

impl ChatRecord {
    pub fn turn(&self) -> ConversationTurn {
        ConversationTurn::new(self.user_message.clone(), self.bot_response.clone())
    }
}

impl From<&ChatRecord> for ConversationTurn {
    fn from(record: &ChatRecord) -> Self {
        record.turn()
    }
}

/// A chat session and when it was last used
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            created_at: now,
            last_activity: now,
        }
    }
}

/// An event of a streamed answer.
///
/// One generation emits exactly one `Context`, then zero or more `Content`,
/// then exactly one `Done`. `Error` replaces the remainder of the sequence
/// and is terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Context { context: Vec<RankedMatch> },
    Content { content: String },
    Done,
    Error { message: String },
}

impl StreamEvent {
    pub fn context(matches: Vec<RankedMatch>) -> Self {
        Self::Context { context: matches }
    }

    pub fn content(fragment: impl Into<String>) -> Self {
        Self::Content {
            content: fragment.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error { .. })
    }

    pub fn as_content(&self) -> Option<&str> {
        match self {
            Self::Content { content } => Some(content),
            _ => None,
        }
    }
}
