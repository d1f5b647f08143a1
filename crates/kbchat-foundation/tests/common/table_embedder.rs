//! Embedder returning fixed vectors for known texts.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use kbchat_kernel::rag::Embedder;
use kbchat_kernel::{RagError, RagResult};

/// Looks texts up in a table. Unknown texts embed to `default`, or fail
/// when `default` is `None`.
pub struct TableEmbedder {
    table: HashMap<String, Vec<f32>>,
    default: Option<Vec<f32>>,
    dimensions: usize,
    calls: Mutex<Vec<String>>,
}

impl TableEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            table: HashMap::new(),
            default: Some(vec![0.0; dimensions]),
            dimensions,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.table.insert(text.to_string(), vector);
        self
    }

    /// Fail on any text not in the table
    pub fn strict(mut self) -> Self {
        self.default = None;
        self
    }

    /// Every text embedded so far, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls mutex poisoned").clone()
    }
}

#[async_trait]
impl Embedder for TableEmbedder {
    fn model(&self) -> &str {
        "table"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> RagResult<Vec<f32>> {
        self.calls
            .lock()
            .expect("calls mutex poisoned")
            .push(text.to_string());
        self.table
            .get(text)
            .or(self.default.as_ref())
            .cloned()
            .ok_or_else(|| RagError::embedding(format!("no vector for {text:?}")))
    }
}
