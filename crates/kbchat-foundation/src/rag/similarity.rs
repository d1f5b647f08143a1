//! Cosine similarity and top-k ranking over embedded documents

use kbchat_kernel::rag::{Document, RankedMatch};
use std::cmp::Ordering;
use tracing::debug;

/// Number of matches kept when the caller does not ask for a specific count
pub const DEFAULT_TOP_K: usize = 3;

/// Minimum score for a document to ground a chat answer
pub const CHAT_THRESHOLD: f32 = 0.3;

/// Minimum score for a document to appear in plain search results
pub const SEARCH_THRESHOLD: f32 = 0.2;

/// Cosine similarity between two vectors.
///
/// Returns a value between -1.0 and 1.0 (1.0 for identical direction,
/// 0.0 for orthogonal, -1.0 for opposite direction).
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Rank `documents` against `query` and keep the best `top_k`.
///
/// Documents without an embedding, or whose embedding length differs from
/// the query's, are skipped. A document is kept when its score is at least
/// `threshold`. The result is ordered by descending score; ties keep the
/// input order.
pub fn rank(query: &[f32], documents: &[Document], top_k: usize, threshold: f32) -> Vec<RankedMatch> {
    let mut matches: Vec<RankedMatch> = documents
        .iter()
        .filter_map(|document| {
            if !document.has_embedding() {
                return None;
            }
            if document.embedding.len() != query.len() {
                debug!(
                    document_id = %document.id,
                    expected = query.len(),
                    actual = document.embedding.len(),
                    "Skipping document with mismatched embedding dimension"
                );
                return None;
            }

            let score = cosine_similarity(query, &document.embedding);
            (score >= threshold).then(|| RankedMatch::from_document(document, score))
        })
        .collect();

    // sort_by is stable
    matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    matches.truncate(top_k);
    matches
}
