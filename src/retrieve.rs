//! Context retrieval and rendering.
//!
//! Builds the similarity query from the issue, pulls the top-K chunks
//! from the index, and renders them for the generator service. Results
//! stay in index-returned order with no re-ranking and no per-file
//! deduplication.

use anyhow::Result;

use crate::config::{Config, Credentials};
use crate::index::SimilarityIndex;
use crate::models::{Issue, RetrievedChunk};

/// The retrieval query text: issue title and body.
pub fn issue_query(issue: &Issue) -> String {
    format!("Title: {}\n\n{}", issue.title, issue.body)
}

/// Top-K chunks most similar to the issue.
pub async fn retrieve(
    index: &SimilarityIndex,
    config: &Config,
    creds: &Credentials,
    issue: &Issue,
) -> Result<Vec<RetrievedChunk>> {
    let query = issue_query(issue);
    index
        .query(config, creds, &query, config.retrieval.top_k)
        .await
}

/// Render retrieved chunks for the generator: one
/// `From path {source}\n{text}` block per chunk, newline-joined.
pub fn format_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| format!("From path {}\n{}", chunk.source, chunk.text))
        .collect::<Vec<_>>()
        .join("\n")
}
