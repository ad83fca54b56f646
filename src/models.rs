//! Core data models for the pipeline.
//!
//! These types represent the issue, source chunks, retrieval results, and
//! generator output that flow from indexing through publishing.

use serde::{Deserialize, Serialize};

/// A GitHub issue, deserialized from `GET /repos/{repo}/issues/{n}`.
///
/// Fields listed here are required; an API response missing any of them
/// fails validation before the pipeline continues. The record is immutable
/// for the duration of a run and is only used to build the retrieval query.
#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
pub struct Issue {
    pub id: u64,
    pub number: u64,
    pub url: String,
    pub html_url: String,
    pub title: String,
    pub body: String,
    pub state: String,
    pub user: Account,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub assignees: Vec<Account>,
    pub created_at: String,
    pub updated_at: String,
}

/// A GitHub user or bot account reference.
#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
pub struct Account {
    pub login: String,
    pub id: u64,
}

/// An issue label.
#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    pub name: String,
}

/// A source file read from the local checkout, tagged with its path
/// relative to the scan root.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: String,
    pub body: String,
}

/// A bounded slice of one source file's text: the unit stored in and
/// retrieved from the similarity index.
#[derive(Debug, Clone)]
pub struct SourceChunk {
    pub id: String,
    pub source: String,
    pub chunk_index: i64,
    pub text: String,
    pub hash: String,
}

/// A chunk returned from a similarity query, with its cosine score.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub source: String,
    pub text: String,
    pub score: f64,
}

/// The generator service's proposed single-file change.
///
/// All three keys are required; anything else in the response body is a
/// validation failure raised before the publisher runs.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationResult {
    pub file_content: String,
    pub file_path: String,
    pub pr_data: PrData,
}

/// Pull-request metadata supplied by the generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrData {
    pub pr_title: String,
    pub pr_body: String,
}

/// The pull request created at the end of a run.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub html_url: String,
}
