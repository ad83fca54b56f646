//! Branch-and-pull-request publisher.
//!
//! Linear five-step state machine with no retries and no rollback: a
//! branch created before a later step fails is left in place.
//!
//! 1. Resolve the default branch's head commit SHA.
//! 2. Create `refs/heads/test_branch_<uuid>` at that SHA.
//! 3. Look up the target file's prior blob SHA (absent for new files).
//! 4. Commit the base64-encoded content to the new branch.
//! 5. Open a pull request into the default branch.

use anyhow::Result;
use base64::Engine;
use uuid::Uuid;

use crate::config::Config;
use crate::github::{FileUpdate, GithubClient};
use crate::models::{GenerationResult, PullRequest};

pub const BRANCH_PREFIX: &str = "test_branch_";
pub const COMMIT_MESSAGE: &str = "commit from palisade";

/// The branch and pull request produced by a successful publish.
#[derive(Debug, Clone)]
pub struct PublishedChange {
    pub branch: String,
    pub pull_request: PullRequest,
}

/// Fresh branch name for this run.
pub fn new_branch_name() -> String {
    format!("{}{}", BRANCH_PREFIX, Uuid::new_v4())
}

/// Base64 file content as the contents API expects it.
pub fn encode_content(content: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(content.as_bytes())
}

/// Apply the generated change as a new branch and open a pull request
/// against the default branch.
pub async fn publish_change(
    github: &GithubClient,
    config: &Config,
    repo: &str,
    generated: &GenerationResult,
) -> Result<PublishedChange> {
    let base = &config.github.default_branch;

    let head_sha = github.head_sha(repo, base).await?;

    let branch = new_branch_name();
    github.create_branch(repo, &branch, &head_sha).await?;

    // None means the generator proposed a file that does not exist yet;
    // the contents API then creates it instead of updating.
    let prior_sha = github.file_sha(repo, &generated.file_path).await?;

    let encoded = encode_content(&generated.file_content);
    github
        .put_file(
            repo,
            &generated.file_path,
            &FileUpdate {
                message: COMMIT_MESSAGE,
                content: &encoded,
                branch: &branch,
                sha: prior_sha.as_deref(),
            },
        )
        .await?;

    let pull_request = github
        .create_pull(
            repo,
            &generated.pr_data.pr_title,
            &generated.pr_data.pr_body,
            &branch,
            base,
        )
        .await?;

    Ok(PublishedChange {
        branch,
        pull_request,
    })
}
