//! Thin GitHub REST client.
//!
//! Covers exactly the calls the pipeline needs: issue fetch, ref lookup,
//! ref creation, contents get/put, and pull-request creation. One
//! `reqwest::Client` configured at construction; every call authenticates
//! with `Authorization: token <GITHUB_TOKEN>` and is made exactly once.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{Config, Credentials};
use crate::error::PipelineError;
use crate::models::{Issue, PullRequest};

const USER_AGENT: &str = concat!("palisade/", env!("CARGO_PKG_VERSION"));

pub struct GithubClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

/// Contents-API update request: base64 content committed to a branch,
/// with the prior blob SHA when the file already exists.
#[derive(Debug, Serialize)]
pub struct FileUpdate<'a> {
    pub message: &'a str,
    pub content: &'a str,
    pub branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct NewRef<'a> {
    #[serde(rename = "ref")]
    git_ref: &'a str,
    sha: &'a str,
}

#[derive(Debug, Serialize)]
struct NewPull<'a> {
    title: &'a str,
    body: &'a str,
    head: &'a str,
    base: &'a str,
}

#[derive(Debug, Deserialize)]
struct GitRef {
    object: GitObject,
}

#[derive(Debug, Deserialize)]
struct GitObject {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct ContentMeta {
    sha: String,
}

impl GithubClient {
    pub fn new(config: &Config, creds: &Credentials) -> Result<Self> {
        let token = creds.require_github()?.to_string();
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            api_base: config.github.api_base.clone(),
            token,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.api_base, path))
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT)
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<(u16, String)> {
        let response = req
            .send()
            .await
            .map_err(|e| PipelineError::remote("github", None, &e.to_string()))?;
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok((status, body))
    }

    /// Fetch one issue and validate its shape.
    pub async fn get_issue(&self, repo: &str, number: u64) -> Result<Issue> {
        let context = format!("fetching issue #{}", number);
        let path = format!("/repos/{}/issues/{}", repo, number);
        let (status, body) = self
            .send(self.request(reqwest::Method::GET, &path))
            .await?;
        if !(200..300).contains(&status) {
            return Err(api_error(&context, status, &body));
        }
        parse_issue(&body)
    }

    /// Head commit SHA of a branch, via `GET /git/ref/heads/{branch}`.
    pub async fn head_sha(&self, repo: &str, branch: &str) -> Result<String> {
        let context = format!("resolving heads/{}", branch);
        let path = format!("/repos/{}/git/ref/heads/{}", repo, branch);
        let (status, body) = self
            .send(self.request(reqwest::Method::GET, &path))
            .await?;
        if !(200..300).contains(&status) {
            return Err(api_error(&context, status, &body));
        }
        let git_ref: GitRef = serde_json::from_str(&body).map_err(|e| {
            PipelineError::Validation(format!("unexpected ref response: {}", e))
        })?;
        Ok(git_ref.object.sha)
    }

    /// Create `refs/heads/{branch}` pointing at `sha`.
    pub async fn create_branch(&self, repo: &str, branch: &str, sha: &str) -> Result<()> {
        let context = format!("creating branch {}", branch);
        let path = format!("/repos/{}/git/refs", repo);
        let git_ref = format!("refs/heads/{}", branch);
        let (status, body) = self
            .send(self.request(reqwest::Method::POST, &path).json(&NewRef {
                git_ref: &git_ref,
                sha,
            }))
            .await?;
        if !(200..300).contains(&status) {
            return Err(api_error(&context, status, &body));
        }
        Ok(())
    }

    /// Blob SHA of the file at `file_path` on the default branch, or
    /// `None` when the path does not exist yet.
    pub async fn file_sha(&self, repo: &str, file_path: &str) -> Result<Option<String>> {
        let context = format!("looking up contents of {}", file_path);
        let path = format!("/repos/{}/contents/{}", repo, file_path);
        let (status, body) = self
            .send(self.request(reqwest::Method::GET, &path))
            .await?;
        if status == 404 {
            return Ok(None);
        }
        if !(200..300).contains(&status) {
            return Err(api_error(&context, status, &body));
        }
        let meta: ContentMeta = serde_json::from_str(&body).map_err(|e| {
            PipelineError::Validation(format!("unexpected contents response: {}", e))
        })?;
        Ok(Some(meta.sha))
    }

    /// Commit new file content via the contents API.
    pub async fn put_file(&self, repo: &str, file_path: &str, update: &FileUpdate<'_>) -> Result<()> {
        let context = format!("updating {}", file_path);
        let path = format!("/repos/{}/contents/{}", repo, file_path);
        let (status, body) = self
            .send(self.request(reqwest::Method::PUT, &path).json(update))
            .await?;
        if !(200..300).contains(&status) {
            return Err(api_error(&context, status, &body));
        }
        Ok(())
    }

    /// Open a pull request from `head` into `base`.
    pub async fn create_pull(
        &self,
        repo: &str,
        title: &str,
        body_text: &str,
        head: &str,
        base: &str,
    ) -> Result<PullRequest> {
        let context = format!("opening pull request from {}", head);
        let path = format!("/repos/{}/pulls", repo);
        let (status, body) = self
            .send(self.request(reqwest::Method::POST, &path).json(&NewPull {
                title,
                body: body_text,
                head,
                base,
            }))
            .await?;
        if !(200..300).contains(&status) {
            return Err(api_error(&context, status, &body));
        }
        serde_json::from_str(&body)
            .map_err(|e| PipelineError::Validation(format!("unexpected pulls response: {}", e)).into())
    }
}

/// Parse an issues-endpoint body into the typed record; a missing
/// required field is a validation failure.
fn parse_issue(body: &str) -> Result<Issue> {
    serde_json::from_str(body).map_err(|e| {
        PipelineError::Validation(format!("issue response missing required fields: {}", e)).into()
    })
}

fn api_error(context: &str, status: u16, body: &str) -> anyhow::Error {
    match status {
        401 | 403 => PipelineError::Auth(format!(
            "GitHub rejected the token while {} (HTTP {})",
            context, status
        ))
        .into(),
        404 => PipelineError::NotFound(format!("GitHub returned 404 while {}", context)).into(),
        _ => PipelineError::remote("github", Some(status), body).into(),
    }
}
