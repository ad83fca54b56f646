//! Typed pipeline errors.
//!
//! Every fallible step returns `anyhow::Result` with one of these variants
//! attached, so callers can branch on the failure category with
//! `err.downcast_ref::<PipelineError>()` instead of matching message text.

use thiserror::Error;

/// Failure categories for the issue-to-pull-request pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A credential was missing or rejected (GitHub 401/403, generator 401,
    /// unset token environment variables).
    #[error("authorization failed: {0}")]
    Auth(String),

    /// A remote collaborator (GitHub, the generator service, the embedding
    /// provider) answered with an unexpected status or could not be reached.
    #[error("{service} request failed: {message}")]
    RemoteService { service: String, message: String },

    /// A response or configuration value did not have the required shape.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced resource does not exist (repository path, persisted
    /// index, GitHub ref).
    #[error("not found: {0}")]
    NotFound(String),
}

impl PipelineError {
    /// Build a `RemoteService` error from a service name, an optional HTTP
    /// status, and a body excerpt.
    pub fn remote(service: &str, status: Option<u16>, detail: &str) -> Self {
        let message = match status {
            Some(code) => format!("HTTP {}: {}", code, excerpt(detail)),
            None => excerpt(detail),
        };
        PipelineError::RemoteService {
            service: service.to_string(),
            message,
        }
    }
}

/// Trim a response body down to a single printable line for error messages.
fn excerpt(body: &str) -> String {
    let flat = body.replace('\n', " ");
    let trimmed = flat.trim();
    if trimmed.chars().count() > 200 {
        let head: String = trimmed.chars().take(200).collect();
        format!("{}...", head)
    } else {
        trimmed.to_string()
    }
}
