//! Change-generator service client.
//!
//! One `POST` of `{issue, retrieved}` to the configured endpoint. A 401
//! answer is the one distinguished failure (the service rejected the
//! caller's token); every other non-2xx is a remote-service error, and a
//! 2xx body that does not match the expected three-key shape is a
//! validation error raised before the publisher runs.

use anyhow::Result;
use std::time::Duration;

use crate::config::{Config, Credentials};
use crate::error::PipelineError;
use crate::models::GenerationResult;

/// Request a proposed single-file change for the issue.
pub async fn request_change(
    config: &Config,
    creds: &Credentials,
    issue_text: &str,
    retrieved: &str,
) -> Result<GenerationResult> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.generator.timeout_secs))
        .build()?;

    let payload = serde_json::json!({
        "issue": issue_text,
        "retrieved": retrieved,
    });

    let mut request = client
        .post(&config.generator.url)
        .header("Content-Type", "application/json; charset=utf-8")
        .json(&payload);

    // The token is passed through as-is; the service does not use a
    // Bearer scheme.
    if let Some(token) = &creds.generator_auth_token {
        request = request.header("Authorization", token);
    }

    let response = request
        .send()
        .await
        .map_err(|e| PipelineError::remote("generator", None, &e.to_string()))?;

    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();

    parse_generation_response(status, &body)
}

/// Map the generator's answer to a result or a typed failure.
pub(crate) fn parse_generation_response(status: u16, body: &str) -> Result<GenerationResult> {
    if status == 401 {
        return Err(PipelineError::Auth(
            "authorization for the generator service failed".to_string(),
        )
        .into());
    }
    if !(200..300).contains(&status) {
        return Err(PipelineError::remote("generator", Some(status), body).into());
    }

    serde_json::from_str(body).map_err(|e| {
        PipelineError::Validation(format!(
            "generator response does not match expected shape: {}",
            e
        ))
        .into()
    })
}
