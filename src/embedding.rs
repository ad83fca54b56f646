//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingProvider`] trait and the two remote backends:
//!
//! - **[`HuggingFaceProvider`]** — calls the Hugging Face Inference API
//!   feature-extraction pipeline (bearer `HF_TOKEN`).
//! - **[`OpenAIProvider`]** — calls `POST /v1/embeddings` (bearer
//!   `OPENAI_API_KEY`).
//!
//! Requests are batched (`batch_size` texts per call) and made exactly
//! once: an embedding failure is fatal to the run. Also provides vector
//! utilities for the index store:
//!
//! - [`vec_to_blob`] / [`blob_to_vec`] — little-endian f32 BLOB encoding
//! - [`cosine_similarity`] — ranking metric for similarity queries

use anyhow::{bail, Result};
use std::time::Duration;

use crate::config::{Credentials, EmbeddingConfig};
use crate::error::PipelineError;

const HF_API_BASE: &str = "https://api-inference.huggingface.co/pipeline/feature-extraction";
const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

/// Metadata interface implemented by every embedding backend.
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier, e.g. `"sentence-transformers/all-MiniLM-L6-v2"`.
    fn model_name(&self) -> &str;
    /// Vector dimensionality, e.g. `384`.
    fn dims(&self) -> usize;
}

/// Embedding provider backed by the Hugging Face Inference API.
pub struct HuggingFaceProvider {
    model: String,
    dims: usize,
}

impl EmbeddingProvider for HuggingFaceProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
}

/// Embedding provider backed by the OpenAI embeddings endpoint.
pub struct OpenAIProvider {
    model: String,
    dims: usize,
}

impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
}

/// Instantiate the provider named in the configuration.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "huggingface" => Ok(Box::new(HuggingFaceProvider {
            model: config.model.clone(),
            dims: config.dims,
        })),
        "openai" => Ok(Box::new(OpenAIProvider {
            model: config.model.clone(),
            dims: config.dims,
        })),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Embed a batch of texts with the configured provider. One HTTP request,
/// no retries; vectors come back in input order.
pub async fn embed_texts(
    config: &EmbeddingConfig,
    creds: &Credentials,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    match config.provider.as_str() {
        "huggingface" => embed_huggingface(config, creds, texts).await,
        "openai" => embed_openai(config, creds, texts).await,
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Embed a single query string (semantic-search entry point).
pub async fn embed_query(
    config: &EmbeddingConfig,
    creds: &Credentials,
    text: &str,
) -> Result<Vec<f32>> {
    let vectors = embed_texts(config, creds, &[text.to_string()]).await?;
    vectors
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
}

async fn embed_huggingface(
    config: &EmbeddingConfig,
    creds: &Credentials,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    let api_key = creds.require_embedding_key("huggingface")?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let response = client
        .post(format!("{}/{}", HF_API_BASE, config.model))
        .header("Authorization", format!("Bearer {}", api_key))
        .json(&serde_json::json!({ "inputs": texts }))
        .send()
        .await
        .map_err(|e| PipelineError::remote("embedding", None, &e.to_string()))?;

    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if status.as_u16() == 401 || status.as_u16() == 403 {
        return Err(PipelineError::Auth(format!(
            "embedding provider rejected HF_TOKEN (HTTP {})",
            status.as_u16()
        ))
        .into());
    }
    if !status.is_success() {
        return Err(PipelineError::remote("embedding", Some(status.as_u16()), &body).into());
    }

    parse_huggingface_response(&body)
}

/// The feature-extraction pipeline returns one pooled vector per input:
/// a plain two-dimensional float array.
fn parse_huggingface_response(body: &str) -> Result<Vec<Vec<f32>>> {
    serde_json::from_str::<Vec<Vec<f32>>>(body).map_err(|e| {
        PipelineError::Validation(format!("unexpected embedding response shape: {}", e)).into()
    })
}

async fn embed_openai(
    config: &EmbeddingConfig,
    creds: &Credentials,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    let api_key = creds.require_embedding_key("openai")?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let response = client
        .post(OPENAI_EMBEDDINGS_URL)
        .header("Authorization", format!("Bearer {}", api_key))
        .json(&serde_json::json!({
            "model": config.model,
            "input": texts,
        }))
        .send()
        .await
        .map_err(|e| PipelineError::remote("embedding", None, &e.to_string()))?;

    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if status.as_u16() == 401 || status.as_u16() == 403 {
        return Err(PipelineError::Auth(format!(
            "embedding provider rejected OPENAI_API_KEY (HTTP {})",
            status.as_u16()
        ))
        .into());
    }
    if !status.is_success() {
        return Err(PipelineError::remote("embedding", Some(status.as_u16()), &body).into());
    }

    parse_openai_response(&body)
}

fn parse_openai_response(body: &str) -> Result<Vec<Vec<f32>>> {
    #[derive(serde::Deserialize)]
    struct EmbeddingsResponse {
        data: Vec<EmbeddingItem>,
    }
    #[derive(serde::Deserialize)]
    struct EmbeddingItem {
        embedding: Vec<f32>,
    }

    let parsed: EmbeddingsResponse = serde_json::from_str(body).map_err(|e| {
        PipelineError::Validation(format!("unexpected embedding response shape: {}", e))
    })?;

    Ok(parsed.data.into_iter().map(|item| item.embedding).collect())
}

/// Encode a float vector as little-endian f32 bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB produced by [`vec_to_blob`] back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`; `0.0` for empty or
/// length-mismatched vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    let denom = norm_a * norm_b;
    if denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}
