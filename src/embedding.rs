//! Embedding provider abstraction.
//!
//! Semantic search embeds record bodies at store time and queries at
//! search time. Providers:
//! - **disabled** — the default; semantic mode is unavailable and
//!   keyword retrieval is used instead.
//! - **openai** — `POST /v1/embeddings`, key from `OPENAI_API_KEY`.
//! - **ollama** — `POST /api/embed` on a local Ollama instance.
//!
//! Vectors are stored as little-endian f32 blobs; similarity is cosine.
//!
//! Retry strategy for both remote providers: HTTP 429 and 5xx retry
//! with exponential backoff (1s, 2s, 4s, ... capped at 2^5), other 4xx
//! fail immediately, network errors retry.

use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::Error;

/// Metadata about the configured embedding backend.
pub trait EmbeddingProvider: Send + Sync {
    fn model_name(&self) -> &str;
    fn dims(&self) -> usize;
}

struct DisabledProvider;

impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
}

struct RemoteProvider {
    model: String,
    dims: usize,
}

impl EmbeddingProvider for RemoteProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
}

/// Instantiate the provider described by the config.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>, Error> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledProvider)),
        "openai" | "ollama" => {
            let model = config
                .model
                .clone()
                .ok_or_else(|| Error::Config("embedding.model required".to_string()))?;
            let dims = config
                .dims
                .ok_or_else(|| Error::Config("embedding.dims required".to_string()))?;
            Ok(Box::new(RemoteProvider { model, dims }))
        }
        other => Err(Error::Config(format!(
            "Unknown embedding provider: {}",
            other
        ))),
    }
}

/// Embed a batch of texts with the configured provider, in input order.
pub async fn embed_texts(
    config: &EmbeddingConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, Error> {
    match config.provider.as_str() {
        "openai" => embed_openai(config, texts).await,
        "ollama" => embed_ollama(config, texts).await,
        "disabled" => Err(Error::Embedding(
            "embedding provider is disabled".to_string(),
        )),
        other => Err(Error::Embedding(format!(
            "unknown embedding provider: {}",
            other
        ))),
    }
}

/// Embed a single query text.
pub async fn embed_query(config: &EmbeddingConfig, text: &str) -> Result<Vec<f32>, Error> {
    let results = embed_texts(config, &[text.to_string()]).await?;
    results
        .into_iter()
        .next()
        .ok_or_else(|| Error::Embedding("empty embedding response".to_string()))
}

async fn embed_openai(config: &EmbeddingConfig, texts: &[String]) -> Result<Vec<Vec<f32>>, Error> {
    let api_key = std::env::var("OPENAI_API_KEY")
        .map_err(|_| Error::Embedding("OPENAI_API_KEY not set".to_string()))?;

    let model = config
        .model
        .as_ref()
        .ok_or_else(|| Error::Embedding("embedding.model required".to_string()))?;

    let base = config
        .url
        .as_deref()
        .unwrap_or("https://api.openai.com")
        .trim_end_matches('/');

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| Error::Embedding(e.to_string()))?;

    let body = serde_json::json!({
        "model": model,
        "input": texts,
    });

    let mut last_err = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let resp = client
            .post(format!("{}/v1/embeddings", base))
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body)
            .send()
            .await;

        match resp {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    let json: serde_json::Value =
                        response.json().await.map_err(|e| Error::Embedding(e.to_string()))?;
                    return parse_openai_response(&json);
                }

                let body_text = response.text().await.unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(Error::Embedding(format!(
                        "OpenAI API error {}: {}",
                        status, body_text
                    )));
                    continue;
                }
                return Err(Error::Embedding(format!(
                    "OpenAI API error {}: {}",
                    status, body_text
                )));
            }
            Err(e) => {
                last_err = Some(Error::Embedding(e.to_string()));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| Error::Embedding("embedding failed after retries".to_string())))
}

fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, Error> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| Error::Embedding("invalid response: missing data array".to_string()))?;

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| Error::Embedding("invalid response: missing embedding".to_string()))?;
        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        embeddings.push(vec);
    }
    Ok(embeddings)
}

async fn embed_ollama(config: &EmbeddingConfig, texts: &[String]) -> Result<Vec<Vec<f32>>, Error> {
    let model = config
        .model
        .as_ref()
        .ok_or_else(|| Error::Embedding("embedding.model required".to_string()))?;
    let url = config.url.as_deref().unwrap_or("http://localhost:11434");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| Error::Embedding(e.to_string()))?;

    let body = serde_json::json!({
        "model": model,
        "input": texts,
    });

    let mut last_err = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let resp = client
            .post(format!("{}/api/embed", url))
            .json(&body)
            .send()
            .await;

        match resp {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    let json: serde_json::Value =
                        response.json().await.map_err(|e| Error::Embedding(e.to_string()))?;
                    return parse_ollama_response(&json);
                }

                let body_text = response.text().await.unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(Error::Embedding(format!(
                        "Ollama API error {}: {}",
                        status, body_text
                    )));
                    continue;
                }
                return Err(Error::Embedding(format!(
                    "Ollama API error {}: {}",
                    status, body_text
                )));
            }
            Err(e) => {
                last_err = Some(Error::Embedding(format!(
                    "Ollama connection error (is Ollama running at {}?): {}",
                    url, e
                )));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| Error::Embedding("embedding failed after retries".to_string())))
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, Error> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| Error::Embedding("invalid response: missing embeddings array".to_string()))?;

    let mut result = Vec::with_capacity(embeddings.len());
    for embedding in embeddings {
        let vec: Vec<f32> = embedding
            .as_array()
            .ok_or_else(|| Error::Embedding("invalid response: embedding is not an array".to_string()))?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        result.push(vec);
    }
    Ok(result)
}

/// Encode a float vector as little-endian f32 bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in [-1, 1]. Returns 0.0 for empty or
/// mismatched-length vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
