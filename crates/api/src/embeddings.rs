//! `OpenAI` embedding client for semantic inventory search.
//!
//! Uses `text-embedding-3-small` by default, producing 1536-dimensional
//! vectors that are compared against item embeddings with pgvector's cosine
//! distance. Query embeddings are cached in memory so a shopper repeating a
//! question does not pay for a second embedding call.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::config::OpenAIConfig;

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";
pub const EMBEDDING_DIMENSIONS: usize = 1536;
const QUERY_CACHE_CAPACITY: u64 = 1_000;
const QUERY_CACHE_TTL: Duration = Duration::from_secs(600);

/// Errors from the embedding API.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OpenAI API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("invalid header value: {0}")]
    InvalidHeader(String),
}

/// Client for generating text embeddings via the `OpenAI` API.
#[derive(Clone)]
pub struct EmbeddingClient {
    inner: Arc<EmbeddingClientInner>,
}

struct EmbeddingClientInner {
    client: reqwest::Client,
    model: String,
    cache: Cache<String, Arc<Vec<f32>>>,
}

impl EmbeddingClient {
    /// Create a new embedding client.
    ///
    /// # Errors
    ///
    /// Returns `EmbeddingError::InvalidHeader` if the API key cannot be used
    /// as a bearer token, or `EmbeddingError::Http` if the client cannot be built.
    pub fn new(config: &OpenAIConfig) -> Result<Self, EmbeddingError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", config.api_key.expose_secret()))
                .map_err(|e| EmbeddingError::InvalidHeader(e.to_string()))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        let cache = Cache::builder()
            .max_capacity(QUERY_CACHE_CAPACITY)
            .time_to_live(QUERY_CACHE_TTL)
            .build();

        Ok(Self {
            inner: Arc::new(EmbeddingClientInner {
                client,
                model: config.embedding_model.clone(),
                cache,
            }),
        })
    }

    /// Embed a shopper query, reusing a cached vector when the same
    /// normalized query was embedded recently.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or returns an invalid response.
    pub async fn embed_query(&self, query: &str) -> Result<Arc<Vec<f32>>, EmbeddingError> {
        let key = cache_key(query);
        if let Some(hit) = self.inner.cache.get(&key).await {
            tracing::debug!("query embedding cache hit");
            return Ok(hit);
        }

        let embedding = Arc::new(self.embed(query).await?);
        self.inner.cache.insert(key, Arc::clone(&embedding)).await;
        Ok(embedding)
    }

    /// Generate an embedding vector for the given text.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or returns an invalid response.
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut embeddings = self.embed_batch(&[text]).await?;
        embeddings
            .pop()
            .ok_or_else(|| EmbeddingError::InvalidResponse("No embedding data in response".to_string()))
    }

    /// Generate embeddings for multiple texts in a single request.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or returns an invalid response.
    #[instrument(skip(self, texts), fields(count = texts.len()))]
    pub async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.inner.model,
            input: texts,
        };

        let response = self
            .inner
            .client
            .post(OPENAI_EMBEDDINGS_URL)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let response: EmbeddingResponse = response.json().await?;
        validate_embeddings(texts.len(), response)
    }
}

/// Check count and dimensions, returning embeddings in input order.
fn validate_embeddings(
    expected: usize,
    response: EmbeddingResponse,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let mut data = response.data;
    data.sort_by_key(|d| d.index);

    if data.len() != expected {
        return Err(EmbeddingError::InvalidResponse(format!(
            "Expected {expected} embeddings, got {}",
            data.len()
        )));
    }

    data.into_iter()
        .enumerate()
        .map(|(i, d)| {
            if d.embedding.len() == EMBEDDING_DIMENSIONS {
                Ok(d.embedding)
            } else {
                Err(EmbeddingError::InvalidResponse(format!(
                    "Embedding {i} has {} dimensions, expected {EMBEDDING_DIMENSIONS}",
                    d.embedding.len()
                )))
            }
        })
        .collect()
}

fn cache_key(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Request body for text embedding.
#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

/// Response from `OpenAI` embeddings API.
#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

/// Single embedding data in response.
#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(index: usize, len: usize, fill: f32) -> EmbeddingData {
        EmbeddingData {
            index,
            embedding: vec![fill; len],
        }
    }

    #[test]
    fn test_cache_key_normalizes_case_and_spacing() {
        assert_eq!(cache_key("  Blue   SOFA "), "blue sofa");
    }

    #[test]
    fn test_validate_embeddings_restores_input_order() {
        let response = EmbeddingResponse {
            data: vec![
                data(1, EMBEDDING_DIMENSIONS, 1.0),
                data(0, EMBEDDING_DIMENSIONS, 0.0),
            ],
        };
        let embeddings = validate_embeddings(2, response).expect("valid");
        assert!(embeddings.first().is_some_and(|e| e.iter().all(|v| *v == 0.0)));
        assert!(embeddings.get(1).is_some_and(|e| e.iter().all(|v| *v == 1.0)));
    }

    #[test]
    fn test_validate_embeddings_rejects_wrong_count() {
        let response = EmbeddingResponse {
            data: vec![data(0, EMBEDDING_DIMENSIONS, 0.0)],
        };
        assert!(matches!(
            validate_embeddings(2, response),
            Err(EmbeddingError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_validate_embeddings_rejects_wrong_dimensions() {
        let response = EmbeddingResponse {
            data: vec![data(0, 3, 0.0)],
        };
        assert!(validate_embeddings(1, response).is_err());
    }

    #[test]
    fn test_request_serializes_batch_input() {
        let texts = ["a", "b"];
        let request = EmbeddingRequest {
            model: "text-embedding-3-small",
            input: &texts,
        };
        let json = serde_json::to_value(&request).expect("serialize");
        assert_eq!(json["input"], serde_json::json!(["a", "b"]));
    }
}
