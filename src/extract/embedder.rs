//! HTTP client for the embedding service

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::EmbedderConfig;
use crate::error::{MemoryError, Result};

use super::models::{EmbedRequest, EmbedResponse};
use super::Embedder;

/// Embedder backed by an HTTP embedding service
pub struct HttpEmbedder {
    http: Client,
    config: EmbedderConfig,
    api_key: Option<String>,
}

impl HttpEmbedder {
    pub fn new(config: EmbedderConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| MemoryError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        let api_key = std::env::var(&config.api_key_env).ok();
        if api_key.is_none() {
            warn!(
                env = %config.api_key_env,
                "No embedder API key in environment; calling unauthenticated"
            );
        }

        Ok(Self {
            http,
            config,
            api_key,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = EmbedRequest {
            model: self.config.model.clone(),
            input: text.to_string(),
        };

        let mut request = self.http.post(&self.config.api_url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MemoryError::Internal(format!("Embedding request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(MemoryError::Internal(format!(
                "Embedding service returned {}: {}",
                status, detail
            )));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| MemoryError::Internal(format!("Invalid embedding response: {}", e)))?;

        if parsed.embedding.is_empty() {
            return Err(MemoryError::Internal(
                "Embedding service returned an empty vector".to_string(),
            ));
        }

        debug!(dimension = parsed.embedding.len(), "Embedding complete");
        Ok(parsed.embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_embed_parses_vector() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/embeddings")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"embedding":[0.1,0.2,0.3]}"#)
            .create_async()
            .await;

        let config = EmbedderConfig {
            api_url: format!("{}/v1/embeddings", server.url()),
            ..EmbedderConfig::default()
        };
        let embedder = HttpEmbedder::new(config).unwrap();
        let vector = embedder.embed("Berlin Location moved to").await.unwrap();
        assert_eq!(vector, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn test_embed_rejects_empty_vector() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/embeddings")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"embedding":[]}"#)
            .create_async()
            .await;

        let config = EmbedderConfig {
            api_url: format!("{}/v1/embeddings", server.url()),
            ..EmbedderConfig::default()
        };
        let embedder = HttpEmbedder::new(config).unwrap();
        assert!(embedder.embed("anything").await.is_err());
    }
}
