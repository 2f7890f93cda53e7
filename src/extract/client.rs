//! HTTP client for the fact-extraction service

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::ExtractorConfig;
use crate::error::{MemoryError, Result};

use super::models::{ExtractRequest, ExtractResponse, ExtractedFact};
use super::FactExtractor;

/// Fact extractor backed by an HTTP extraction service
pub struct HttpFactExtractor {
    http: Client,
    config: ExtractorConfig,
    api_key: Option<String>,
}

impl HttpFactExtractor {
    pub fn new(config: ExtractorConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| MemoryError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        let api_key = std::env::var(&config.api_key_env).ok();
        if api_key.is_none() {
            warn!(
                env = %config.api_key_env,
                "No extractor API key in environment; calling unauthenticated"
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
impl FactExtractor for HttpFactExtractor {
    async fn extract(&self, text: &str, history: &[String]) -> Result<Vec<ExtractedFact>> {
        let body = ExtractRequest {
            model: self.config.model.clone(),
            text: text.to_string(),
            history: history.to_vec(),
        };

        let mut request = self.http.post(&self.config.api_url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MemoryError::ExtractionFailed(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(MemoryError::ExtractionFailed(format!(
                "Extraction service returned {}: {}",
                status, detail
            )));
        }

        let parsed: ExtractResponse = response
            .json()
            .await
            .map_err(|e| MemoryError::ExtractionFailed(format!("Invalid response: {}", e)))?;

        debug!(facts = parsed.facts.len(), "Extraction complete");
        Ok(parsed.facts)
    }
}
