//! Configuration for the memory engine

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{MemoryError, Result};

/// Top-level configuration, one section per backend or collaborator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default)]
    pub graph: GraphConfig,

    #[serde(default)]
    pub vector: VectorConfig,

    #[serde(default)]
    pub extractor: ExtractorConfig,

    #[serde(default)]
    pub embedder: EmbedderConfig,
}

impl MemoryConfig {
    /// Load configuration from the environment, layered over defaults.
    ///
    /// Variables use a `MEMORY_` prefix with `__` as the section separator,
    /// e.g. `MEMORY_VECTOR__URL=http://localhost:6334`. A `.env` file is
    /// honored when present.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(config::Environment::with_prefix("MEMORY").separator("__"))
            .build()
            .map_err(|e| MemoryError::Internal(format!("Failed to build config: {}", e)))?;

        settings
            .try_deserialize()
            .map_err(|e| MemoryError::Internal(format!("Failed to parse config: {}", e)))
    }
}

/// Graph store (source of truth) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Path to the SQLite database file
    #[serde(default = "default_graph_path")]
    pub path: String,
}

fn default_graph_path() -> String {
    "memory.db".to_string()
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            path: default_graph_path(),
        }
    }
}

/// Vector index (derived, eventually consistent) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorConfig {
    /// Qdrant gRPC endpoint
    #[serde(default = "default_vector_url")]
    pub url: String,

    /// Collection holding fact vectors
    #[serde(default = "default_collection")]
    pub collection_name: String,

    /// Embedding dimension; must match the embedder's output
    #[serde(default = "default_vector_size")]
    pub vector_size: usize,

    /// Default number of neighbors for semantic queries
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Seconds between background reconciler passes
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_secs: u64,

    /// Maximum deferred index jobs held for background retry
    #[serde(default = "default_queue_capacity")]
    pub retry_queue_capacity: usize,
}

fn default_vector_url() -> String {
    "http://localhost:6334".to_string()
}

fn default_collection() -> String {
    "entity_facts".to_string()
}

fn default_vector_size() -> usize {
    1024
}

fn default_top_k() -> usize {
    20
}

fn default_reconcile_interval() -> u64 {
    30
}

fn default_queue_capacity() -> usize {
    1024
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            url: default_vector_url(),
            collection_name: default_collection(),
            vector_size: default_vector_size(),
            top_k: default_top_k(),
            reconcile_interval_secs: default_reconcile_interval(),
            retry_queue_capacity: default_queue_capacity(),
        }
    }
}

/// Fact extractor (external model) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Extraction service endpoint
    #[serde(default = "default_extractor_url")]
    pub api_url: String,

    /// Environment variable holding the API key
    #[serde(default = "default_extractor_key_env")]
    pub api_key_env: String,

    /// Model name passed through to the service
    #[serde(default = "default_extractor_model")]
    pub model: String,

    /// Timeout for a single HTTP call to the service
    #[serde(default = "default_extract_timeout")]
    pub timeout_secs: u64,

    /// Budget for the whole EXTRACTING stage including retries, distinct
    /// from the overall request timeout
    #[serde(default = "default_stage_timeout")]
    pub stage_timeout_secs: u64,

    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_extractor_url() -> String {
    "http://localhost:8090/v1/extract".to_string()
}

fn default_extractor_key_env() -> String {
    "EXTRACTOR_API_KEY".to_string()
}

fn default_extractor_model() -> String {
    "fact-extractor-v1".to_string()
}

fn default_extract_timeout() -> u64 {
    30
}

fn default_stage_timeout() -> u64 {
    90
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            api_url: default_extractor_url(),
            api_key_env: default_extractor_key_env(),
            model: default_extractor_model(),
            timeout_secs: default_extract_timeout(),
            stage_timeout_secs: default_stage_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

impl ExtractorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }
}

/// Embedder (external model) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedderConfig {
    /// Embedding service endpoint
    #[serde(default = "default_embedder_url")]
    pub api_url: String,

    /// Environment variable holding the API key
    #[serde(default = "default_embedder_key_env")]
    pub api_key_env: String,

    /// Model name passed through to the service
    #[serde(default = "default_embedder_model")]
    pub model: String,

    #[serde(default = "default_embed_timeout")]
    pub timeout_secs: u64,
}

fn default_embedder_url() -> String {
    "http://localhost:8091/v1/embeddings".to_string()
}

fn default_embedder_key_env() -> String {
    "EMBEDDER_API_KEY".to_string()
}

fn default_embedder_model() -> String {
    "text-embedding-v1".to_string()
}

fn default_embed_timeout() -> u64 {
    15
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            api_url: default_embedder_url(),
            api_key_env: default_embedder_key_env(),
            model: default_embedder_model(),
            timeout_secs: default_embed_timeout(),
        }
    }
}

impl EmbedderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Bounded exponential backoff for the extraction call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay() -> u64 {
    500
}

fn default_max_delay() -> u64 {
    10_000
}

fn default_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_multiplier(),
        }
    }
}
