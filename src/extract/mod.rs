//! External model collaborators: fact extraction and embedding
//!
//! The core consumes two contracts — text to structured facts, and text to
//! a fixed-dimension vector — without implementing either model. Both are
//! possibly slow and possibly failing; the extractor additionally gets a
//! bounded inline retry policy because it is the most failure-prone call in
//! the assimilation pipeline.

pub mod client;
pub mod embedder;
pub mod models;
pub mod retry;

use async_trait::async_trait;

use crate::error::Result;

pub use client::HttpFactExtractor;
pub use embedder::HttpEmbedder;
pub use models::{EmbedRequest, EmbedResponse, ExtractRequest, ExtractResponse, ExtractedFact};
pub use retry::RetryingExtractor;

/// Turns unstructured text into an ordered list of candidate facts.
///
/// An empty list is a valid outcome, not an error. Output order is
/// preserved into the merge step as the tie-break for equal confidence.
#[async_trait]
pub trait FactExtractor: Send + Sync {
    async fn extract(&self, text: &str, history: &[String]) -> Result<Vec<ExtractedFact>>;
}

/// Turns text into a fixed-dimension vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}
