//! Wire models for the fact-extraction and embedding services

use serde::{Deserialize, Serialize};

/// One candidate fact produced by the extractor, in model output order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedFact {
    /// Category, e.g. "Location", "Employer"
    #[serde(rename = "type")]
    pub fact_type: String,
    /// The fact's value, e.g. "Berlin"
    pub name: String,
    /// Descriptive verb linking entity to fact, e.g. "moved to"
    pub verb: String,
    /// Extractor confidence in 0..1
    pub confidence: f32,
}

/// Request body for the extraction service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractRequest {
    pub model: String,
    pub text: String,
    /// Short-term conversational context, oldest first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<String>,
}

/// Response body from the extraction service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractResponse {
    pub facts: Vec<ExtractedFact>,
}

/// Request body for the embedding service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedRequest {
    pub model: String,
    pub input: String,
}

/// Response body from the embedding service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub embedding: Vec<f32>,
}
