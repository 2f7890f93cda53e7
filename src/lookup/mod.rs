//! Lookup pipeline: identifier in, ranked structured memory out

pub mod orchestrator;

use serde::{Deserialize, Serialize};

use crate::graph::{Entity, FactNode, FactRelationship, Identifier, IdentifierLink, Source};
use crate::vector::embedding_text;

pub use orchestrator::RetrievalOrchestrator;

/// Facts included in a summary paragraph
pub const SUMMARY_FACT_LIMIT: usize = 10;

/// One retrieval request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupRequest {
    /// Opaque tenant namespace token
    pub scope: String,
    pub identifier: Identifier,
    /// When present, facts are re-ranked by semantic similarity
    #[serde(default)]
    pub semantic_query: Option<String>,
    /// When true, the ranked facts are also rendered as one paragraph
    #[serde(default)]
    pub summary: bool,
}

/// A fact in ranked order; `score` is absent for facts the vector index has
/// not absorbed yet (they are appended, never dropped)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedFact {
    pub fact: FactNode,
    pub relationship: FactRelationship,
    pub sources: Vec<Source>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

/// Retrieval result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupResponse {
    pub entity: Entity,
    pub identifier: Identifier,
    pub identifier_relationship: IdentifierLink,
    pub facts: Vec<RankedFact>,
    /// Present only in summary mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_text: Option<String>,
}

/// Render the top ranked facts as one natural-language paragraph for LLM
/// context reuse. Pure formatting over the already-ranked list.
pub fn summarize(subject: &str, facts: &[RankedFact], limit: usize) -> String {
    if facts.is_empty() {
        return format!("{} has no recorded facts.", subject);
    }

    let rendered: Vec<String> = facts
        .iter()
        .take(limit)
        .map(|f| embedding_text(&f.fact, &f.relationship.verb))
        .collect();

    format!("{}: {}.", subject, rendered.join("; "))
}
