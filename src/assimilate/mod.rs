//! Assimilation pipeline: unstructured text in, entity-linked facts out

pub mod orchestrator;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::MemoryError;
use crate::graph::{Entity, Identifier, MergedFact, Source};

pub use orchestrator::Assimilator;

/// One ingestion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssimilateRequest {
    /// Opaque tenant namespace token
    pub scope: String,
    pub identifier: Identifier,
    pub content: String,
    /// Event time; defaults to ingestion time
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Short-term conversational context for the extractor, oldest first
    #[serde(default)]
    pub history: Vec<String>,
}

/// Successful ingestion result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssimilateResponse {
    pub entity: Entity,
    pub source: Source,
    pub assimilated_facts: Vec<MergedFact>,
}

/// Pipeline stage, reported on failure so callers can distinguish
/// "nothing happened" from "partially happened"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Resolving,
    Extracting,
    Merging,
    Indexing,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Resolving => "resolving",
            Stage::Extracting => "extracting",
            Stage::Merging => "merging",
            Stage::Indexing => "indexing",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An assimilation that did not reach DONE. A failure before MERGING writes
/// no facts or sources; the resolved entity itself may already be durable.
#[derive(Debug, Error)]
#[error("assimilation failed during {stage}: {error}")]
pub struct AssimilationFailure {
    pub stage: Stage,
    #[source]
    pub error: MemoryError,
}
