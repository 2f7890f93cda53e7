//! Data models for the graph store

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Canonical subject node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// Opaque stable handle; immutable for the entity's lifetime
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Flat, ordered string map of free-form properties
    #[serde(default)]
    pub metadata: IndexMap<String, String>,
}

/// External handle, e.g. `("email", "alice@example.com")`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(rename = "type")]
    pub id_type: String,
    pub value: String,
}

impl Identifier {
    pub fn new(id_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id_type: id_type.into(),
            value: value.into(),
        }
    }
}

/// HAS_IDENTIFIER edge attributes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifierLink {
    /// True only for the first identifier linked to the entity
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
}

/// Atomic knowledge unit, content-addressed by `type:name`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactNode {
    /// Deterministic key: case-normalized `type:name`
    pub fact_id: String,
    #[serde(rename = "type")]
    pub fact_type: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// HAS_FACT edge attributes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactRelationship {
    pub verb: String,
    /// Monotonic: never regresses from a stronger observation
    pub confidence_score: f32,
    pub created_at: DateTime<Utc>,
}

/// Provenance record: the raw text one assimilation call ingested
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: Uuid,
    pub content: String,
    /// Event time — caller-supplied, defaulted to ingestion time
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Source {
    pub fn new(content: impl Into<String>, timestamp: Option<DateTime<Utc>>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            timestamp: timestamp.unwrap_or(now),
            created_at: now,
        }
    }
}

/// A fact attached to an entity, with its edge and full provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactWithProvenance {
    pub fact: FactNode,
    pub relationship: FactRelationship,
    pub sources: Vec<Source>,
}

/// One fact touched by a merge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedFact {
    pub fact: FactNode,
    pub relationship: FactRelationship,
    /// True when the HAS_FACT edge was created by this merge
    pub is_new: bool,
}

/// Result of resolving an identifier against the graph
#[derive(Debug, Clone)]
pub struct ResolvedEntity {
    pub entity: Entity,
    pub identifier: Identifier,
    pub link: IdentifierLink,
    /// True when this resolution created the entity
    pub created: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_defaults_event_time_to_ingestion() {
        let source = Source::new("Alice moved to Berlin.", None);
        assert_eq!(source.timestamp, source.created_at);
    }

    #[test]
    fn test_source_keeps_caller_timestamp() {
        let event = Utc::now() - chrono::Duration::days(3);
        let source = Source::new("Alice moved to Berlin.", Some(event));
        assert_eq!(source.timestamp, event);
        assert!(source.created_at > event);
    }
}
