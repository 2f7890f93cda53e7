//! Fact merger: reconciles freshly extracted facts against an entity's
//! existing fact set.
//!
//! Merging is content-addressed: the deterministic `fact_id` (case-
//! normalized `type:name`) is the identity, so repeated observations of the
//! same fact converge on one HAS_FACT edge with monotonic confidence and
//! accumulating provenance.

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::error::Result;
use crate::extract::ExtractedFact;
use crate::graph::{GraphStore, MergedFact, Source};

/// Compute the deterministic fact key from its type and name.
pub fn fact_id(fact_type: &str, name: &str) -> String {
    format!(
        "{}:{}",
        fact_type.trim().to_lowercase(),
        name.trim().to_lowercase()
    )
}

/// One deduplicated, normalized fact ready for the graph transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedFact {
    pub fact_id: String,
    pub fact_type: String,
    pub name: String,
    pub verb: String,
    pub confidence: f32,
}

/// Fold an extractor output list into one planned fact per `fact_id`.
///
/// The extractor's ordering is the tie-break: when two tuples normalize to
/// the same key, the first occurrence wins unless a later one carries
/// strictly higher confidence, in which case its confidence and verb take
/// over — the same rule the store applies against an existing edge.
pub fn plan_merge(extracted: &[ExtractedFact]) -> Vec<PlannedFact> {
    let mut planned: Vec<PlannedFact> = Vec::new();

    for fact in extracted {
        if fact.fact_type.trim().is_empty() || fact.name.trim().is_empty() {
            warn!("Skipping extracted fact with empty type or name");
            continue;
        }

        let id = fact_id(&fact.fact_type, &fact.name);
        let confidence = fact.confidence.clamp(0.0, 1.0);

        match planned.iter_mut().find(|p| p.fact_id == id) {
            Some(existing) => {
                if confidence > existing.confidence {
                    existing.confidence = confidence;
                    existing.verb = fact.verb.clone();
                }
            }
            None => planned.push(PlannedFact {
                fact_id: id,
                fact_type: fact.fact_type.trim().to_string(),
                name: fact.name.trim().to_string(),
                verb: fact.verb.clone(),
                confidence,
            }),
        }
    }

    planned
}

/// Applies merge plans to the graph inside one transaction per call
#[derive(Clone)]
pub struct FactMerger {
    graph: GraphStore,
}

impl FactMerger {
    pub fn new(graph: GraphStore) -> Self {
        Self { graph }
    }

    /// Merge `extracted` into `entity_id`'s fact set under provenance of
    /// `source`. Returns every touched fact with its resulting edge state.
    pub async fn merge(
        &self,
        scope: &str,
        entity_id: Uuid,
        source: &Source,
        extracted: &[ExtractedFact],
    ) -> Result<Vec<MergedFact>> {
        let planned = plan_merge(extracted);
        if planned.is_empty() {
            // Still record the source: an ingestion with no facts is valid
            // and its text may matter for later audits.
            return self.graph.apply_merge(scope, entity_id, source, vec![]).await;
        }
        self.graph.apply_merge(scope, entity_id, source, planned).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extracted(fact_type: &str, name: &str, verb: &str, confidence: f32) -> ExtractedFact {
        ExtractedFact {
            fact_type: fact_type.to_string(),
            name: name.to_string(),
            verb: verb.to_string(),
            confidence,
        }
    }

    #[test]
    fn test_fact_id_is_case_normalized() {
        assert_eq!(fact_id("Location", "Berlin"), "location:berlin");
        assert_eq!(fact_id(" location ", " BERLIN "), "location:berlin");
    }

    #[test]
    fn test_plan_dedups_by_fact_id() {
        let plan = plan_merge(&[
            extracted("Location", "Berlin", "moved to", 0.8),
            extracted("location", "berlin", "lives in", 0.8),
        ]);
        assert_eq!(plan.len(), 1);
        // Equal confidence: first occurrence wins the verb.
        assert_eq!(plan[0].verb, "moved to");
        assert_eq!(plan[0].confidence, 0.8);
    }

    #[test]
    fn test_plan_higher_confidence_takes_verb() {
        let plan = plan_merge(&[
            extracted("Location", "Berlin", "visited", 0.5),
            extracted("Location", "Berlin", "lives in", 0.9),
        ]);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].verb, "lives in");
        assert_eq!(plan[0].confidence, 0.9);
    }

    #[test]
    fn test_plan_lower_confidence_is_ignored() {
        let plan = plan_merge(&[
            extracted("Location", "Berlin", "lives in", 0.9),
            extracted("Location", "Berlin", "visited", 0.5),
        ]);
        assert_eq!(plan[0].verb, "lives in");
        assert_eq!(plan[0].confidence, 0.9);
    }

    #[test]
    fn test_plan_preserves_extractor_order() {
        let plan = plan_merge(&[
            extracted("Location", "Berlin", "moved to", 0.7),
            extracted("Employer", "Acme", "works at", 0.9),
        ]);
        assert_eq!(plan[0].fact_id, "location:berlin");
        assert_eq!(plan[1].fact_id, "employer:acme");
    }

    #[test]
    fn test_plan_clamps_confidence() {
        let plan = plan_merge(&[extracted("Location", "Berlin", "moved to", 1.7)]);
        assert_eq!(plan[0].confidence, 1.0);
    }

    #[test]
    fn test_plan_skips_empty_tuples() {
        let plan = plan_merge(&[
            extracted("", "Berlin", "moved to", 0.8),
            extracted("Location", "  ", "moved to", 0.8),
            extracted("Location", "Berlin", "moved to", 0.8),
        ]);
        assert_eq!(plan.len(), 1);
    }
}
