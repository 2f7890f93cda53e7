//! Vector index: the derived, eventually-consistent half of the memory
//!
//! Keyed by the same fact identifiers as the graph, scoped per entity, and
//! written only after the graph commit. Index failures never fail an
//! assimilation; jobs go to a retry queue and a background reconciler makes
//! the index catch up, so it stays rebuildable from the graph at any time.

pub mod index;
pub mod queue;
pub mod reconciler;

pub use index::{FactPoint, QdrantIndex, ScoredFact, VectorIndex};
pub use queue::{IndexJob, IndexQueue};
pub use reconciler::IndexReconciler;

use crate::graph::FactNode;

/// Descriptive text a fact is embedded (and summarized) as.
pub fn embedding_text(fact: &FactNode, verb: &str) -> String {
    format!("{} {} ({})", verb, fact.name, fact.fact_type)
}
