//! Retrieval orchestrator
//!
//! The graph is the completeness guarantee: semantic re-ranking reorders
//! what the graph returned, and a stale or unreachable vector index
//! degrades the ranking, never the result set.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::error::Result;
use crate::extract::Embedder;
use crate::graph::{FactWithProvenance, GraphStore};
use crate::identity::IdentityResolver;
use crate::metrics::METRICS;
use crate::vector::VectorIndex;

use super::{summarize, LookupRequest, LookupResponse, RankedFact, SUMMARY_FACT_LIMIT};

/// Drives one lookup request
pub struct RetrievalOrchestrator {
    resolver: IdentityResolver,
    graph: GraphStore,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    top_k: usize,
}

impl RetrievalOrchestrator {
    pub fn new(
        resolver: IdentityResolver,
        graph: GraphStore,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        top_k: usize,
    ) -> Self {
        Self {
            resolver,
            graph,
            embedder,
            index,
            top_k,
        }
    }

    /// Retrieve an entity's structured memory, optionally re-ranked by a
    /// semantic query. Lookup never creates entities.
    pub async fn lookup(&self, request: LookupRequest) -> Result<LookupResponse> {
        let start = Instant::now();
        let semantic = request.semantic_query.is_some();
        let result = self.run(&request).await;

        METRICS.record_lookup(result.is_ok(), semantic);
        METRICS
            .lookup_duration
            .with_label_values(&[if semantic { "semantic" } else { "graph" }])
            .observe(start.elapsed().as_secs_f64());

        result
    }

    async fn run(&self, request: &LookupRequest) -> Result<LookupResponse> {
        let resolved = self
            .resolver
            .resolve_existing(&request.scope, &request.identifier)
            .await?;

        let triples = self
            .graph
            .get_entity_facts(&request.scope, resolved.entity.id)
            .await?;
        debug!(
            entity_id = %resolved.entity.id,
            facts = triples.len(),
            "Fetched entity facts"
        );

        // The graph query already orders by confidence then edge recency,
        // which is the final order for plain lookups.
        let facts = match &request.semantic_query {
            None => triples.into_iter().map(unscored).collect(),
            Some(query) => {
                self.semantic_rerank(&request.scope, resolved.entity.id, query, triples)
                    .await
            }
        };

        let summary_text = request
            .summary
            .then(|| summarize(&resolved.identifier.value, &facts, SUMMARY_FACT_LIMIT));

        Ok(LookupResponse {
            entity: resolved.entity,
            identifier: resolved.identifier,
            identifier_relationship: resolved.link,
            facts,
            summary_text,
        })
    }

    /// Re-rank by vector similarity. Facts the index has not absorbed yet
    /// are appended unscored in graph order, and any index or embedding
    /// error degrades to graph-only ranking.
    async fn semantic_rerank(
        &self,
        scope: &str,
        entity_id: uuid::Uuid,
        query: &str,
        triples: Vec<FactWithProvenance>,
    ) -> Vec<RankedFact> {
        let scores: HashMap<String, f32> = match self.query_index(scope, entity_id, query).await {
            Ok(scores) => scores,
            Err(e) => {
                warn!(error = %e, "Semantic ranking unavailable, falling back to graph order");
                return triples.into_iter().map(unscored).collect();
            }
        };

        let mut scored: Vec<RankedFact> = Vec::new();
        let mut unranked: Vec<RankedFact> = Vec::new();
        for triple in triples {
            match scores.get(&triple.fact.fact_id).copied() {
                Some(score) => {
                    let mut ranked = unscored(triple);
                    ranked.score = Some(score);
                    scored.push(ranked);
                }
                None => unranked.push(unscored(triple)),
            }
        }

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.extend(unranked);
        scored
    }

    async fn query_index(
        &self,
        scope: &str,
        entity_id: uuid::Uuid,
        query: &str,
    ) -> Result<HashMap<String, f32>> {
        let vector = self.embedder.embed(query).await?;
        let hits = self.index.query(scope, entity_id, vector, self.top_k).await?;
        Ok(hits.into_iter().map(|h| (h.fact_id, h.score)).collect())
    }
}

fn unscored(triple: FactWithProvenance) -> RankedFact {
    RankedFact {
        fact: triple.fact,
        relationship: triple.relationship,
        sources: triple.sources,
        score: None,
    }
}
