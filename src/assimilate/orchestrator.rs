//! Assimilation orchestrator
//!
//! An explicit state machine — `RESOLVING → EXTRACTING → MERGING →
//! INDEXING → DONE` — with one handler per state. The graph write in
//! MERGING is the durability point for facts and sources; INDEXING failures
//! after it are downgraded to deferred retries because the graph is the
//! authoritative record.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::MemoryError;
use crate::extract::{ExtractedFact, FactExtractor};
use crate::graph::{MergedFact, ResolvedEntity, Source};
use crate::identity::IdentityResolver;
use crate::merge::FactMerger;
use crate::metrics::METRICS;
use crate::vector::{embedding_text, FactPoint, IndexJob, IndexQueue, VectorIndex};

use super::{AssimilateRequest, AssimilateResponse, AssimilationFailure, Stage};

enum State {
    Resolving,
    Extracting(ResolvedEntity),
    Merging(ResolvedEntity, Vec<ExtractedFact>),
    Indexing(ResolvedEntity, Source, Vec<MergedFact>),
    Done(AssimilateResponse),
}

/// Drives one ingestion request through the pipeline
pub struct Assimilator {
    resolver: IdentityResolver,
    extractor: Arc<dyn FactExtractor>,
    merger: FactMerger,
    embedder: Arc<dyn crate::extract::Embedder>,
    index: Arc<dyn VectorIndex>,
    queue: Arc<IndexQueue>,
    extract_timeout: Duration,
}

impl Assimilator {
    pub fn new(
        resolver: IdentityResolver,
        extractor: Arc<dyn FactExtractor>,
        merger: FactMerger,
        embedder: Arc<dyn crate::extract::Embedder>,
        index: Arc<dyn VectorIndex>,
        queue: Arc<IndexQueue>,
        extract_timeout: Duration,
    ) -> Self {
        Self {
            resolver,
            extractor,
            merger,
            embedder,
            index,
            queue,
            extract_timeout,
        }
    }

    /// Run the pipeline to completion for one request.
    pub async fn assimilate(
        &self,
        request: AssimilateRequest,
    ) -> Result<AssimilateResponse, AssimilationFailure> {
        let start = Instant::now();
        let result = self.run_states(&request).await;

        METRICS.record_assimilation(result.is_ok());
        METRICS
            .assimilation_duration
            .with_label_values(&["total"])
            .observe(start.elapsed().as_secs_f64());

        match &result {
            Ok(response) => info!(
                entity_id = %response.entity.id,
                facts = response.assimilated_facts.len(),
                "Assimilation complete"
            ),
            Err(failure) => {
                METRICS.record_stage_failure(failure.stage.as_str());
                warn!(stage = %failure.stage, error = %failure.error, "Assimilation failed");
            }
        }

        result
    }

    async fn run_states(
        &self,
        request: &AssimilateRequest,
    ) -> Result<AssimilateResponse, AssimilationFailure> {
        let mut state = State::Resolving;
        loop {
            state = match state {
                State::Resolving => State::Extracting(self.handle_resolving(request).await?),
                State::Extracting(resolved) => {
                    let facts = self.handle_extracting(request).await?;
                    State::Merging(resolved, facts)
                }
                State::Merging(resolved, facts) => {
                    let (source, merged) = self.handle_merging(request, &resolved, &facts).await?;
                    State::Indexing(resolved, source, merged)
                }
                State::Indexing(resolved, source, merged) => {
                    self.handle_indexing(&request.scope, &resolved, &merged).await;
                    State::Done(AssimilateResponse {
                        entity: resolved.entity,
                        source,
                        assimilated_facts: merged,
                    })
                }
                State::Done(response) => return Ok(response),
            };
        }
    }

    async fn handle_resolving(
        &self,
        request: &AssimilateRequest,
    ) -> Result<ResolvedEntity, AssimilationFailure> {
        if request.content.trim().is_empty() {
            return Err(AssimilationFailure {
                stage: Stage::Resolving,
                error: MemoryError::Validation("Content cannot be empty".to_string()),
            });
        }

        self.resolver
            .resolve(&request.scope, &request.identifier)
            .await
            .map_err(|error| AssimilationFailure {
                stage: Stage::Resolving,
                error,
            })
    }

    async fn handle_extracting(
        &self,
        request: &AssimilateRequest,
    ) -> Result<Vec<ExtractedFact>, AssimilationFailure> {
        // Bounded separately from the HTTP client timeout: this cap covers
        // the whole retry envelope of the external model call.
        let extraction = tokio::time::timeout(
            self.extract_timeout,
            self.extractor.extract(&request.content, &request.history),
        )
        .await;

        let facts = match extraction {
            Ok(Ok(facts)) => facts,
            Ok(Err(error)) => {
                return Err(AssimilationFailure {
                    stage: Stage::Extracting,
                    error,
                })
            }
            Err(_) => {
                return Err(AssimilationFailure {
                    stage: Stage::Extracting,
                    error: MemoryError::ExtractionFailed(format!(
                        "Extraction exceeded {}s budget",
                        self.extract_timeout.as_secs()
                    )),
                })
            }
        };

        debug!(facts = facts.len(), "Extraction stage complete");
        Ok(facts)
    }

    async fn handle_merging(
        &self,
        request: &AssimilateRequest,
        resolved: &ResolvedEntity,
        facts: &[ExtractedFact],
    ) -> Result<(Source, Vec<MergedFact>), AssimilationFailure> {
        let source = Source::new(request.content.clone(), request.timestamp);

        let merged = self
            .merger
            .merge(&request.scope, resolved.entity.id, &source, facts)
            .await
            .map_err(|error| AssimilationFailure {
                stage: Stage::Merging,
                error,
            })?;

        debug!(
            entity_id = %resolved.entity.id,
            merged = merged.len(),
            "Merge stage complete"
        );
        Ok((source, merged))
    }

    /// Best-effort: the graph commit already happened, so any failure here
    /// becomes a deferred index job instead of an assimilation error.
    async fn handle_indexing(&self, scope: &str, resolved: &ResolvedEntity, merged: &[MergedFact]) {
        let mut points = Vec::with_capacity(merged.len());
        let mut deferred = Vec::new();

        for item in merged {
            let text = embedding_text(&item.fact, &item.relationship.verb);
            match self.embedder.embed(&text).await {
                Ok(vector) => points.push(FactPoint {
                    scope: scope.to_string(),
                    entity_id: resolved.entity.id,
                    fact_id: item.fact.fact_id.clone(),
                    text,
                    vector,
                }),
                Err(e) => {
                    warn!(
                        fact_id = %item.fact.fact_id,
                        error = %e,
                        "Embedding failed, deferring index write"
                    );
                    METRICS.record_index_failure();
                    deferred.push(IndexJob {
                        scope: scope.to_string(),
                        entity_id: resolved.entity.id,
                        fact_id: item.fact.fact_id.clone(),
                        text,
                    });
                }
            }
        }

        if !points.is_empty() {
            if let Err(e) = self.index.upsert(points.clone()).await {
                warn!(error = %e, "Vector upsert failed, deferring index writes");
                METRICS.record_index_failure();
                for point in points {
                    deferred.push(IndexJob {
                        scope: point.scope,
                        entity_id: point.entity_id,
                        fact_id: point.fact_id,
                        text: point.text,
                    });
                }
            }
        }

        for job in deferred {
            self.queue.push(job).await;
        }
    }
}
