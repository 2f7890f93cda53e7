//! Background reconciler keeping the vector index consistent with the graph

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::extract::Embedder;
use crate::graph::GraphStore;
use crate::metrics::METRICS;

use super::index::{FactPoint, VectorIndex};
use super::queue::{IndexJob, IndexQueue};
use super::embedding_text;

/// Drains the index retry queue on an interval and can rebuild any entity's
/// vectors from the graph, which is the authoritative record.
pub struct IndexReconciler {
    graph: GraphStore,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    queue: Arc<IndexQueue>,
    interval: Duration,
}

impl IndexReconciler {
    pub fn new(
        graph: GraphStore,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        queue: Arc<IndexQueue>,
        interval: Duration,
    ) -> Self {
        Self {
            graph,
            index,
            embedder,
            queue,
            interval,
        }
    }

    /// Run forever; intended to be spawned as a background task and aborted
    /// on shutdown.
    pub async fn run(self) {
        info!(interval_secs = self.interval.as_secs(), "Index reconciler started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.drain_once().await;
        }
    }

    /// One reconciliation pass over the queued jobs. Jobs that fail again
    /// are re-queued for the next pass.
    pub async fn drain_once(&self) {
        let jobs = self.queue.drain().await;
        if jobs.is_empty() {
            return;
        }
        debug!(jobs = jobs.len(), "Reconciling deferred index jobs");

        for job in jobs {
            if let Err(e) = self.index_job(&job).await {
                warn!(
                    fact_id = %job.fact_id,
                    entity_id = %job.entity_id,
                    error = %e,
                    "Index retry failed, re-queueing"
                );
                METRICS.record_index_failure();
                self.queue.push(job).await;
            } else {
                METRICS.record_index_retry_success();
            }
        }
    }

    async fn index_job(&self, job: &IndexJob) -> Result<()> {
        let vector = self.embedder.embed(&job.text).await?;
        self.index
            .upsert(vec![FactPoint {
                scope: job.scope.clone(),
                entity_id: job.entity_id,
                fact_id: job.fact_id.clone(),
                text: job.text.clone(),
                vector,
            }])
            .await
    }

    /// Re-embed and re-upsert every fact of one entity from the graph.
    /// Returns the number of facts synced.
    pub async fn resync_entity(&self, scope: &str, entity_id: Uuid) -> Result<usize> {
        let facts = self.graph.get_entity_facts(scope, entity_id).await?;
        let mut points = Vec::with_capacity(facts.len());

        for record in &facts {
            let text = embedding_text(&record.fact, &record.relationship.verb);
            let vector = self.embedder.embed(&text).await?;
            points.push(FactPoint {
                scope: scope.to_string(),
                entity_id,
                fact_id: record.fact.fact_id.clone(),
                text,
                vector,
            });
        }

        let count = points.len();
        self.index.upsert(points).await?;
        info!(entity_id = %entity_id, facts = count, "Entity vectors resynced");
        Ok(count)
    }
}
