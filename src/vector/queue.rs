//! Retry queue for deferred vector-index writes

use std::collections::VecDeque;

use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

use crate::metrics::METRICS;

/// One fact waiting to be (re-)embedded and indexed.
///
/// Carries text rather than a vector: when embedding itself was the failing
/// step, the retry has to redo it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexJob {
    pub scope: String,
    pub entity_id: Uuid,
    pub fact_id: String,
    pub text: String,
}

/// Bounded FIFO of index jobs shared between assimilation workers and the
/// background reconciler
pub struct IndexQueue {
    inner: Mutex<VecDeque<IndexJob>>,
    capacity: usize,
}

impl IndexQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            capacity,
        }
    }

    /// Enqueue a job. At capacity the oldest job is dropped — the
    /// reconciler can rebuild any entity from the graph, so dropped jobs
    /// are recoverable.
    pub async fn push(&self, job: IndexJob) {
        let mut queue = self.inner.lock().await;
        if queue.len() >= self.capacity {
            if let Some(dropped) = queue.pop_front() {
                warn!(
                    fact_id = %dropped.fact_id,
                    entity_id = %dropped.entity_id,
                    "Index retry queue full, dropping oldest job"
                );
            }
        }
        queue.push_back(job);
        METRICS.set_index_queue_depth(queue.len());
    }

    /// Take every pending job.
    pub async fn drain(&self) -> Vec<IndexJob> {
        let mut queue = self.inner.lock().await;
        let jobs: Vec<IndexJob> = queue.drain(..).collect();
        METRICS.set_index_queue_depth(0);
        jobs
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}
