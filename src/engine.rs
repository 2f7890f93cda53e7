//! Top-level wiring: one struct owning both pipelines
//!
//! `MemoryEngine::connect` builds the production stack from configuration;
//! `MemoryEngine::with_components` accepts the collaborator traits directly,
//! which is how tests inject stub extractors, embedders and indexes.

use std::sync::Arc;

use qdrant_client::client::QdrantClient;
use tracing::info;

use crate::assimilate::{AssimilateRequest, AssimilateResponse, AssimilationFailure, Assimilator};
use crate::config::MemoryConfig;
use crate::error::{MemoryError, Result};
use crate::extract::{Embedder, FactExtractor, HttpEmbedder, HttpFactExtractor, RetryingExtractor};
use crate::graph::GraphStore;
use crate::identity::IdentityResolver;
use crate::lookup::{LookupRequest, LookupResponse, RetrievalOrchestrator};
use crate::merge::FactMerger;
use crate::vector::{IndexQueue, IndexReconciler, QdrantIndex, VectorIndex};

/// The assembled memory core
pub struct MemoryEngine {
    graph: GraphStore,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    queue: Arc<IndexQueue>,
    assimilator: Assimilator,
    retrieval: RetrievalOrchestrator,
    reconcile_interval: std::time::Duration,
}

impl MemoryEngine {
    /// Connect to the graph and vector backends and build the production
    /// extractor/embedder clients.
    pub async fn connect(config: MemoryConfig) -> Result<Self> {
        let graph = GraphStore::open(&config.graph.path).await?;

        let client = QdrantClient::from_url(&config.vector.url)
            .build()
            .map_err(|e| MemoryError::StoreUnavailable(format!("Qdrant client: {}", e)))?;
        let index: Arc<dyn VectorIndex> = Arc::new(QdrantIndex::new(client, config.vector.clone()));
        index.ensure_ready().await?;

        let extractor: Arc<dyn FactExtractor> = Arc::new(RetryingExtractor::new(
            HttpFactExtractor::new(config.extractor.clone())?,
            config.extractor.retry.clone(),
        ));
        let embedder: Arc<dyn Embedder> = Arc::new(HttpEmbedder::new(config.embedder.clone())?);

        info!("Memory engine connected");
        Ok(Self::with_components(graph, index, extractor, embedder, &config))
    }

    /// Assemble the engine from explicit collaborators.
    pub fn with_components(
        graph: GraphStore,
        index: Arc<dyn VectorIndex>,
        extractor: Arc<dyn FactExtractor>,
        embedder: Arc<dyn Embedder>,
        config: &MemoryConfig,
    ) -> Self {
        let resolver = IdentityResolver::new(graph.clone());
        let merger = FactMerger::new(graph.clone());
        let queue = Arc::new(IndexQueue::new(config.vector.retry_queue_capacity));

        let assimilator = Assimilator::new(
            resolver.clone(),
            extractor,
            merger,
            embedder.clone(),
            index.clone(),
            queue.clone(),
            config.extractor.stage_timeout(),
        );
        let retrieval = RetrievalOrchestrator::new(
            resolver,
            graph.clone(),
            embedder.clone(),
            index.clone(),
            config.vector.top_k,
        );

        Self {
            graph,
            index,
            embedder,
            queue,
            assimilator,
            retrieval,
            reconcile_interval: std::time::Duration::from_secs(
                config.vector.reconcile_interval_secs,
            ),
        }
    }

    /// Ingest one piece of text for an identifier.
    pub async fn assimilate(
        &self,
        request: AssimilateRequest,
    ) -> std::result::Result<AssimilateResponse, AssimilationFailure> {
        self.assimilator.assimilate(request).await
    }

    /// Retrieve an entity's memory.
    pub async fn lookup(&self, request: LookupRequest) -> Result<LookupResponse> {
        self.retrieval.lookup(request).await
    }

    /// Build a reconciler sharing this engine's queue and backends.
    pub fn reconciler(&self) -> IndexReconciler {
        IndexReconciler::new(
            self.graph.clone(),
            self.index.clone(),
            self.embedder.clone(),
            self.queue.clone(),
            self.reconcile_interval,
        )
    }

    /// Spawn the reconciler as a background task. Abort the handle on
    /// shutdown.
    pub fn spawn_reconciler(&self) -> tokio::task::JoinHandle<()> {
        let reconciler = self.reconciler();
        tokio::spawn(reconciler.run())
    }

    /// Pending deferred index jobs; mainly for health reporting.
    pub async fn index_backlog(&self) -> usize {
        self.queue.len().await
    }

    pub fn graph(&self) -> &GraphStore {
        &self.graph
    }
}
