//! Shared test doubles for the pipeline integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use memory_engine::config::MemoryConfig;
use memory_engine::error::{MemoryError, Result};
use memory_engine::extract::{Embedder, ExtractedFact, FactExtractor};
use memory_engine::graph::GraphStore;
use memory_engine::vector::{FactPoint, ScoredFact, VectorIndex};

pub fn extracted(fact_type: &str, name: &str, verb: &str, confidence: f32) -> ExtractedFact {
    ExtractedFact {
        fact_type: fact_type.to_string(),
        name: name.to_string(),
        verb: verb.to_string(),
        confidence,
    }
}

pub fn test_config() -> MemoryConfig {
    MemoryConfig::default()
}

static TRACING: std::sync::Once = std::sync::Once::new();

/// Opt-in test logging, e.g. `RUST_LOG=debug cargo test`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub async fn in_memory_graph() -> GraphStore {
    init_tracing();
    GraphStore::open_in_memory().await.unwrap()
}

/// Extractor returning scripted fact lists, one per call, repeating the
/// last script when exhausted.
pub struct ScriptedExtractor {
    scripts: Mutex<Vec<Vec<ExtractedFact>>>,
}

impl ScriptedExtractor {
    pub fn new(scripts: Vec<Vec<ExtractedFact>>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts),
        })
    }
}

#[async_trait]
impl FactExtractor for ScriptedExtractor {
    async fn extract(&self, _text: &str, _history: &[String]) -> Result<Vec<ExtractedFact>> {
        let mut scripts = self.scripts.lock().await;
        if scripts.len() > 1 {
            Ok(scripts.remove(0))
        } else {
            Ok(scripts.first().cloned().unwrap_or_default())
        }
    }
}

/// Extractor that always fails, for EXTRACTING-stage error paths.
pub struct FailingExtractor;

#[async_trait]
impl FactExtractor for FailingExtractor {
    async fn extract(&self, _text: &str, _history: &[String]) -> Result<Vec<ExtractedFact>> {
        Err(MemoryError::ExtractionFailed("model unavailable".into()))
    }
}

/// Deterministic embedder: identical text gives identical vectors, so an
/// exact-text query scores 1.0 against its fact in the in-memory index.
pub struct HashEmbedder;

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; 16];
        for (i, byte) in text.bytes().enumerate() {
            vector[i % 16] += byte as f32 / 255.0;
        }
        Ok(vector)
    }
}

/// Embedder that always fails, for INDEXING degradation paths.
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(MemoryError::Internal("embedding service down".into()))
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

/// In-memory stand-in for the vector index.
pub struct InMemoryIndex {
    points: Mutex<HashMap<Uuid, FactPoint>>,
}

impl InMemoryIndex {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            points: Mutex::new(HashMap::new()),
        })
    }

    pub async fn len(&self) -> usize {
        self.points.lock().await.len()
    }

    pub async fn contains_fact(&self, fact_id: &str) -> bool {
        self.points
            .lock()
            .await
            .values()
            .any(|p| p.fact_id == fact_id)
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, points: Vec<FactPoint>) -> Result<()> {
        let mut map = self.points.lock().await;
        for point in points {
            map.insert(point.point_id(), point);
        }
        Ok(())
    }

    async fn query(
        &self,
        scope: &str,
        entity_id: Uuid,
        vector: Vec<f32>,
        top_k: usize,
    ) -> Result<Vec<ScoredFact>> {
        let map = self.points.lock().await;
        let mut hits: Vec<ScoredFact> = map
            .values()
            .filter(|p| p.scope == scope && p.entity_id == entity_id)
            .map(|p| ScoredFact {
                fact_id: p.fact_id.clone(),
                score: cosine(&p.vector, &vector),
                text: p.text.clone(),
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        hits.truncate(top_k);
        Ok(hits)
    }
}

/// Vector index that always fails, for derived-index degradation paths.
pub struct FailingIndex;

#[async_trait]
impl VectorIndex for FailingIndex {
    async fn ensure_ready(&self) -> Result<()> {
        Err(MemoryError::StoreUnavailable("index down".into()))
    }

    async fn upsert(&self, _points: Vec<FactPoint>) -> Result<()> {
        Err(MemoryError::StoreUnavailable("index down".into()))
    }

    async fn query(
        &self,
        _scope: &str,
        _entity_id: Uuid,
        _vector: Vec<f32>,
        _top_k: usize,
    ) -> Result<Vec<ScoredFact>> {
        Err(MemoryError::StoreUnavailable("index down".into()))
    }
}
