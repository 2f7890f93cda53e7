//! Qdrant-backed vector index adapter

use async_trait::async_trait;
use qdrant_client::{
    client::{Payload, QdrantClient},
    qdrant::{
        value::Kind, Condition, CreateCollection, Distance, FieldCondition, Filter, Match,
        PointStruct, SearchPoints, Value, VectorParams, VectorsConfig,
    },
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::VectorConfig;
use crate::error::{MemoryError, Result};

fn value_str(value: &Value) -> Option<&str> {
    match &value.kind {
        Some(Kind::StringValue(s)) => Some(s.as_str()),
        _ => None,
    }
}

/// One fact's entry in the index, scoped by entity so the same fact text
/// for two entities indexes as two distinct vectors
#[derive(Debug, Clone)]
pub struct FactPoint {
    pub scope: String,
    pub entity_id: Uuid,
    pub fact_id: String,
    /// The descriptive text the vector was computed from
    pub text: String,
    pub vector: Vec<f32>,
}

impl FactPoint {
    /// Deterministic point id, so re-upserts overwrite instead of duplicate.
    pub fn point_id(&self) -> Uuid {
        let key = format!("{}:{}:{}", self.scope, self.entity_id, self.fact_id);
        Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes())
    }
}

/// A semantic-search hit
#[derive(Debug, Clone)]
pub struct ScoredFact {
    pub fact_id: String,
    pub score: f32,
    pub text: String,
}

/// Derived semantic index over an entity's facts
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Make the backing collection exist; called once at startup.
    async fn ensure_ready(&self) -> Result<()>;

    /// Write or overwrite fact vectors.
    async fn upsert(&self, points: Vec<FactPoint>) -> Result<()>;

    /// Nearest facts of one entity to `vector`, best first.
    async fn query(
        &self,
        scope: &str,
        entity_id: Uuid,
        vector: Vec<f32>,
        top_k: usize,
    ) -> Result<Vec<ScoredFact>>;
}

/// Production index on Qdrant
pub struct QdrantIndex {
    client: QdrantClient,
    config: VectorConfig,
}

impl QdrantIndex {
    pub fn new(client: QdrantClient, config: VectorConfig) -> Self {
        Self { client, config }
    }

    fn keyword_condition(key: &str, value: String) -> Condition {
        Condition {
            condition_one_of: Some(qdrant_client::qdrant::condition::ConditionOneOf::Field(
                FieldCondition {
                    key: key.to_string(),
                    r#match: Some(Match {
                        match_value: Some(qdrant_client::qdrant::r#match::MatchValue::Keyword(
                            value,
                        )),
                    }),
                    ..Default::default()
                },
            )),
        }
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn ensure_ready(&self) -> Result<()> {
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(|e| MemoryError::StoreUnavailable(format!("Failed to list collections: {}", e)))?;

        let exists = collections
            .collections
            .iter()
            .any(|c| c.name == self.config.collection_name);

        if !exists {
            info!("Creating fact vector collection: {}", self.config.collection_name);

            self.client
                .create_collection(&CreateCollection {
                    collection_name: self.config.collection_name.clone(),
                    vectors_config: Some(VectorsConfig {
                        config: Some(qdrant_client::qdrant::vectors_config::Config::Params(
                            VectorParams {
                                size: self.config.vector_size as u64,
                                distance: Distance::Cosine.into(),
                                ..Default::default()
                            },
                        )),
                    }),
                    ..Default::default()
                })
                .await
                .map_err(|e| {
                    MemoryError::StoreUnavailable(format!("Failed to create collection: {}", e))
                })?;
        }

        Ok(())
    }

    async fn upsert(&self, points: Vec<FactPoint>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        let count = points.len();
        let qdrant_points: Vec<PointStruct> = points
            .into_iter()
            .map(|p| {
                let mut payload = Payload::new();
                payload.insert("scope", p.scope.clone());
                payload.insert("entity_id", p.entity_id.to_string());
                payload.insert("fact_id", p.fact_id.clone());
                payload.insert("text", p.text.clone());
                PointStruct::new(p.point_id().to_string(), p.vector, payload)
            })
            .collect();

        self.client
            .upsert_points(&self.config.collection_name, None, qdrant_points, None)
            .await
            .map_err(|e| MemoryError::StoreUnavailable(format!("Failed to upsert vectors: {}", e)))?;

        debug!(points = count, "Fact vectors upserted");
        Ok(())
    }

    async fn query(
        &self,
        scope: &str,
        entity_id: Uuid,
        vector: Vec<f32>,
        top_k: usize,
    ) -> Result<Vec<ScoredFact>> {
        let filter = Filter {
            must: vec![
                Self::keyword_condition("scope", scope.to_string()),
                Self::keyword_condition("entity_id", entity_id.to_string()),
            ],
            ..Default::default()
        };

        let search_result = self
            .client
            .search_points(&SearchPoints {
                collection_name: self.config.collection_name.clone(),
                vector,
                filter: Some(filter),
                limit: top_k as u64,
                with_payload: Some(true.into()),
                ..Default::default()
            })
            .await
            .map_err(|e| MemoryError::StoreUnavailable(format!("Vector query failed: {}", e)))?;

        let hits: Vec<ScoredFact> = search_result
            .result
            .iter()
            .filter_map(|point| {
                Some(ScoredFact {
                    fact_id: value_str(point.payload.get("fact_id")?)?.to_string(),
                    score: point.score,
                    text: point
                        .payload
                        .get("text")
                        .and_then(value_str)
                        .unwrap_or_default()
                        .to_string(),
                })
            })
            .collect();

        debug!(hits = hits.len(), "Vector query complete");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_id_is_deterministic() {
        let entity = Uuid::new_v4();
        let a = FactPoint {
            scope: "t1".into(),
            entity_id: entity,
            fact_id: "location:berlin".into(),
            text: "moved to Berlin (Location)".into(),
            vector: vec![0.0; 4],
        };
        let b = FactPoint {
            vector: vec![1.0; 4],
            ..a.clone()
        };
        assert_eq!(a.point_id(), b.point_id());
    }

    #[test]
    fn test_point_id_scoped_per_entity() {
        let a = FactPoint {
            scope: "t1".into(),
            entity_id: Uuid::new_v4(),
            fact_id: "location:berlin".into(),
            text: String::new(),
            vector: vec![],
        };
        let b = FactPoint {
            entity_id: Uuid::new_v4(),
            ..a.clone()
        };
        assert_ne!(a.point_id(), b.point_id());
    }

    // Requires a running Qdrant instance.
    #[tokio::test]
    #[ignore]
    async fn test_ensure_ready_creates_collection() {
        let client = QdrantClient::from_url("http://localhost:6334").build().unwrap();
        let index = QdrantIndex::new(client, VectorConfig::default());
        assert!(index.ensure_ready().await.is_ok());
    }
}
