//! Retrieval pipeline tests: ordering, semantic re-ranking, index-lag
//! handling, summary mode and degradation paths.

mod common;

use std::sync::Arc;

use memory_engine::extract::{Embedder, FactExtractor};
use memory_engine::graph::GraphStore;
use memory_engine::vector::VectorIndex;
use memory_engine::{
    AssimilateRequest, Identifier, LookupRequest, MemoryEngine, MemoryError,
};

use common::{
    extracted, in_memory_graph, test_config, FailingIndex, HashEmbedder, InMemoryIndex,
    ScriptedExtractor,
};

fn ident() -> Identifier {
    Identifier::new("email", "alice@example.com")
}

fn assimilate_request(content: &str) -> AssimilateRequest {
    AssimilateRequest {
        scope: "tenant-a".to_string(),
        identifier: ident(),
        content: content.to_string(),
        timestamp: None,
        history: vec![],
    }
}

fn lookup_request(semantic_query: Option<&str>, summary: bool) -> LookupRequest {
    LookupRequest {
        scope: "tenant-a".to_string(),
        identifier: ident(),
        semantic_query: semantic_query.map(str::to_string),
        summary,
    }
}

async fn engine_with(
    extractor: Arc<dyn FactExtractor>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
) -> (MemoryEngine, GraphStore) {
    let graph = in_memory_graph().await;
    let engine =
        MemoryEngine::with_components(graph.clone(), index, extractor, embedder, &test_config());
    (engine, graph)
}

/// Two facts with distinct confidence, both indexed.
async fn seeded_engine(index: Arc<dyn VectorIndex>) -> MemoryEngine {
    let extractor = ScriptedExtractor::new(vec![vec![
        extracted("Location", "Berlin", "moved to", 0.95),
        extracted("Employer", "Acme", "works at", 0.7),
    ]]);
    let (engine, _) = engine_with(extractor, Arc::new(HashEmbedder), index).await;
    engine
        .assimilate(assimilate_request("Alice moved to Berlin and works at Acme."))
        .await
        .unwrap();
    engine
}

#[tokio::test]
async fn test_plain_lookup_orders_by_confidence() {
    let engine = seeded_engine(InMemoryIndex::new()).await;

    let response = engine.lookup(lookup_request(None, false)).await.unwrap();

    assert!(response.identifier_relationship.is_primary);
    assert_eq!(response.facts.len(), 2);
    assert_eq!(response.facts[0].fact.fact_id, "location:berlin");
    assert_eq!(response.facts[1].fact.fact_id, "employer:acme");
    assert!(response.facts.iter().all(|f| f.score.is_none()));
    assert!(response.summary_text.is_none());
}

#[tokio::test]
async fn test_semantic_query_reranks_by_similarity() {
    let engine = seeded_engine(InMemoryIndex::new()).await;

    // The query matches the lower-confidence fact's embedded text exactly,
    // so similarity outranks confidence.
    let response = engine
        .lookup(lookup_request(Some("works at Acme (Employer)"), false))
        .await
        .unwrap();

    assert_eq!(response.facts.len(), 2);
    assert_eq!(response.facts[0].fact.fact_id, "employer:acme");
    let top = response.facts[0].score.unwrap();
    let second = response.facts[1].score.unwrap();
    assert!(top > second);
    assert!(top > 0.999);
}

#[tokio::test]
async fn test_facts_missing_from_index_are_appended_unscored() {
    let index = InMemoryIndex::new();
    let engine = seeded_engine(index.clone()).await;

    // A second engine on the same graph but a dead index: its fact lands in
    // the graph while the shared index lags behind.
    let extractor = ScriptedExtractor::new(vec![vec![extracted(
        "Hobby", "chess", "plays", 0.99,
    )]]);
    let lagging = MemoryEngine::with_components(
        engine.graph().clone(),
        Arc::new(FailingIndex),
        extractor,
        Arc::new(HashEmbedder),
        &test_config(),
    );
    lagging
        .assimilate(assimilate_request("Alice plays chess."))
        .await
        .unwrap();

    let response = engine
        .lookup(lookup_request(Some("works at Acme (Employer)"), false))
        .await
        .unwrap();

    // All three facts present; the unindexed one is last and unscored
    // despite having the highest confidence.
    assert_eq!(response.facts.len(), 3);
    assert!(response.facts[0].score.is_some());
    assert!(response.facts[1].score.is_some());
    let tail = &response.facts[2];
    assert_eq!(tail.fact.fact_id, "hobby:chess");
    assert!(tail.score.is_none());
}

#[tokio::test]
async fn test_index_outage_degrades_to_graph_order() {
    let extractor = ScriptedExtractor::new(vec![vec![
        extracted("Location", "Berlin", "moved to", 0.95),
        extracted("Employer", "Acme", "works at", 0.7),
    ]]);
    let (engine, _) = engine_with(extractor, Arc::new(HashEmbedder), Arc::new(FailingIndex)).await;
    engine
        .assimilate(assimilate_request("Alice moved to Berlin and works at Acme."))
        .await
        .unwrap();

    // Semantic lookup still answers, in graph order, all unscored.
    let response = engine
        .lookup(lookup_request(Some("anything"), false))
        .await
        .unwrap();
    assert_eq!(response.facts.len(), 2);
    assert_eq!(response.facts[0].fact.fact_id, "location:berlin");
    assert!(response.facts.iter().all(|f| f.score.is_none()));
}

#[tokio::test]
async fn test_summary_mode_renders_ranked_facts() {
    let engine = seeded_engine(InMemoryIndex::new()).await;

    let response = engine.lookup(lookup_request(None, true)).await.unwrap();

    assert_eq!(
        response.summary_text.as_deref(),
        Some("alice@example.com: moved to Berlin (Location); works at Acme (Employer).")
    );
    // Summary mode is formatting only; the structured facts stay intact.
    assert_eq!(response.facts.len(), 2);
}

#[tokio::test]
async fn test_summary_for_entity_without_facts() {
    let extractor = ScriptedExtractor::new(vec![vec![]]);
    let (engine, _) =
        engine_with(extractor, Arc::new(HashEmbedder), InMemoryIndex::new()).await;
    engine
        .assimilate(assimilate_request("hello"))
        .await
        .unwrap();

    let response = engine.lookup(lookup_request(None, true)).await.unwrap();
    assert!(response.facts.is_empty());
    assert_eq!(
        response.summary_text.as_deref(),
        Some("alice@example.com has no recorded facts.")
    );
}

#[tokio::test]
async fn test_lookup_unknown_identifier_fails_without_creating() {
    let (engine, graph) = engine_with(
        ScriptedExtractor::new(vec![]),
        Arc::new(HashEmbedder),
        InMemoryIndex::new(),
    )
    .await;

    let err = engine.lookup(lookup_request(None, false)).await.unwrap_err();
    assert!(matches!(err, MemoryError::EntityNotFound { .. }));

    assert!(graph
        .find_entity_by_identifier("tenant-a", &ident())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_lookup_respects_scope() {
    let engine = seeded_engine(InMemoryIndex::new()).await;

    let err = engine
        .lookup(LookupRequest {
            scope: "tenant-b".to_string(),
            identifier: ident(),
            semantic_query: None,
            summary: false,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, MemoryError::EntityNotFound { .. }));
}
