//! Durable, queryable memory for an AI agent.
//!
//! Facts about real-world entities are kept twice: in a graph store (the
//! durable source of truth, good for relationship reasoning) and in a
//! vector index (a derived semantic index, good for fuzzy retrieval). Two
//! pipelines tie the halves together:
//!
//! - **Assimilation** turns unstructured text into entity-linked,
//!   provenance-tracked facts: resolve the identifier, extract candidate
//!   facts, merge them into the graph in one transaction, then index their
//!   embeddings best-effort.
//! - **Lookup** retrieves an entity's structured memory, optionally
//!   re-ranked by semantic similarity to a query, with the graph always
//!   guaranteeing completeness when the index lags.
//!
//! The fact-extraction and embedding models are external collaborators
//! consumed through the [`extract::FactExtractor`] and [`extract::Embedder`]
//! traits.

pub mod assimilate;
pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod graph;
pub mod identity;
pub mod lookup;
pub mod merge;
pub mod metrics;
pub mod vector;

pub use assimilate::{AssimilateRequest, AssimilateResponse, AssimilationFailure, Stage};
pub use config::MemoryConfig;
pub use engine::MemoryEngine;
pub use error::{MemoryError, Result};
pub use graph::{Entity, Identifier};
pub use lookup::{LookupRequest, LookupResponse};
