//! Graph store: the durable, authoritative half of the memory
//!
//! Entities, identifiers, facts and sources are nodes; HAS_IDENTIFIER,
//! HAS_FACT and DERIVED_FROM are edges. Every write is a keyed conditional
//! upsert so concurrent assimilations converge instead of duplicating, and
//! all writes for one assimilation run in a single transaction.

pub mod models;
pub mod schema;
pub mod store;

pub use models::{
    Entity, FactNode, FactRelationship, FactWithProvenance, Identifier, IdentifierLink,
    MergedFact, ResolvedEntity, Source,
};
pub use store::GraphStore;
