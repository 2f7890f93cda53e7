//! Identity resolver: maps external identifiers to canonical entities

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::error::{MemoryError, Result};
use crate::graph::{GraphStore, Identifier, ResolvedEntity};

/// Resolves an `(type, value)` identifier to its canonical entity, creating
/// the entity on first sight.
///
/// Uniqueness under concurrency is delegated to the graph store's
/// conditional create: two racing resolutions of a never-seen identifier
/// yield the same entity, with exactly one of them reporting `created`.
#[derive(Clone)]
pub struct IdentityResolver {
    graph: GraphStore,
}

impl IdentityResolver {
    pub fn new(graph: GraphStore) -> Self {
        Self { graph }
    }

    fn validate(identifier: &Identifier) -> Result<()> {
        if identifier.id_type.trim().is_empty() {
            return Err(MemoryError::Validation(
                "Identifier type cannot be empty".to_string(),
            ));
        }
        if identifier.value.trim().is_empty() {
            return Err(MemoryError::Validation(
                "Identifier value cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Find-or-create resolution, used by assimilation.
    pub async fn resolve(&self, scope: &str, identifier: &Identifier) -> Result<ResolvedEntity> {
        Self::validate(identifier)?;

        if let Some(resolved) = self
            .graph
            .find_entity_by_identifier(scope, identifier)
            .await?
        {
            debug!(
                entity_id = %resolved.entity.id,
                id_type = %identifier.id_type,
                "Identifier resolved to existing entity"
            );
            return Ok(resolved);
        }

        let resolved = self
            .graph
            .create_entity(scope, identifier, IndexMap::new())
            .await?;
        if resolved.created {
            info!(
                entity_id = %resolved.entity.id,
                id_type = %identifier.id_type,
                "New entity created for identifier"
            );
        }
        Ok(resolved)
    }

    /// Lookup-only resolution; never creates.
    pub async fn resolve_existing(
        &self,
        scope: &str,
        identifier: &Identifier,
    ) -> Result<ResolvedEntity> {
        Self::validate(identifier)?;

        self.graph
            .find_entity_by_identifier(scope, identifier)
            .await?
            .ok_or_else(|| MemoryError::entity_not_found(&identifier.id_type, &identifier.value))
    }
}
