//! SQLite-backed graph store

use std::path::Path;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rusqlite::OptionalExtension as _;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{MemoryError, Result};
use crate::merge::PlannedFact;

use super::models::{
    Entity, FactNode, FactRelationship, FactWithProvenance, Identifier, IdentifierLink,
    MergedFact, ResolvedEntity, Source,
};
use super::schema::SCHEMA;

fn encode_dt(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_dt(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| MemoryError::Internal(format!("Corrupt timestamp '{}': {}", raw, e)))
}

fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| MemoryError::Internal(format!("Corrupt id '{}': {}", raw, e)))
}

fn parse_metadata(raw: &str) -> Result<IndexMap<String, String>> {
    serde_json::from_str(raw)
        .map_err(|e| MemoryError::Internal(format!("Corrupt entity metadata: {}", e)))
}

/// True when the error is a unique-constraint conflict, i.e. another writer
/// won a conditional create.
fn is_constraint_violation(err: &tokio_rusqlite::Error) -> bool {
    matches!(
        err,
        tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(f, _))
            if f.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

// Row carriers: everything crosses the connection thread as plain strings
// and is decoded on the caller side.

struct RawEntity {
    entity_id: String,
    created_at: String,
    metadata: String,
}

impl RawEntity {
    fn into_entity(self) -> Result<Entity> {
        Ok(Entity {
            id: parse_uuid(&self.entity_id)?,
            created_at: parse_dt(&self.created_at)?,
            metadata: parse_metadata(&self.metadata)?,
        })
    }
}

struct RawResolved {
    entity: RawEntity,
    id_type: String,
    id_value: String,
    is_primary: bool,
    link_created_at: String,
}

impl RawResolved {
    fn into_resolved(self, created: bool) -> Result<ResolvedEntity> {
        Ok(ResolvedEntity {
            entity: self.entity.into_entity()?,
            identifier: Identifier::new(self.id_type, self.id_value),
            link: IdentifierLink {
                is_primary: self.is_primary,
                created_at: parse_dt(&self.link_created_at)?,
            },
            created,
        })
    }
}

struct RawFactRow {
    fact_id: String,
    fact_type: String,
    name: String,
    fact_created_at: String,
    verb: String,
    confidence: f64,
    rel_created_at: String,
    source_id: Option<String>,
    source_content: Option<String>,
    source_timestamp: Option<String>,
    source_created_at: Option<String>,
}

struct RawMerged {
    fact_id: String,
    fact_type: String,
    name: String,
    fact_created_at: String,
    verb: String,
    confidence: f64,
    rel_created_at: String,
    is_new: bool,
}

impl RawMerged {
    fn into_merged(self) -> Result<MergedFact> {
        Ok(MergedFact {
            fact: FactNode {
                fact_id: self.fact_id,
                fact_type: self.fact_type,
                name: self.name,
                created_at: parse_dt(&self.fact_created_at)?,
            },
            relationship: FactRelationship {
                verb: self.verb,
                confidence_score: self.confidence as f32,
                created_at: parse_dt(&self.rel_created_at)?,
            },
            is_new: self.is_new,
        })
    }
}

/// Graph store backed by a single SQLite database.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct GraphStore {
    conn: tokio_rusqlite::Connection,
}

impl GraphStore {
    /// Open (or create) a store at `path` and run schema initialisation.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = tokio_rusqlite::Connection::open(path).await?;
        let store = Self { conn };
        store.init_schema().await?;
        Ok(store)
    }

    /// Open an in-memory store — used by tests.
    pub async fn open_in_memory() -> Result<Self> {
        let conn = tokio_rusqlite::Connection::open_in_memory().await?;
        let store = Self { conn };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        self.conn
            .call(|conn| {
                conn.execute_batch(SCHEMA)?;
                Ok(())
            })
            .await?;
        debug!("Graph schema initialised");
        Ok(())
    }

    /// Find the entity linked to `(type, value)` within `scope`.
    pub async fn find_entity_by_identifier(
        &self,
        scope: &str,
        identifier: &Identifier,
    ) -> Result<Option<ResolvedEntity>> {
        let scope = scope.to_string();
        let id_type = identifier.id_type.clone();
        let id_value = identifier.value.clone();

        let raw: Option<RawResolved> = self
            .conn
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT e.entity_id, e.created_at, e.metadata,
                                i.id_type, i.id_value, i.is_primary, i.created_at
                         FROM identifiers i
                         JOIN entities e ON e.entity_id = i.entity_id
                         WHERE i.scope = ?1 AND i.id_type = ?2 AND i.id_value = ?3",
                        rusqlite::params![scope, id_type, id_value],
                        |row| {
                            Ok(RawResolved {
                                entity: RawEntity {
                                    entity_id: row.get(0)?,
                                    created_at: row.get(1)?,
                                    metadata: row.get(2)?,
                                },
                                id_type: row.get(3)?,
                                id_value: row.get(4)?,
                                is_primary: row.get(5)?,
                                link_created_at: row.get(6)?,
                            })
                        },
                    )
                    .optional()?)
            })
            .await?;

        raw.map(|r| r.into_resolved(false)).transpose()
    }

    /// Create an entity and its first identifier atomically.
    ///
    /// The identifier table's primary key serializes concurrent creates for
    /// the same never-seen `(type, value)`: the loser's insert conflicts,
    /// rolls back entirely, and the caller re-reads the winner's entity.
    pub async fn create_entity(
        &self,
        scope: &str,
        identifier: &Identifier,
        metadata: IndexMap<String, String>,
    ) -> Result<ResolvedEntity> {
        let entity = Entity {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            metadata,
        };
        let link = IdentifierLink {
            is_primary: true,
            created_at: entity.created_at,
        };

        let scope_owned = scope.to_string();
        let id_type = identifier.id_type.clone();
        let id_value = identifier.value.clone();
        let entity_id_str = entity.id.to_string();
        let at_str = encode_dt(entity.created_at);
        let metadata_str = serde_json::to_string(&entity.metadata)
            .map_err(|e| MemoryError::Internal(format!("Failed to encode metadata: {}", e)))?;

        let inserted = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO entities (entity_id, scope, created_at, metadata)
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![entity_id_str, scope_owned, at_str, metadata_str],
                )?;
                tx.execute(
                    "INSERT INTO identifiers (scope, id_type, id_value, entity_id, is_primary, created_at)
                     VALUES (?1, ?2, ?3, ?4, 1, ?5)",
                    rusqlite::params![scope_owned, id_type, id_value, entity_id_str, at_str],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await;

        match inserted {
            Ok(()) => {
                info!(
                    entity_id = %entity.id,
                    id_type = %identifier.id_type,
                    "Created entity for new identifier"
                );
                Ok(ResolvedEntity {
                    entity,
                    identifier: identifier.clone(),
                    link,
                    created: true,
                })
            }
            Err(e) if is_constraint_violation(&e) => {
                // Lost the race; the winner's entity is authoritative.
                debug!(
                    id_type = %identifier.id_type,
                    "Identifier create conflicted, re-reading winner"
                );
                self.find_entity_by_identifier(scope, identifier)
                    .await?
                    .ok_or_else(|| {
                        MemoryError::InconsistentWrite(format!(
                            "Identifier {}:{} conflicted on create but is absent on re-read",
                            identifier.id_type, identifier.value
                        ))
                    })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Link an additional identifier to an existing entity.
    ///
    /// Idempotent when the identifier already points at `entity_id`; a
    /// conflict with a different entity is rejected, since an identifier
    /// maps to exactly one entity for its lifetime.
    pub async fn link_identifier(
        &self,
        scope: &str,
        entity_id: Uuid,
        identifier: &Identifier,
    ) -> Result<IdentifierLink> {
        let scope_owned = scope.to_string();
        let id_type = identifier.id_type.clone();
        let id_value = identifier.value.clone();
        let entity_id_str = entity_id.to_string();
        let now = Utc::now();
        let at_str = encode_dt(now);

        let raw: (String, bool, String) = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                // Primary only when the entity has no identifier yet.
                tx.execute(
                    "INSERT INTO identifiers (scope, id_type, id_value, entity_id, is_primary, created_at)
                     SELECT ?1, ?2, ?3, ?4,
                            NOT EXISTS (SELECT 1 FROM identifiers WHERE entity_id = ?4),
                            ?5
                     WHERE true
                     ON CONFLICT (scope, id_type, id_value) DO NOTHING",
                    rusqlite::params![scope_owned, id_type, id_value, entity_id_str, at_str],
                )?;
                let row = tx.query_row(
                    "SELECT entity_id, is_primary, created_at
                     FROM identifiers
                     WHERE scope = ?1 AND id_type = ?2 AND id_value = ?3",
                    rusqlite::params![scope_owned, id_type, id_value],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )?;
                tx.commit()?;
                Ok(row)
            })
            .await?;

        let (owner, is_primary, created_at) = raw;
        if owner != entity_id.to_string() {
            return Err(MemoryError::Validation(format!(
                "Identifier {}:{} is already linked to another entity",
                identifier.id_type, identifier.value
            )));
        }
        Ok(IdentifierLink {
            is_primary,
            created_at: parse_dt(&created_at)?,
        })
    }

    /// Apply one merge: insert the source, upsert every planned fact and its
    /// HAS_FACT edge, and append DERIVED_FROM edges — all in one transaction
    /// so a mid-merge failure leaves the graph in its prior state.
    pub async fn apply_merge(
        &self,
        scope: &str,
        entity_id: Uuid,
        source: &Source,
        planned: Vec<PlannedFact>,
    ) -> Result<Vec<MergedFact>> {
        let scope_owned = scope.to_string();
        let entity_id_str = entity_id.to_string();
        let source_id_str = source.id.to_string();
        let source_content = source.content.clone();
        let source_ts = encode_dt(source.timestamp);
        let source_created = encode_dt(source.created_at);
        let now_str = encode_dt(Utc::now());

        let raws: Vec<RawMerged> = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;

                tx.execute(
                    "INSERT INTO sources (source_id, scope, content, timestamp, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    rusqlite::params![
                        source_id_str,
                        scope_owned,
                        source_content,
                        source_ts,
                        source_created
                    ],
                )?;

                let mut merged = Vec::with_capacity(planned.len());
                for p in &planned {
                    tx.execute(
                        "INSERT INTO facts (scope, fact_id, fact_type, name, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5)
                         ON CONFLICT (scope, fact_id) DO NOTHING",
                        rusqlite::params![scope_owned, p.fact_id, p.fact_type, p.name, now_str],
                    )?;

                    let exists: bool = tx
                        .query_row(
                            "SELECT 1 FROM entity_facts
                             WHERE scope = ?1 AND entity_id = ?2 AND fact_id = ?3",
                            rusqlite::params![scope_owned, entity_id_str, p.fact_id],
                            |_| Ok(true),
                        )
                        .optional()?
                        .unwrap_or(false);

                    if exists {
                        // Monotonic confidence; verb follows a strictly
                        // stronger observation. Both CASEs read the
                        // pre-update row, so ordering is immaterial.
                        tx.execute(
                            "UPDATE entity_facts
                             SET verb = CASE WHEN ?4 > confidence THEN ?5 ELSE verb END,
                                 confidence = CASE WHEN ?4 > confidence THEN ?4 ELSE confidence END
                             WHERE scope = ?1 AND entity_id = ?2 AND fact_id = ?3",
                            rusqlite::params![
                                scope_owned,
                                entity_id_str,
                                p.fact_id,
                                p.confidence as f64,
                                p.verb
                            ],
                        )?;
                    } else {
                        tx.execute(
                            "INSERT INTO entity_facts
                               (scope, entity_id, fact_id, verb, confidence, created_at)
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                            rusqlite::params![
                                scope_owned,
                                entity_id_str,
                                p.fact_id,
                                p.verb,
                                p.confidence as f64,
                                now_str
                            ],
                        )?;
                    }

                    // Provenance accumulates even when the fact itself
                    // did not change.
                    tx.execute(
                        "INSERT INTO derivations (scope, fact_id, source_id, created_at)
                         VALUES (?1, ?2, ?3, ?4)
                         ON CONFLICT (scope, fact_id, source_id) DO NOTHING",
                        rusqlite::params![scope_owned, p.fact_id, source_id_str, now_str],
                    )?;

                    let raw = tx.query_row(
                        "SELECT f.fact_type, f.name, f.created_at,
                                ef.verb, ef.confidence, ef.created_at
                         FROM entity_facts ef
                         JOIN facts f ON f.scope = ef.scope AND f.fact_id = ef.fact_id
                         WHERE ef.scope = ?1 AND ef.entity_id = ?2 AND ef.fact_id = ?3",
                        rusqlite::params![scope_owned, entity_id_str, p.fact_id],
                        |row| {
                            Ok(RawMerged {
                                fact_id: p.fact_id.clone(),
                                fact_type: row.get(0)?,
                                name: row.get(1)?,
                                fact_created_at: row.get(2)?,
                                verb: row.get(3)?,
                                confidence: row.get(4)?,
                                rel_created_at: row.get(5)?,
                                is_new: !exists,
                            })
                        },
                    )?;
                    merged.push(raw);
                }

                tx.commit()?;
                Ok(merged)
            })
            .await
            .map_err(|e| {
                warn!(entity_id = %entity_id, "Merge transaction rolled back: {}", e);
                MemoryError::StoreUnavailable(e.to_string())
            })?;

        debug!(
            entity_id = %entity_id,
            facts = raws.len(),
            "Merge committed"
        );
        raws.into_iter().map(RawMerged::into_merged).collect()
    }

    /// All facts attached to an entity, each with its HAS_FACT edge and the
    /// full list of sources it was derived from. Ordered by confidence
    /// descending, edge recency breaking ties.
    pub async fn get_entity_facts(
        &self,
        scope: &str,
        entity_id: Uuid,
    ) -> Result<Vec<FactWithProvenance>> {
        let scope_owned = scope.to_string();
        let entity_id_str = entity_id.to_string();

        let rows: Vec<RawFactRow> = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT f.fact_id, f.fact_type, f.name, f.created_at,
                            ef.verb, ef.confidence, ef.created_at,
                            s.source_id, s.content, s.timestamp, s.created_at
                     FROM entity_facts ef
                     JOIN facts f ON f.scope = ef.scope AND f.fact_id = ef.fact_id
                     LEFT JOIN derivations d ON d.scope = ef.scope AND d.fact_id = ef.fact_id
                     LEFT JOIN sources s ON s.source_id = d.source_id
                     WHERE ef.scope = ?1 AND ef.entity_id = ?2
                     ORDER BY ef.confidence DESC, ef.created_at DESC, s.created_at ASC",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![scope_owned, entity_id_str], |row| {
                        Ok(RawFactRow {
                            fact_id: row.get(0)?,
                            fact_type: row.get(1)?,
                            name: row.get(2)?,
                            fact_created_at: row.get(3)?,
                            verb: row.get(4)?,
                            confidence: row.get(5)?,
                            rel_created_at: row.get(6)?,
                            source_id: row.get(7)?,
                            source_content: row.get(8)?,
                            source_timestamp: row.get(9)?,
                            source_created_at: row.get(10)?,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;

        // Fold the join rows into one record per fact, preserving the
        // SQL ordering.
        let mut out: IndexMap<String, FactWithProvenance> = IndexMap::new();
        for row in rows {
            let fact_created = parse_dt(&row.fact_created_at)?;
            let rel_created = parse_dt(&row.rel_created_at)?;
            let entry = out
                .entry(row.fact_id.clone())
                .or_insert_with(|| FactWithProvenance {
                    fact: FactNode {
                        fact_id: row.fact_id.clone(),
                        fact_type: row.fact_type.clone(),
                        name: row.name.clone(),
                        created_at: fact_created,
                    },
                    relationship: FactRelationship {
                        verb: row.verb.clone(),
                        confidence_score: row.confidence as f32,
                        created_at: rel_created,
                    },
                    sources: Vec::new(),
                });
            if let (Some(id), Some(content), Some(ts), Some(created)) = (
                row.source_id,
                row.source_content,
                row.source_timestamp,
                row.source_created_at,
            ) {
                entry.sources.push(Source {
                    id: parse_uuid(&id)?,
                    content,
                    timestamp: parse_dt(&ts)?,
                    created_at: parse_dt(&created)?,
                });
            }
        }

        Ok(out.into_values().collect())
    }

    /// Fetch a single entity by id.
    pub async fn get_entity(&self, scope: &str, entity_id: Uuid) -> Result<Option<Entity>> {
        let scope_owned = scope.to_string();
        let entity_id_str = entity_id.to_string();

        let raw: Option<RawEntity> = self
            .conn
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT entity_id, created_at, metadata
                         FROM entities
                         WHERE entity_id = ?1 AND scope = ?2",
                        rusqlite::params![entity_id_str, scope_owned],
                        |row| {
                            Ok(RawEntity {
                                entity_id: row.get(0)?,
                                created_at: row.get(1)?,
                                metadata: row.get(2)?,
                            })
                        },
                    )
                    .optional()?)
            })
            .await?;

        raw.map(RawEntity::into_entity).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident() -> Identifier {
        Identifier::new("email", "alice@example.com")
    }

    #[tokio::test]
    async fn test_create_then_find() {
        let store = GraphStore::open_in_memory().await.unwrap();
        let created = store
            .create_entity("t1", &ident(), IndexMap::new())
            .await
            .unwrap();
        assert!(created.created);
        assert!(created.link.is_primary);

        let found = store
            .find_entity_by_identifier("t1", &ident())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.entity.id, created.entity.id);
        assert!(!found.created);
    }

    #[tokio::test]
    async fn test_scopes_are_isolated() {
        let store = GraphStore::open_in_memory().await.unwrap();
        store
            .create_entity("t1", &ident(), IndexMap::new())
            .await
            .unwrap();
        let other = store
            .find_entity_by_identifier("t2", &ident())
            .await
            .unwrap();
        assert!(other.is_none());
    }

    #[tokio::test]
    async fn test_second_identifier_is_not_primary() {
        let store = GraphStore::open_in_memory().await.unwrap();
        let resolved = store
            .create_entity("t1", &ident(), IndexMap::new())
            .await
            .unwrap();

        let work = Identifier::new("email", "alice@work.example");
        let link = store
            .link_identifier("t1", resolved.entity.id, &work)
            .await
            .unwrap();
        assert!(!link.is_primary);

        // Idempotent relink.
        let again = store
            .link_identifier("t1", resolved.entity.id, &work)
            .await
            .unwrap();
        assert!(!again.is_primary);
    }

    #[tokio::test]
    async fn test_identifier_cannot_move_between_entities() {
        let store = GraphStore::open_in_memory().await.unwrap();
        store
            .create_entity("t1", &ident(), IndexMap::new())
            .await
            .unwrap();
        let bob = store
            .create_entity("t1", &Identifier::new("email", "bob@example.com"), IndexMap::new())
            .await
            .unwrap();

        let err = store
            .link_identifier("t1", bob.entity.id, &ident())
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::Validation(_)));
    }
}
