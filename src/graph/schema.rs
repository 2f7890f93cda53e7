//! SQL schema for the graph store.
//!
//! Nodes and edges live in their own tables; every edge table's primary key
//! doubles as the conditional-create constraint that makes concurrent
//! assimilations converge instead of duplicating rows.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS entities (
    entity_id   TEXT PRIMARY KEY,
    scope       TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    metadata    TEXT NOT NULL DEFAULT '{}'   -- JSON object, string values
);

-- Identifier node + HAS_IDENTIFIER edge in one row: an identifier exists
-- only as a handle on exactly one entity. The primary key is the global
-- uniqueness rule for (scope, type, value).
CREATE TABLE IF NOT EXISTS identifiers (
    scope       TEXT NOT NULL,
    id_type     TEXT NOT NULL,
    id_value    TEXT NOT NULL,
    entity_id   TEXT NOT NULL REFERENCES entities(entity_id),
    is_primary  INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL,
    PRIMARY KEY (scope, id_type, id_value)
);

-- Fact nodes are content-addressed by fact_id = lower(type) || ':' ||
-- lower(name), shared across entities within a scope.
CREATE TABLE IF NOT EXISTS facts (
    scope       TEXT NOT NULL,
    fact_id     TEXT NOT NULL,
    fact_type   TEXT NOT NULL,
    name        TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    PRIMARY KEY (scope, fact_id)
);

-- Sources are immutable; one row per assimilation call.
CREATE TABLE IF NOT EXISTS sources (
    source_id   TEXT PRIMARY KEY,
    scope       TEXT NOT NULL,
    content     TEXT NOT NULL,
    timestamp   TEXT NOT NULL,   -- event time, caller-supplied or ingestion
    created_at  TEXT NOT NULL
);

-- HAS_FACT: confidence only moves up, verb follows the stronger observation.
CREATE TABLE IF NOT EXISTS entity_facts (
    scope       TEXT NOT NULL,
    entity_id   TEXT NOT NULL REFERENCES entities(entity_id),
    fact_id     TEXT NOT NULL,
    verb        TEXT NOT NULL,
    confidence  REAL NOT NULL,
    created_at  TEXT NOT NULL,
    PRIMARY KEY (scope, entity_id, fact_id),
    FOREIGN KEY (scope, fact_id) REFERENCES facts(scope, fact_id)
);

-- DERIVED_FROM: additive provenance, one edge per (fact, source) pair.
CREATE TABLE IF NOT EXISTS derivations (
    scope       TEXT NOT NULL,
    fact_id     TEXT NOT NULL,
    source_id   TEXT NOT NULL REFERENCES sources(source_id),
    created_at  TEXT NOT NULL,
    PRIMARY KEY (scope, fact_id, source_id),
    FOREIGN KEY (scope, fact_id) REFERENCES facts(scope, fact_id)
);

CREATE INDEX IF NOT EXISTS identifiers_entity_idx ON identifiers(entity_id);
CREATE INDEX IF NOT EXISTS entity_facts_fact_idx  ON entity_facts(scope, fact_id);
CREATE INDEX IF NOT EXISTS derivations_source_idx ON derivations(source_id);

PRAGMA user_version = 1;
";
