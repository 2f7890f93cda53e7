//! Error taxonomy for the memory engine

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, MemoryError>;

/// Errors surfaced by the memory core
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Lookup on an identifier with no linked entity. Never retried
    /// internally; the caller decides what an unknown identifier means.
    #[error("no entity linked to identifier {id_type}:{id_value}")]
    EntityNotFound { id_type: String, id_value: String },

    /// The external fact-extraction model failed or timed out after the
    /// bounded retry policy was exhausted.
    #[error("fact extraction failed: {0}")]
    ExtractionFailed(String),

    /// The graph or vector backend could not be reached. Surfaced
    /// immediately; the surrounding infrastructure retries the request.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A graph write applied partially. Integrity hazard; always logged at
    /// error level before being returned.
    #[error("inconsistent write: {0}")]
    InconsistentWrite(String),

    /// Malformed caller input (empty identifier, out-of-range confidence).
    #[error("validation error: {0}")]
    Validation(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl MemoryError {
    pub fn entity_not_found(id_type: &str, id_value: &str) -> Self {
        Self::EntityNotFound {
            id_type: id_type.to_string(),
            id_value: id_value.to_string(),
        }
    }

    /// Whether this error indicates the request never touched durable state.
    pub fn is_pre_write(&self) -> bool {
        matches!(
            self,
            Self::EntityNotFound { .. } | Self::ExtractionFailed(_) | Self::Validation(_)
        )
    }
}

impl From<tokio_rusqlite::Error> for MemoryError {
    fn from(e: tokio_rusqlite::Error) -> Self {
        MemoryError::StoreUnavailable(e.to_string())
    }
}

impl From<rusqlite::Error> for MemoryError {
    fn from(e: rusqlite::Error) -> Self {
        MemoryError::StoreUnavailable(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_not_found_display() {
        let err = MemoryError::entity_not_found("email", "alice@example.com");
        assert_eq!(
            err.to_string(),
            "no entity linked to identifier email:alice@example.com"
        );
    }

    #[test]
    fn test_pre_write_classification() {
        assert!(MemoryError::ExtractionFailed("timeout".into()).is_pre_write());
        assert!(MemoryError::Validation("empty value".into()).is_pre_write());
        assert!(!MemoryError::StoreUnavailable("down".into()).is_pre_write());
        assert!(!MemoryError::InconsistentWrite("partial".into()).is_pre_write());
    }
}
