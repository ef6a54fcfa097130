//! Error types for the entity model.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur while working with detached entity graphs.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A non-transient entity lacks one of its declared key fields.
    #[error("missing key field `{field}` on entity type `{entity_type}`")]
    MissingKey {
        /// The entity type whose key could not be extracted.
        entity_type: String,
        /// The key field that was absent or null.
        field: String,
    },

    /// A relationship held the wrong shape for its declared cardinality.
    #[error("relation `{relation}` on entity type `{entity_type}` is not a {expected}")]
    RelationShape {
        /// The entity type carrying the relation.
        entity_type: String,
        /// The relation name.
        relation: String,
        /// The expected shape ("single reference" or "collection").
        expected: &'static str,
    },
}

impl ModelError {
    /// Creates a missing key error.
    pub fn missing_key(entity_type: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingKey {
            entity_type: entity_type.into(),
            field: field.into(),
        }
    }

    /// Creates a relation shape error.
    pub fn relation_shape(
        entity_type: impl Into<String>,
        relation: impl Into<String>,
        expected: &'static str,
    ) -> Self {
        Self::RelationShape {
            entity_type: entity_type.into(),
            relation: relation.into(),
            expected,
        }
    }
}
